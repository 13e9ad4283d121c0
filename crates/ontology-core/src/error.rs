//! Error types for Ontology Core

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::instance::Category;

/// Result type alias using Ontology's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Which kind of chain a cycle was detected in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    /// `parent` links between types
    Parent,
    /// `metadata.type` links between an instance and the types validating it
    Type,
    /// `link` aliases between ids
    Link,
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parent => write!(f, "parent"),
            Self::Type => write!(f, "type"),
            Self::Link => write!(f, "link"),
        }
    }
}

/// Ontology error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Structural error: {0}")]
    Structural(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(ValidationErrors),

    #[error("Cycle in {kind} chain: {}", chain.join(" -> "))]
    Cycle { kind: ChainKind, chain: Vec<String> },

    #[error("Not a relation: {0}")]
    NotARelation(String),
}

impl Error {
    pub(crate) fn structural(msg: impl Into<String>) -> Self {
        Self::Structural(msg.into())
    }
}

/// A single reason an instance failed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    /// The record could not be normalized into an instance
    NotAnInstance,
    /// The declared type is missing or itself invalid
    TypeResolution { type_id: String },
    /// A property violated the merged spec
    Schema { path: String, message: String },
}

impl ValidationError {
    pub fn schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnInstance => write!(f, "not a proper instance"),
            Self::TypeResolution { .. } => write!(f, "no associated, valid type"),
            Self::Schema { path, message } => write!(f, "{}: {}", path, message),
        }
    }
}

/// Non-empty list of validation failures carried by [`Error::InvalidRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Which endpoint of a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn key(&self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
        }
    }
}

/// Non-fatal conditions surfaced while ingesting or resolving
///
/// Every diagnostic is logged at `warn` and kept in the store's diagnostic
/// log until taken. Those raised by lookups are kept once per drain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// An id was re-added; the later record replaced the earlier one
    Overwrite { id: String, category: Category },
    /// The record's type has no known category prefix
    UnknownCategory { id: String, type_id: String },
    /// A relation endpoint was missing and its type declares no `pointer_to`
    MissingPointerTo {
        relation: String,
        relation_type: String,
        side: Side,
    },
    /// Following `link` aliases from this id never reached a non-link
    LinkCycle { id: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overwrite { id, category } => {
                write!(f, "overwriting {} {}", category, id)
            }
            Self::UnknownCategory { id, type_id } => {
                write!(f, "unknown category for {} (type {})", id, type_id)
            }
            Self::MissingPointerTo {
                relation,
                relation_type,
                side,
            } => write!(
                f,
                "no pointer_to for side {} of {} in spec of {}",
                side.key(),
                relation,
                relation_type
            ),
            Self::LinkCycle { id } => write!(f, "link cycle starting at {}", id),
        }
    }
}
