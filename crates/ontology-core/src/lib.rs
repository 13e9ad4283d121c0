//! Ontology Core - In-memory typed graph store
//!
//! This crate provides the record model, the type registry and validator,
//! and the [`GraphStore`] that indexes entities, relations, types and links
//! for the infrastructure ontology.

pub mod error;
pub mod instance;
pub mod registry;
pub mod schema;
pub mod store;
pub mod traversal;
pub mod validator;

pub use error::{ChainKind, Diagnostic, Error, Result, Side, ValidationError, ValidationErrors};
pub use instance::{Category, Instance, ROOT_TYPE};
pub use registry::TypeRegistry;
pub use schema::{deep_merge, PointerPolicy, ReferenceResolver, Referent, SchemaChecker};
pub use store::{GraphStore, StoreStats, PLACEHOLDER_TYPE};
pub use traversal::{Direction, TraversalQuery, TraversalResult, TraversalStats};
pub use validator::{ValidateOptions, Validator};
