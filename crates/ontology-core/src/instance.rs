//! Normalized records: the single shape every entity, relation, type and link
//! takes once it is inside the store

use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::error::{Error, Result, Side};

/// Id of the implicit base type every type hierarchy is rooted at
pub const ROOT_TYPE: &str = "/type";

/// What an instance is, decided once from the leading segment of its type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Entity,
    Relation,
    Type,
    Link,
    Unknown,
}

impl Category {
    /// Classify a type id by its leading path segment (`/entity/v1/x` is an entity)
    pub fn of(type_id: &str) -> Self {
        let Some(rest) = type_id.strip_prefix('/') else {
            return Self::Unknown;
        };

        match rest.split('/').next() {
            Some("entity") => Self::Entity,
            Some("relation") => Self::Relation,
            Some("type") => Self::Type,
            Some("link") => Self::Link,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Entity => "entity",
            Self::Relation => "relation",
            Self::Type => "type",
            Self::Link => "link",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// A normalized record
///
/// `id`, `type`, `name` and `updated_at` are always present. Metadata keys
/// beyond those four (for example `parent` or `spec` on type records) are
/// kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    id: String,
    type_id: String,
    name: String,
    updated_at: DateTime<FixedOffset>,
    category: Category,
    metadata: Map<String, Value>,
    properties: Map<String, Value>,
}

impl Instance {
    /// Create an instance with defaulted name and timestamp
    pub fn new(id: impl Into<String>, type_id: impl Into<String>) -> Self {
        let id = id.into();
        let type_id = type_id.into();
        Self {
            name: default_name(&id),
            category: Category::of(&type_id),
            updated_at: Utc::now().fixed_offset(),
            metadata: Map::new(),
            properties: Map::new(),
            id,
            type_id,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<FixedOffset>) -> Self {
        self.updated_at = updated_at;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    /// Normalize a raw `{metadata, properties}` tree
    ///
    /// Fills `properties`, `metadata.name` and `metadata.updated_at` when
    /// absent and fails with [`Error::Structural`] when the result is still
    /// not a proper instance.
    pub fn from_record(record: Value) -> Result<Self> {
        let Value::Object(mut root) = record else {
            return Err(Error::structural("record is not an object"));
        };

        let mut metadata = match root.remove("metadata") {
            Some(Value::Object(m)) => m,
            Some(_) => return Err(Error::structural("metadata is not an object")),
            None => return Err(Error::structural("missing metadata")),
        };

        let properties = match root.remove("properties") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(p)) => p,
            Some(_) => return Err(Error::structural("properties is not an object")),
        };

        let id = take_string(&mut metadata, "id")?
            .ok_or_else(|| Error::structural("missing metadata.id"))?;
        let type_id = take_string(&mut metadata, "type")?
            .ok_or_else(|| Error::structural("missing metadata.type"))?;
        let name = take_string(&mut metadata, "name")?.unwrap_or_else(|| default_name(&id));

        let updated_at = match take_string(&mut metadata, "updated_at")? {
            Some(raw) => DateTime::parse_from_rfc3339(&raw).map_err(|e| {
                Error::structural(format!("metadata.updated_at {:?} is not RFC3339: {}", raw, e))
            })?,
            None => Utc::now().fixed_offset(),
        };

        let instance = Self {
            category: Category::of(&type_id),
            id,
            type_id,
            name,
            updated_at,
            metadata,
            properties,
        };
        instance.check_structure()?;

        Ok(instance)
    }

    /// Category-specific shape checks that normalization alone cannot default
    pub fn check_structure(&self) -> Result<()> {
        match self.category {
            Category::Relation => {
                for side in [Side::A, Side::B] {
                    if self.endpoint(side).is_none() {
                        return Err(Error::structural(format!(
                            "relation {} needs a string properties.{}",
                            self.id,
                            side.key()
                        )));
                    }
                }
            }
            Category::Link => {
                if self.link_target().is_none() {
                    return Err(Error::structural(format!(
                        "link {} needs a string properties.link",
                        self.id
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn updated_at(&self) -> DateTime<FixedOffset> {
        self.updated_at
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Metadata keys other than id/type/name/updated_at
    pub fn extra_metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Indexed property lookup
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Property first, then metadata: type records may declare either way
    fn declared(&self, key: &str) -> Option<&Value> {
        self.properties.get(key).or_else(|| self.metadata.get(key))
    }

    /// Parent type id of a type record
    pub fn parent(&self) -> Option<&str> {
        self.declared("parent").and_then(Value::as_str)
    }

    /// Property spec of a type record
    pub fn spec(&self) -> Option<&Map<String, Value>> {
        self.declared("spec").and_then(Value::as_object)
    }

    /// Type-level list of required top-level properties
    pub fn required(&self) -> Vec<&str> {
        self.declared("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn endpoint(&self, side: Side) -> Option<&str> {
        self.get_str(side.key())
    }

    /// `(a, b)` ids of a relation
    pub fn endpoints(&self) -> Option<(&str, &str)> {
        Some((self.endpoint(Side::A)?, self.endpoint(Side::B)?))
    }

    pub fn involves(&self, id: &str) -> bool {
        self.endpoints()
            .map(|(a, b)| a == id || b == id)
            .unwrap_or(false)
    }

    /// The endpoint opposite `id`, if `id` is one of this relation's endpoints
    pub fn other_end(&self, id: &str) -> Option<&str> {
        let (a, b) = self.endpoints()?;
        if a == id {
            Some(b)
        } else if b == id {
            Some(a)
        } else {
            None
        }
    }

    /// Canonical id a link record points at
    pub fn link_target(&self) -> Option<&str> {
        self.get_str("link")
    }

    /// Serialize back into the `{metadata, properties}` record shape
    pub fn to_record(&self) -> Value {
        let mut metadata = self.metadata.clone();
        metadata.insert("id".into(), json!(self.id));
        metadata.insert("type".into(), json!(self.type_id));
        metadata.insert("name".into(), json!(self.name));
        metadata.insert("updated_at".into(), json!(self.updated_at.to_rfc3339()));

        json!({
            "metadata": metadata,
            "properties": self.properties,
        })
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.id, self.type_id)
    }
}

impl Serialize for Instance {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Instance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let record = Value::deserialize(deserializer)?;
        Instance::from_record(record).map_err(serde::de::Error::custom)
    }
}

/// Last `/`-delimited segment of an id
pub fn default_name(id: &str) -> String {
    id.rsplit('/').next().unwrap_or(id).to_string()
}

fn take_string(metadata: &mut Map<String, Value>, key: &str) -> Result<Option<String>> {
    match metadata.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(Error::structural(format!(
            "metadata.{} must be a string, got {}",
            key, other
        ))),
    }
}
