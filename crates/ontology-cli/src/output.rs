//! Output formatting utilities

use ontology_core::Instance;
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Pretty JSON for structured output
pub fn to_json<T: Serialize>(data: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// One-line summary of a relation: `id  type  a -> b`
pub fn relation_line(relation: &Instance) -> String {
    match relation.endpoints() {
        Some((a, b)) => format!("{}  {}  {} -> {}", relation.id(), relation.type_id(), a, b),
        None => format!("{}  {}", relation.id(), relation.type_id()),
    }
}

/// Multi-line description of an instance
pub fn describe(instance: &Instance) -> String {
    let mut lines = vec![
        format!("{} [{}]", instance.id(), instance.type_id()),
        format!("  Name: {}", instance.name()),
        format!("  Updated: {}", instance.updated_at().to_rfc3339()),
    ];

    if !instance.is_empty() {
        lines.push("  Properties:".to_string());
        for (key, value) in instance.properties() {
            lines.push(format!("    {}: {}", key, value));
        }
    }

    lines.join("\n")
}
