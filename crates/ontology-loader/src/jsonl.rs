//! Newline-delimited JSON record files

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{LoaderError, LoaderResult};
use crate::source::RecordSource;

/// A file holding one JSON record per line
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    path: PathBuf,
}

impl JsonLinesSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse file contents; lines without `metadata` are skipped
    fn parse(&self, text: &str) -> LoaderResult<Vec<Value>> {
        let mut records = Vec::new();

        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let record: Value = serde_json::from_str(line).map_err(|e| {
                LoaderError::bad_file(&self.path, format!("line {}: {}", n + 1, e))
            })?;

            if !record.get("metadata").map(Value::is_object).unwrap_or(false) {
                tracing::warn!(
                    "Problem in {} line {}: no metadata, skipping",
                    self.path.display(),
                    n + 1
                );
                continue;
            }

            records.push(record);
        }

        Ok(records)
    }
}

#[async_trait]
impl RecordSource for JsonLinesSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    async fn records(&self) -> LoaderResult<Vec<Value>> {
        tracing::debug!("Loading {}", self.path.display());
        let text = tokio::fs::read_to_string(&self.path).await?;
        self.parse(&text)
    }
}
