//! Record source trait definitions

use async_trait::async_trait;
use serde_json::Value;

use crate::error::LoaderResult;

/// Anything that yields raw `{metadata, properties}` records
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Human-readable origin, for logs and reports
    fn describe(&self) -> String;

    /// Read every record the source holds
    async fn records(&self) -> LoaderResult<Vec<Value>>;
}
