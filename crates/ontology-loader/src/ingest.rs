//! Concurrent, phased ingestion of records into a [`GraphStore`]
//!
//! Records from every source are gathered first and then added in phases:
//! types, then entities and links, then relations, then anything else.
//! Each phase completes before the next begins, so schema and `pointer_to`
//! checks see the declarations and referents they depend on regardless of
//! the order sources produced them in.

use std::sync::Arc;

use ontology_core::{Category, Diagnostic, Error, GraphStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::directory::DEFAULT_CONCURRENCY;
use crate::error::LoaderResult;
use crate::source::RecordSource;

/// Ingestion options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Reject records that fail validation instead of indexing them
    pub validate: bool,

    /// Worker tasks per phase
    pub concurrency: usize,

    /// Validate every stored relation once loading is done
    pub check_relations: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            validate: true,
            concurrency: DEFAULT_CONCURRENCY,
            check_relations: true,
        }
    }
}

/// A record that was not added, or a stored relation that failed its
/// post-load check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejected {
    pub id: String,
    pub errors: Vec<String>,
}

/// What an ingestion run did
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Records read from sources
    pub loaded: usize,
    /// Records accepted by the store
    pub added: usize,
    pub rejected: Vec<Rejected>,
    pub diagnostics: Vec<Diagnostic>,
    pub invalid_relations: Vec<Rejected>,
}

impl IngestReport {
    /// Nothing rejected and every relation valid
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.invalid_relations.is_empty()
    }
}

/// Loads record sources into a shared store
pub struct Ingestor {
    store: Arc<GraphStore>,
    options: IngestOptions,
    sources: Vec<Box<dyn RecordSource>>,
}

impl Ingestor {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self {
            store,
            options: IngestOptions::default(),
            sources: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_source(mut self, source: impl RecordSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn add_source(&mut self, source: Box<dyn RecordSource>) {
        self.sources.push(source);
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    /// Read every source concurrently, then ingest what they produced
    pub async fn run(&self) -> LoaderResult<IngestReport> {
        let loads = self.sources.iter().map(|source| async move {
            let records = source.records().await?;
            tracing::debug!("Read {} records from {}", records.len(), source.describe());
            LoaderResult::Ok(records)
        });

        let records: Vec<Value> = futures::future::try_join_all(loads)
            .await?
            .into_iter()
            .flatten()
            .collect();

        self.ingest(records).await
    }

    /// Add already-read records in dependency phases
    pub async fn ingest(&self, records: Vec<Value>) -> LoaderResult<IngestReport> {
        let mut report = IngestReport {
            loaded: records.len(),
            ..Default::default()
        };

        let mut phases: [Vec<Value>; 4] = Default::default();
        for record in records {
            phases[phase_of(&record)].push(record);
        }

        for (n, phase) in phases.into_iter().enumerate() {
            tracing::debug!("Ingest phase {}: {} records", n, phase.len());
            let (added, rejected) = self.add_phase(phase).await?;
            report.added += added;
            report.rejected.extend(rejected);
        }

        if self.options.check_relations {
            let store = Arc::clone(&self.store);
            let invalid = tokio::task::spawn_blocking(move || store.invalid_relations()).await??;
            report.invalid_relations = invalid
                .into_iter()
                .map(|(id, errors)| Rejected {
                    id,
                    errors: errors.iter().map(ToString::to_string).collect(),
                })
                .collect();
        }

        report.diagnostics = self.store.take_diagnostics();

        tracing::debug!(
            "Ingested {} of {} records, {} rejected, {} invalid relations",
            report.added,
            report.loaded,
            report.rejected.len(),
            report.invalid_relations.len()
        );

        Ok(report)
    }

    /// Split a phase across blocking workers and wait for all of them
    async fn add_phase(&self, mut remaining: Vec<Value>) -> LoaderResult<(usize, Vec<Rejected>)> {
        if remaining.is_empty() {
            return Ok((0, Vec::new()));
        }

        let workers = self.options.concurrency.max(1);
        let chunk_size = remaining.len().div_ceil(workers);

        let mut handles = Vec::new();
        while !remaining.is_empty() {
            let rest = remaining.split_off(chunk_size.min(remaining.len()));
            let chunk = std::mem::replace(&mut remaining, rest);
            let store = Arc::clone(&self.store);
            let validate = self.options.validate;
            handles.push(tokio::task::spawn_blocking(move || {
                add_all(&store, chunk, validate)
            }));
        }

        let mut added = 0;
        let mut rejected = Vec::new();
        for outcome in futures::future::join_all(handles).await {
            let (n, r) = outcome?;
            added += n;
            rejected.extend(r);
        }
        Ok((added, rejected))
    }
}

/// Phase index: declarations first, relations after their endpoints
fn phase_of(record: &Value) -> usize {
    let type_id = record
        .get("metadata")
        .and_then(|m| m.get("type"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    match Category::of(type_id) {
        Category::Type => 0,
        Category::Entity | Category::Link => 1,
        Category::Relation => 2,
        Category::Unknown => 3,
    }
}

fn record_id(record: &Value) -> String {
    record
        .get("metadata")
        .and_then(|m| m.get("id"))
        .and_then(Value::as_str)
        .unwrap_or("<no id>")
        .to_string()
}

fn add_all(store: &GraphStore, records: Vec<Value>, validate: bool) -> (usize, Vec<Rejected>) {
    let mut added = 0;
    let mut rejected = Vec::new();

    for record in records {
        let id = record_id(&record);
        match store.add(record, validate) {
            Ok(_) => added += 1,
            Err(Error::InvalidRecord(errors)) => {
                tracing::debug!("Rejected {}: {}", id, errors);
                rejected.push(Rejected {
                    id,
                    errors: errors.iter().map(ToString::to_string).collect(),
                });
            }
            Err(e) => {
                tracing::debug!("Rejected {}: {}", id, e);
                rejected.push(Rejected {
                    id,
                    errors: vec![e.to_string()],
                });
            }
        }
    }

    (added, rejected)
}
