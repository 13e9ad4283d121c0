//! Ontology Loader - Record sources and concurrent ingestion
//!
//! This crate reads `{metadata, properties}` records from directory trees
//! and JSON-lines files and feeds them into a shared
//! [`ontology_core::GraphStore`].

pub mod directory;
pub mod error;
pub mod ingest;
pub mod jsonl;
pub mod source;
pub mod yaml;

use std::path::Path;

pub use directory::{DirectoryOptions, DirectorySource};
pub use error::{LoaderError, LoaderResult};
pub use ingest::{IngestOptions, IngestReport, Ingestor, Rejected};
pub use jsonl::JsonLinesSource;
pub use source::RecordSource;

/// Pick a source for a path: a directory tree, or a JSON-lines file
pub fn source_for_path(
    path: impl AsRef<Path>,
    options: &DirectoryOptions,
    concurrency: usize,
) -> LoaderResult<Box<dyn RecordSource>> {
    let path = path.as_ref();

    if path.is_dir() {
        let source = DirectorySource::new(path)?
            .with_options(options.clone())
            .with_concurrency(concurrency);
        Ok(Box::new(source))
    } else if path.is_file() {
        Ok(Box::new(JsonLinesSource::new(path)))
    } else {
        Err(LoaderError::UnknownPath(path.to_path_buf()))
    }
}
