//! Directory trees of JSON and YAML record files

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use walkdir::WalkDir;

use crate::error::{LoaderError, LoaderResult};
use crate::source::RecordSource;
use crate::yaml;

/// Default number of files parsed at once
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Which files a [`DirectorySource`] reads and how it treats symlinks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryOptions {
    /// File extensions to read, without the dot
    pub extensions: Vec<String>,

    /// Descend into symlinked directories and read symlinked files as
    /// regular files instead of turning them into link records
    pub follow_links: bool,
}

impl Default for DirectoryOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["json".into(), "yaml".into(), "yml".into()],
            follow_links: false,
        }
    }
}

impl DirectoryOptions {
    fn wants(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|wanted| wanted == ext))
            .unwrap_or(false)
    }
}

/// Reads every matching file below a base directory
///
/// A file's records default their id to `/<relative dir>/<file stem>` and
/// their `updated_at` to the file's modification time.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    base: PathBuf,
    options: DirectoryOptions,
    concurrency: usize,
}

impl DirectorySource {
    pub fn new(path: impl AsRef<Path>) -> LoaderResult<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(LoaderError::NotADirectory(path.to_path_buf()));
        }

        Ok(Self {
            base: fs::canonicalize(path)?,
            options: DirectoryOptions::default(),
            concurrency: DEFAULT_CONCURRENCY,
        })
    }

    pub fn with_options(mut self, options: DirectoryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Relative paths of the files to read, in walk order
    fn collect_files(base: &Path, options: &DirectoryOptions) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for entry in WalkDir::new(base)
            .follow_links(options.follow_links)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {}: {}", base.display(), e);
                    continue;
                }
            };

            let is_candidate = entry.file_type().is_file() || entry.path_is_symlink();
            if !is_candidate || !options.wants(entry.path()) {
                continue;
            }

            if let Ok(relative) = entry.path().strip_prefix(base) {
                files.push(relative.to_path_buf());
            }
        }

        files
    }
}

#[async_trait]
impl RecordSource for DirectorySource {
    fn describe(&self) -> String {
        format!("directory {}", self.base.display())
    }

    async fn records(&self) -> LoaderResult<Vec<Value>> {
        let base = Arc::new(self.base.clone());

        let files = {
            let base = Arc::clone(&base);
            let options = self.options.clone();
            tokio::task::spawn_blocking(move || Self::collect_files(&base, &options)).await?
        };
        tracing::debug!("Found {} files under {}", files.len(), base.display());

        let follow_links = self.options.follow_links;
        let parsed: Vec<LoaderResult<Vec<Value>>> = stream::iter(files)
            .map(|relative| {
                let base = Arc::clone(&base);
                async move {
                    tokio::task::spawn_blocking(move || read_file(&base, &relative, follow_links))
                        .await?
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut records = Vec::new();
        for file_records in parsed {
            records.extend(file_records?);
        }
        Ok(records)
    }
}

/// Default id for a file at `relative` below the base
pub fn default_id(relative: &Path) -> String {
    let stem = relative.with_extension("");
    let segments: Vec<String> = stem
        .components()
        .filter_map(|c| match c {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    format!("/{}", segments.join("/"))
}

fn read_file(base: &Path, relative: &Path, follow_links: bool) -> LoaderResult<Vec<Value>> {
    let path = base.join(relative);
    let id = default_id(relative);

    if !follow_links && fs::symlink_metadata(&path)?.file_type().is_symlink() {
        return Ok(link_record(base, &path, id)?.into_iter().collect());
    }

    let mtime = modified(&path)?;
    let text = fs::read_to_string(&path)?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => {
            let mut record: Value = serde_json::from_str(&text)?;
            fill_defaults(&mut record, &path, &id, &mtime)?;
            Ok(vec![record])
        }
        _ => {
            let mut records = Vec::new();
            for (idx, document) in serde_yaml::Deserializer::from_str(&text).enumerate() {
                let document = serde_yaml::Value::deserialize(document)?;
                if document.is_null() {
                    continue;
                }

                let mut record = yaml::to_json(document);
                let id = if idx > 0 {
                    format!("{}/{}", id, idx)
                } else {
                    id.clone()
                };
                fill_defaults(&mut record, &path, &id, &mtime)?;
                records.push(record);
            }
            Ok(records)
        }
    }
}

/// Link record for a symlink whose target lies inside the base
fn link_record(base: &Path, path: &Path, id: String) -> LoaderResult<Option<Value>> {
    let target = match fs::canonicalize(path) {
        Ok(target) => target,
        Err(e) => {
            tracing::warn!("Skipping dangling link {}: {}", path.display(), e);
            return Ok(None);
        }
    };

    let Ok(target_relative) = target.strip_prefix(base) else {
        tracing::warn!(
            "Link doesn't share a common base with entity: {} {}",
            path.display(),
            target.display()
        );
        return Ok(None);
    };

    Ok(Some(json!({
        "metadata": {
            "id": id,
            "type": "/link",
            "updated_at": modified(path)?,
        },
        "properties": {
            "link": default_id(target_relative),
        },
    })))
}

/// Fill `metadata.id` and `metadata.updated_at` when the file leaves them out
fn fill_defaults(record: &mut Value, path: &Path, id: &str, mtime: &str) -> LoaderResult<()> {
    let metadata = record
        .get_mut("metadata")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| LoaderError::bad_file(path, "no metadata"))?;

    metadata
        .entry("id")
        .or_insert_with(|| Value::String(id.to_string()));
    metadata
        .entry("updated_at")
        .or_insert_with(|| Value::String(mtime.to_string()));
    Ok(())
}

fn modified(path: &Path) -> LoaderResult<String> {
    let mtime: DateTime<Utc> = fs::metadata(path)?.modified()?.into();
    Ok(mtime.to_rfc3339_opts(SecondsFormat::Secs, true))
}
