//! CLI configuration

use std::path::{Path, PathBuf};

use anyhow::Context;
use ontology_loader::directory::DEFAULT_CONCURRENCY;
use serde::{Deserialize, Serialize};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "ONTOLOGY_CONFIG";

/// Get the config file path
pub fn config_file_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }

    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ontology")
        .join("config.toml")
}

/// Configuration for the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sources loaded when no `--source` is given
    pub sources: Vec<PathBuf>,
    pub concurrency: usize,
    pub validate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            validate: true,
        }
    }
}

impl Config {
    /// Load from the config file, falling back to defaults
    pub fn load() -> Self {
        let path = config_file_path();
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring config file {}: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(toml::from_str(&text)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn keys() -> &'static [&'static str] {
        &["sources", "concurrency", "validate"]
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "sources" => Some(
                self.sources
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            "concurrency" => Some(self.concurrency.to_string()),
            "validate" => Some(self.validate.to_string()),
            _ => None,
        }
    }

    /// Set a key from its string form; `sources` takes a comma-separated list
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "sources" => {
                self.sources = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect();
            }
            "concurrency" => {
                self.concurrency = value
                    .parse()
                    .with_context(|| format!("concurrency must be a number, got {}", value))?;
            }
            "validate" => {
                self.validate = value
                    .parse()
                    .with_context(|| format!("validate must be true or false, got {}", value))?;
            }
            _ => anyhow::bail!(
                "Unknown config key: {}. Available keys: {}",
                key,
                Self::keys().join(", ")
            ),
        }
        Ok(())
    }

    /// Reset a key to its default value
    pub fn unset(&mut self, key: &str) -> anyhow::Result<()> {
        let defaults = Self::default();
        match key {
            "sources" => self.sources = defaults.sources,
            "concurrency" => self.concurrency = defaults.concurrency,
            "validate" => self.validate = defaults.validate,
            _ => anyhow::bail!(
                "Unknown config key: {}. Available keys: {}",
                key,
                Self::keys().join(", ")
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();
        config.set("sources", "/data/types, /data/aws.jsonl").unwrap();
        config.set("concurrency", "4").unwrap();
        config.set("validate", "false").unwrap();

        assert_eq!(
            config.get("sources").as_deref(),
            Some("/data/types,/data/aws.jsonl")
        );
        assert_eq!(config.get("concurrency").as_deref(), Some("4"));
        assert!(!config.validate);

        assert!(config.set("concurrency", "many").is_err());
        assert!(config.set("colour", "blue").is_err());
        assert!(config.get("colour").is_none());
    }

    #[test]
    fn test_unset_restores_default() {
        let mut config = Config::default();
        config.set("concurrency", "3").unwrap();
        config.set("sources", "/data").unwrap();

        config.unset("concurrency").unwrap();
        config.unset("sources").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.unset("colour").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut config = Config::default();
        config.set("sources", "/data/types").unwrap();
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_keys_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "concurrency = 2\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.concurrency, 2);
        assert!(config.validate);
        assert!(config.sources.is_empty());
    }
}
