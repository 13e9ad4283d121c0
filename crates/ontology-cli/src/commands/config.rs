//! Config command: inspect and edit the persisted defaults

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::config::{config_file_path, Config};
use crate::Cli;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print one stored value
    Get { key: String },
    /// Store a value; `sources` takes comma-separated paths that must exist
    Set { key: String, value: String },
    /// Reset a key to its default
    Unset { key: String },
    /// Show every key with the value a command would use and where it comes from
    List,
    /// Show config file path
    Path,
    /// Write a default config file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

pub fn run(args: &ConfigArgs, cli: &Cli) -> anyhow::Result<()> {
    let path = config_file_path();

    match &args.command {
        ConfigCommands::Get { key } => {
            let value = Config::load().get(key).ok_or_else(|| unknown_key(key))?;
            println!("{}", value);
        }
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load();
            config.set(key, value)?;
            if key == "sources" {
                check_sources(&config.sources)?;
            }
            config.save_to(&path)?;
            println!("{} = {}", key, config.get(key).unwrap_or_default());
        }
        ConfigCommands::Unset { key } => {
            let mut config = Config::load();
            config.unset(key)?;
            config.save_to(&path)?;
            println!("{} = {}", key, config.get(key).unwrap_or_default());
        }
        ConfigCommands::List => list(cli, &path),
        ConfigCommands::Path => println!("{}", path.display()),
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists; pass --force to replace it",
                    path.display()
                );
            }
            Config::default().save_to(&path)?;
            println!("Wrote defaults to {}", path.display());
        }
    }

    Ok(())
}

fn list(cli: &Cli, path: &std::path::Path) {
    let stored = Config::load();
    let defaults = Config::default();
    let on_disk = path.exists();

    println!("# {}", path.display());
    for key in Config::keys() {
        let (value, origin) = match overriding_flag(cli, key) {
            Some((flag, value)) => (value, flag.to_string()),
            None => {
                let value = stored.get(key).unwrap_or_default();
                let origin = if on_disk && defaults.get(key).as_deref() != Some(value.as_str()) {
                    "config"
                } else {
                    "default"
                };
                (value, origin.to_string())
            }
        };
        let value = if value.is_empty() { "(none)".to_string() } else { value };
        println!("{} = {}  [{}]", key, value, origin);
    }
}

/// Command-line flag overriding `key` for this invocation, with its value
fn overriding_flag(cli: &Cli, key: &str) -> Option<(&'static str, String)> {
    match key {
        "sources" if !cli.sources.is_empty() => Some((
            "--source",
            cli.sources
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(","),
        )),
        "concurrency" => cli.concurrency.map(|n| ("--concurrency", n.to_string())),
        "validate" if cli.no_validate => Some(("--no-validate", "false".to_string())),
        _ => None,
    }
}

fn check_sources(sources: &[PathBuf]) -> anyhow::Result<()> {
    let missing: Vec<String> = sources
        .iter()
        .filter(|p| !p.exists())
        .map(|p| p.display().to_string())
        .collect();
    if !missing.is_empty() {
        anyhow::bail!("No such source: {}", missing.join(", "));
    }
    Ok(())
}

fn unknown_key(key: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Unknown config key: {}. Available keys: {}",
        key,
        Config::keys().join(", ")
    )
}
