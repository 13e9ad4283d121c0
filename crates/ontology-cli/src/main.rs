//! Ontology CLI - Command line interface for the ontology graph store

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::{check, completions, dot, get, list, relations, types};
use config::Config;
use ontology_core::GraphStore;
use ontology_loader::{source_for_path, DirectoryOptions, IngestOptions, IngestReport, Ingestor};
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "ontology")]
#[command(author, version, about = "Load, validate and query an infrastructure ontology")]
pub struct Cli {
    /// Record source: a directory tree or a JSON-lines file (repeatable)
    #[arg(short, long = "source", global = true)]
    pub sources: Vec<PathBuf>,

    /// Index records without validating them first
    #[arg(long, global = true)]
    pub no_validate: bool,

    /// Worker tasks used while loading
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Output format: text, json
    #[arg(short, long, default_value = "text", global = true)]
    pub format: String,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from(self.format.as_str())
    }

    /// Sources from the command line, or the configured defaults
    fn sources(&self, config: &Config) -> Vec<PathBuf> {
        if self.sources.is_empty() {
            config.sources.clone()
        } else {
            self.sources.clone()
        }
    }

    fn ingest_options(&self, config: &Config, check_relations: bool) -> IngestOptions {
        IngestOptions {
            validate: config.validate && !self.no_validate,
            concurrency: self.concurrency.unwrap_or(config.concurrency).max(1),
            check_relations,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load every source and report rejected records and invalid relations
    Check,
    /// Show one instance
    Get(get::GetArgs),
    /// List entities by type, or by traversing from a root
    List(list::ListArgs),
    /// Show relations touching an entity
    Relations(relations::RelationsArgs),
    /// Show both endpoints of a relation
    Resolve(relations::ResolveArgs),
    /// Output relations in Graphviz dot format
    Dot(dot::DotArgs),
    /// List types, or show one type's ancestry and merged spec
    Types(types::TypesArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Application context with the loaded store
pub struct AppContext {
    pub store: Arc<GraphStore>,
    pub report: IngestReport,
}

impl AppContext {
    pub async fn load(cli: &Cli, config: &Config, check_relations: bool) -> anyhow::Result<Self> {
        let sources = cli.sources(config);
        if sources.is_empty() {
            anyhow::bail!(
                "No sources given. Pass --source or set `sources` with `ontology config set`."
            );
        }

        let options = cli.ingest_options(config, check_relations);
        let store = Arc::new(GraphStore::new());
        let mut ingestor = Ingestor::new(Arc::clone(&store)).with_options(options);

        for path in &sources {
            tracing::debug!("Using source: {:?}", path);
            ingestor.add_source(source_for_path(
                path,
                &DirectoryOptions::default(),
                options.concurrency,
            )?);
        }

        let report = ingestor.run().await?;
        if !report.rejected.is_empty() {
            tracing::warn!(
                "{} records rejected; run `ontology check` for details",
                report.rejected.len()
            );
        }

        Ok(Self { store, report })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    tracing::debug!("Starting ontology CLI");

    match &cli.command {
        Commands::Config(args) => return commands::config::run(args, &cli),
        Commands::Completions(args) => return completions::run(args),
        _ => {}
    }

    let config = Config::load();
    let check_relations = matches!(cli.command, Commands::Check);
    let ctx = AppContext::load(&cli, &config, check_relations).await?;

    match &cli.command {
        Commands::Check => check::run(&cli, &ctx)?,
        Commands::Get(args) => get::run(args, &cli, &ctx)?,
        Commands::List(args) => list::run(args, &cli, &ctx)?,
        Commands::Relations(args) => relations::run(args, &cli, &ctx)?,
        Commands::Resolve(args) => relations::run_resolve(args, &cli, &ctx)?,
        Commands::Dot(args) => dot::run(args, &ctx)?,
        Commands::Types(args) => types::run(args, &cli, &ctx)?,
        Commands::Config(_) | Commands::Completions(_) => {}
    }

    Ok(())
}
