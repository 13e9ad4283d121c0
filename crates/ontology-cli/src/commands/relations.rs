//! Relations and resolve commands

use clap::Args;
use serde_json::json;

use crate::output::{describe, relation_line, to_json, OutputFormat};
use crate::{AppContext, Cli};

#[derive(Args)]
pub struct RelationsArgs {
    /// Entity id (links are followed)
    pub id: String,

    /// Every relation in the entity's connected component, not only those touching it
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Relation id
    pub id: String,
}

pub fn run(args: &RelationsArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let id = ctx.store.canonical_id(&args.id)?;

    let mut relations = if args.all {
        ctx.store.all_relations_for(&id)
    } else {
        ctx.store.relations_for(&id)
    };
    relations.sort_by(|a, b| a.id().cmp(b.id()));

    match cli.output_format() {
        OutputFormat::Json => {
            let records: Vec<_> = relations.iter().map(|r| r.to_record()).collect();
            println!("{}", to_json(&records)?);
        }
        OutputFormat::Text => {
            if relations.is_empty() && !cli.quiet {
                println!("No relations for {}", id);
            }
            for relation in &relations {
                println!("{}", relation_line(relation));
            }
        }
    }
    Ok(())
}

pub fn run_resolve(args: &ResolveArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let Some(relation) = ctx.store.by_id(&args.id) else {
        anyhow::bail!("No instance with id {}", args.id);
    };

    let (a, b) = ctx.store.resolve(&relation)?;

    match cli.output_format() {
        OutputFormat::Json => {
            println!("{}", to_json(&json!({ "a": &*a, "b": &*b }))?);
        }
        OutputFormat::Text => {
            for (side, end) in [("a", &a), ("b", &b)] {
                let stored = ctx.store.by_id(end.id()).is_some();
                println!("{}: {}", side, describe(end).replace('\n', "\n   "));
                if !stored {
                    println!("   (placeholder)");
                }
            }
        }
    }
    Ok(())
}
