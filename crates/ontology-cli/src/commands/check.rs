//! Check command: load everything and report what failed

use crate::output::{to_json, OutputFormat};
use crate::{AppContext, Cli};

pub fn run(cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let report = &ctx.report;

    match cli.output_format() {
        OutputFormat::Json => println!("{}", to_json(report)?),
        OutputFormat::Text if cli.quiet => {}
        OutputFormat::Text => {
            let stats = ctx.store.stats();
            println!("Loaded {} records, added {}", report.loaded, report.added);
            println!(
                "Store: {} entities, {} relations, {} types, {} links",
                stats.entities, stats.relations, stats.types, stats.links
            );

            if !report.rejected.is_empty() {
                println!("Rejected ({}):", report.rejected.len());
                for rejected in &report.rejected {
                    println!("  {}: {}", rejected.id, rejected.errors.join("; "));
                }
            }

            if !report.invalid_relations.is_empty() {
                println!("Invalid relations ({}):", report.invalid_relations.len());
                for invalid in &report.invalid_relations {
                    println!("  {}: {}", invalid.id, invalid.errors.join("; "));
                }
            }

            if !report.diagnostics.is_empty() {
                println!("Diagnostics ({}):", report.diagnostics.len());
                for diagnostic in &report.diagnostics {
                    println!("  {}", diagnostic);
                }
            }
        }
    }

    if !report.is_clean() {
        anyhow::bail!(
            "{} records rejected, {} invalid relations",
            report.rejected.len(),
            report.invalid_relations.len()
        );
    }

    Ok(())
}
