//! Types command

use clap::Args;
use serde_json::{json, Value};

use crate::output::{to_json, OutputFormat};
use crate::{AppContext, Cli};

#[derive(Args)]
pub struct TypesArgs {
    /// Type id to show in detail
    pub id: Option<String>,
}

pub fn run(args: &TypesArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let store = &ctx.store;

    let Some(id) = &args.id else {
        let mut types = store.types();
        types.sort_by(|a, b| a.id().cmp(b.id()));

        match cli.output_format() {
            OutputFormat::Json => {
                let records: Vec<_> = types.iter().map(|t| t.to_record()).collect();
                println!("{}", to_json(&records)?);
            }
            OutputFormat::Text => {
                for declaration in &types {
                    match declaration.parent() {
                        Some(parent) => println!("{} (parent: {})", declaration.id(), parent),
                        None => println!("{}", declaration.id()),
                    }
                }
            }
        }
        return Ok(());
    };

    if store.type_declaration(id).is_none() {
        anyhow::bail!("No type with id {}", id);
    }
    let ancestry = store.ancestry(id)?;
    let spec = Value::Object(store.merged_spec(id)?);

    match cli.output_format() {
        OutputFormat::Json => {
            println!(
                "{}",
                to_json(&json!({ "id": id, "ancestry": ancestry, "spec": spec }))?
            );
        }
        OutputFormat::Text => {
            println!("{}", id);
            println!("  Ancestry: {}", ancestry.join(" -> "));
            println!("  Spec: {}", to_json(&spec)?.replace('\n', "\n  "));
        }
    }
    Ok(())
}
