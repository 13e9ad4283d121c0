//! Get command

use clap::Args;

use crate::output::{describe, to_json, OutputFormat};
use crate::{AppContext, Cli};

#[derive(Args)]
pub struct GetArgs {
    /// Instance id (links are followed)
    pub id: String,
}

pub fn run(args: &GetArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let Some(instance) = ctx.store.by_id(&args.id) else {
        anyhow::bail!("No instance with id {}", args.id);
    };

    match cli.output_format() {
        OutputFormat::Json => println!("{}", to_json(&*instance)?),
        OutputFormat::Text => println!("{}", describe(&instance)),
    }
    Ok(())
}
