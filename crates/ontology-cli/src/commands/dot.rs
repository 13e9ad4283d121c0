//! Dot command: relations as a Graphviz digraph

use std::sync::Arc;

use clap::Args;
use ontology_core::Instance;

use crate::commands::list::{matches_types, TraverseArgs};
use crate::AppContext;

#[derive(Args)]
pub struct DotArgs {
    /// Relation types to draw, subtypes included (all relations when omitted)
    pub types: Vec<String>,

    #[command(flatten)]
    pub traverse: TraverseArgs,
}

pub fn run(args: &DotArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let store = &ctx.store;

    let candidates: Vec<Arc<Instance>> = match &args.traverse.root_id {
        None => {
            let mut relations = store.relations();
            relations.sort_by(|a, b| a.id().cmp(b.id()));
            relations
        }
        Some(root) => store.traverse(&args.traverse.query(root)).relations,
    };

    println!("digraph {{");
    for relation in candidates {
        if !matches_types(store, &relation, &args.types)? {
            continue;
        }
        if let Some((a, b)) = relation.endpoints() {
            println!("\"{}\" -> \"{}\";", quote(a), quote(b));
        }
    }
    println!("}}");

    Ok(())
}

fn quote(id: &str) -> String {
    id.replace('\\', "\\\\").replace('"', "\\\"")
}
