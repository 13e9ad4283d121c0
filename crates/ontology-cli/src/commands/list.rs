//! List command, and the traversal flags shared with `dot`

use std::sync::Arc;

use clap::Args;
use ontology_core::{Category, Direction, GraphStore, Instance, TraversalQuery};

use crate::output::{to_json, OutputFormat};
use crate::{AppContext, Cli};

#[derive(Args)]
pub struct TraverseArgs {
    /// Id of an entity to start from
    #[arg(long)]
    pub root_id: Option<String>,

    /// How many relations to traverse before stopping
    #[arg(long, default_value = "2")]
    pub search_depth: u32,

    /// Direction to traverse from the root: out, in, both
    #[arg(long, default_value = "out")]
    pub traverse_direction: Direction,

    /// Only traverse relations of these types (repeatable or comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub constrain: Vec<String>,
}

impl TraverseArgs {
    pub fn query(&self, root: &str) -> TraversalQuery {
        TraversalQuery::new(root)
            .with_depth(self.search_depth)
            .with_direction(self.traverse_direction)
            .constrain_relations(self.constrain.clone())
    }
}

#[derive(Args)]
pub struct ListArgs {
    /// Entity types to list, subtypes included (all entities when omitted)
    pub types: Vec<String>,

    #[command(flatten)]
    pub traverse: TraverseArgs,
}

/// Whether `instance` is of any of `types` (any type when `types` is empty)
pub fn matches_types(
    store: &GraphStore,
    instance: &Instance,
    types: &[String],
) -> anyhow::Result<bool> {
    for type_id in types {
        if store.type_of(instance, type_id)? {
            return Ok(true);
        }
    }
    Ok(types.is_empty())
}

pub fn run(args: &ListArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let store = &ctx.store;

    let candidates: Vec<Arc<Instance>> = match &args.traverse.root_id {
        None => {
            let mut entities = store.entities();
            entities.sort_by(|a, b| a.id().cmp(b.id()));
            entities
        }
        Some(root) => {
            let result = store.traverse(&args.traverse.query(root));
            tracing::debug!(
                "Traversal from {} reached {} nodes",
                result.start,
                result.visited.len()
            );
            result
                .visited
                .iter()
                .filter(|id| **id != result.start)
                .filter_map(|id| store.by_id(id))
                .filter(|found| found.category() == Category::Entity)
                .collect()
        }
    };

    let mut entities = Vec::new();
    for entity in candidates {
        if matches_types(store, &entity, &args.types)? {
            entities.push(entity);
        }
    }

    match cli.output_format() {
        OutputFormat::Json => {
            let records: Vec<&Instance> = entities.iter().map(|e| e.as_ref()).collect();
            println!("{}", to_json(&records)?);
        }
        OutputFormat::Text => {
            for entity in &entities {
                println!("{}", entity.id());
            }
        }
    }
    Ok(())
}
