//! Graph traversal over the relation adjacency index

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::instance::Instance;
use crate::store::GraphState;

/// Direction for graph traversal
///
/// Relations point from `a` to `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Follow relations from their `a` end to their `b` end
    Outgoing,
    /// Follow relations from their `b` end back to their `a` end
    Incoming,
    #[default]
    Both,
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "out" | "outgoing" => Ok(Self::Outgoing),
            "in" | "incoming" => Ok(Self::Incoming),
            "both" => Ok(Self::Both),
            other => Err(format!("unknown direction: {}", other)),
        }
    }
}

/// Traversal query builder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalQuery {
    /// Starting entity id (link aliases are followed)
    pub start: String,

    /// Maximum traversal depth
    #[serde(default = "default_depth")]
    pub max_depth: u32,

    /// Traversal direction
    #[serde(default)]
    pub direction: Direction,

    /// Only cross relations of these types or their subtypes (empty = all)
    #[serde(default)]
    pub relation_types: Vec<String>,

    /// Only step onto stored entities of these types or their subtypes (empty = all)
    #[serde(default)]
    pub entity_types: Vec<String>,
}

fn default_depth() -> u32 {
    2
}

impl Default for TraversalQuery {
    fn default() -> Self {
        Self {
            start: String::new(),
            max_depth: default_depth(),
            direction: Direction::Both,
            relation_types: Vec::new(),
            entity_types: Vec::new(),
        }
    }
}

impl TraversalQuery {
    /// Create a new traversal query starting from an entity
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            ..Default::default()
        }
    }

    /// Set maximum traversal depth
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set traversal direction
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Constrain the relation types that may be crossed
    pub fn constrain_relations(mut self, types: Vec<String>) -> Self {
        self.relation_types = types;
        self
    }

    /// Filter by entity types during traversal
    pub fn filter_entity_types(mut self, types: Vec<String>) -> Self {
        self.entity_types = types;
        self
    }
}

/// Result of a traversal
#[derive(Debug, Clone)]
pub struct TraversalResult {
    /// Canonical id the traversal started from
    pub start: String,

    /// Entity ids reached, in breadth-first order, starting with `start`
    pub visited: Vec<String>,

    /// Relations crossed to reach them
    pub relations: Vec<Arc<Instance>>,

    pub stats: TraversalStats,
}

/// Traversal statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraversalStats {
    pub nodes_visited: usize,
    pub edges_traversed: usize,
    pub max_depth_reached: u32,
}

/// Graph traversal engine
pub(crate) struct TraversalEngine;

impl TraversalEngine {
    /// Depth-bounded, filtered BFS from `query.start`
    pub(crate) fn execute(query: &TraversalQuery, state: &GraphState) -> TraversalResult {
        tracing::debug!(
            "Executing traversal: start={}, depth={}, direction={:?}",
            query.start,
            query.max_depth,
            query.direction
        );

        let start = match state.canonical_id(&query.start) {
            Ok(id) => id.to_string(),
            Err(e) => {
                tracing::warn!("Not following links from {}: {}", query.start, e);
                query.start.clone()
            }
        };

        let mut visited: HashSet<String> = HashSet::new();
        let mut order: Vec<String> = Vec::new();
        let mut crossed: HashSet<String> = HashSet::new();
        let mut relations: Vec<Arc<Instance>> = Vec::new();
        let mut queue: VecDeque<(String, u32)> = VecDeque::new();
        let mut stats = TraversalStats::default();

        queue.push_back((start.clone(), 0));
        visited.insert(start.clone());
        order.push(start.clone());

        while let Some((current, depth)) = queue.pop_front() {
            stats.nodes_visited += 1;
            stats.max_depth_reached = stats.max_depth_reached.max(depth);

            if depth >= query.max_depth {
                continue;
            }

            for (rel, next) in Self::neighbours(&current, query.direction, state) {
                stats.edges_traversed += 1;

                if !Self::matches_any(state, rel.type_id(), &query.relation_types) {
                    continue;
                }

                if !query.entity_types.is_empty() {
                    if let Some(entity) = state.entity(next) {
                        if !Self::matches_any(state, entity.type_id(), &query.entity_types) {
                            continue;
                        }
                    }
                }

                if crossed.insert(rel.id().to_string()) {
                    relations.push(Arc::clone(rel));
                }

                if visited.insert(next.to_string()) {
                    order.push(next.to_string());
                    queue.push_back((next.to_string(), depth + 1));
                }
            }
        }

        tracing::debug!(
            "Traversal visited {} nodes, traversed {} edges",
            stats.nodes_visited,
            stats.edges_traversed
        );

        TraversalResult {
            start,
            visited: order,
            relations,
            stats,
        }
    }

    /// Every relation in the connected component around `id`
    ///
    /// Starts from the relations touching `id` and, round by round, adds the
    /// relations touching any endpoint of the previous round's additions.
    /// Stops when a round adds nothing. Relations are deduplicated by id.
    pub(crate) fn connected_relations(id: &str, state: &GraphState) -> Vec<Arc<Instance>> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut expanded: HashSet<&str> = HashSet::from([id]);
        let mut component: Vec<Arc<Instance>> = Vec::new();
        let mut frontier: Vec<&Arc<Instance>> = state.relations_touching(id).collect();
        let mut rounds = 0usize;

        while !frontier.is_empty() {
            rounds += 1;
            let mut added: Vec<&Arc<Instance>> = Vec::new();
            for rel in frontier {
                if seen.insert(rel.id()) {
                    component.push(Arc::clone(rel));
                    added.push(rel);
                }
            }

            frontier = added
                .into_iter()
                .filter_map(|rel| rel.endpoints())
                .flat_map(|(a, b)| [a, b])
                .filter(|end| expanded.insert(*end))
                .flat_map(|end| state.relations_touching(end))
                .filter(|rel| !seen.contains(rel.id()))
                .collect();
        }

        tracing::debug!(
            "Connected component of {} has {} relations after {} rounds",
            id,
            component.len(),
            rounds
        );

        component
    }

    /// Relations leaving `node` in `direction`, paired with the node they lead to
    fn neighbours<'a>(
        node: &'a str,
        direction: Direction,
        state: &'a GraphState,
    ) -> impl Iterator<Item = (&'a Arc<Instance>, &'a str)> + 'a {
        state.relations_touching(node).filter_map(move |rel| {
            let (a, b) = rel.endpoints()?;
            match direction {
                Direction::Outgoing if a == node => Some((rel, b)),
                Direction::Incoming if b == node => Some((rel, a)),
                Direction::Both => rel.other_end(node).map(|other| (rel, other)),
                _ => None,
            }
        })
    }

    fn matches_any(state: &GraphState, type_id: &str, wanted: &[String]) -> bool {
        if wanted.is_empty() {
            return true;
        }
        wanted
            .iter()
            .any(|ancestor| match state.registry.descends_from(type_id, ancestor) {
                Ok(matches) => matches,
                Err(e) => {
                    tracing::warn!("Cannot match {} against {}: {}", type_id, ancestor, e);
                    false
                }
            })
    }
}
