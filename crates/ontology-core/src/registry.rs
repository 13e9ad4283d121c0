//! Type declarations and single-parent inheritance

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{ChainKind, Error, Result};
use crate::instance::{Instance, ROOT_TYPE};
use crate::schema::deep_merge;

/// Visited-set bound for walks along parent, type or link chains
pub(crate) struct ChainGuard {
    kind: ChainKind,
    seen: HashSet<String>,
    chain: Vec<String>,
}

impl ChainGuard {
    pub(crate) fn new(kind: ChainKind) -> Self {
        Self {
            kind,
            seen: HashSet::new(),
            chain: Vec::new(),
        }
    }

    /// Record a step; revisiting an id is a cycle
    pub(crate) fn visit(&mut self, id: &str) -> Result<()> {
        self.chain.push(id.to_string());
        if !self.seen.insert(id.to_string()) {
            return Err(Error::Cycle {
                kind: self.kind,
                chain: std::mem::take(&mut self.chain),
            });
        }
        Ok(())
    }
}

/// Registered types, always containing the root type
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<Instance>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        let root = Arc::new(Instance::new(ROOT_TYPE, ROOT_TYPE));
        Self {
            types: HashMap::from([(ROOT_TYPE.to_string(), root)]),
        }
    }

    /// Register a type, returning the declaration it replaced
    pub fn register(&mut self, declaration: Arc<Instance>) -> Option<Arc<Instance>> {
        tracing::debug!("Registering type {}", declaration.id());
        self.types.insert(declaration.id().to_string(), declaration)
    }

    pub fn get(&self, type_id: &str) -> Option<&Arc<Instance>> {
        self.types.get(type_id)
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.types.contains_key(type_id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Instance>> {
        self.types.values()
    }

    /// Registered types from `type_id` up through its parents, leaf first
    ///
    /// The walk stops at the first parent that is not registered. An
    /// unregistered `type_id` yields an empty chain.
    pub fn ancestry(&self, type_id: &str) -> Result<Vec<&Arc<Instance>>> {
        let mut guard = ChainGuard::new(ChainKind::Parent);
        let mut chain = Vec::new();
        let mut current = self.types.get(type_id);

        while let Some(declaration) = current {
            guard.visit(declaration.id())?;
            chain.push(declaration);

            current = match declaration.parent() {
                Some(parent_id) => {
                    let parent = self.types.get(parent_id);
                    if parent.is_none() {
                        tracing::debug!(
                            "Parent {} of {} is not registered",
                            parent_id,
                            declaration.id()
                        );
                    }
                    parent
                }
                None => None,
            };
        }

        Ok(chain)
    }

    /// Specs of `type_id` and its ancestors, deep-merged root to leaf
    pub fn merged_spec(&self, type_id: &str) -> Result<Map<String, Value>> {
        let mut merged = Map::new();
        for declaration in self.ancestry(type_id)?.into_iter().rev() {
            if let Some(spec) = declaration.spec() {
                deep_merge(&mut merged, spec);
            }
        }
        Ok(merged)
    }

    /// Union of the `required` lists declared along the hierarchy
    pub fn required(&self, type_id: &str) -> Result<Vec<String>> {
        let mut required = BTreeSet::new();
        for declaration in self.ancestry(type_id)? {
            required.extend(declaration.required().into_iter().map(String::from));
        }
        Ok(required.into_iter().collect())
    }

    /// Whether walking `type_id` → parent → … reaches `ancestor`
    ///
    /// `ancestor` must be registered. `type_id` itself need not be: a type
    /// string equal to `ancestor` matches on its own.
    pub fn descends_from(&self, type_id: &str, ancestor: &str) -> Result<bool> {
        if !self.types.contains_key(ancestor) {
            return Ok(false);
        }

        let mut guard = ChainGuard::new(ChainKind::Parent);
        let mut current = Some(type_id);

        while let Some(id) = current {
            if id == ancestor {
                return Ok(true);
            }
            guard.visit(id)?;
            current = self.types.get(id).and_then(|t| t.parent());
        }

        Ok(false)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn declare(id: &str, parent: Option<&str>, spec: Value) -> Arc<Instance> {
        let mut declaration = Instance::new(id, ROOT_TYPE).with_property("spec", spec);
        if let Some(parent) = parent {
            declaration = declaration.with_property("parent", parent);
        }
        Arc::new(declaration)
    }

    #[test]
    fn test_seeded_with_root() {
        let registry = TypeRegistry::new();
        assert!(registry.contains(ROOT_TYPE));
        assert!(registry.merged_spec(ROOT_TYPE).unwrap().is_empty());
    }

    #[test]
    fn test_merged_spec_child_wins() {
        let mut registry = TypeRegistry::new();
        registry.register(declare("/type/p", None, json!({ "x": 0, "y": 2 })));
        registry.register(declare("/type/c", Some("/type/p"), json!({ "x": 1 })));

        let merged = registry.merged_spec("/type/c").unwrap();
        assert_eq!(Value::Object(merged), json!({ "x": 1, "y": 2 }));
    }

    #[test]
    fn test_ancestry_stops_at_unregistered_parent() {
        let mut registry = TypeRegistry::new();
        registry.register(declare("/entity/v1/computer", Some("/entity"), json!({})));

        let chain: Vec<&str> = registry
            .ancestry("/entity/v1/computer")
            .unwrap()
            .iter()
            .map(|t| t.id())
            .collect();
        assert_eq!(chain, vec!["/entity/v1/computer"]);
        assert!(registry.ancestry("/nope").unwrap().is_empty());
    }

    #[test]
    fn test_parent_cycle_is_an_error() {
        let mut registry = TypeRegistry::new();
        registry.register(declare("/type/a", Some("/type/b"), json!({})));
        registry.register(declare("/type/b", Some("/type/a"), json!({})));

        match registry.merged_spec("/type/a") {
            Err(Error::Cycle { kind, chain }) => {
                assert_eq!(kind, ChainKind::Parent);
                assert_eq!(chain, vec!["/type/a", "/type/b", "/type/a"]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
        assert!(registry.descends_from("/type/a", "/type/root-less").is_ok());
        assert!(matches!(
            registry.descends_from("/type/a", ROOT_TYPE),
            Err(Error::Cycle { .. })
        ));
    }

    #[test]
    fn test_descends_from() {
        let mut registry = TypeRegistry::new();
        registry.register(declare("/entity", None, json!({})));
        registry.register(declare("/entity/v1/computer", Some("/entity"), json!({})));
        registry.register(declare("/entity/v1/repository", Some("/entity"), json!({})));

        assert!(registry.descends_from("/entity/v1/computer", "/entity").unwrap());
        assert!(registry
            .descends_from("/entity/v1/computer", "/entity/v1/computer")
            .unwrap());
        assert!(!registry
            .descends_from("/entity/v1/computer", "/entity/v1/repository")
            .unwrap());
        assert!(!registry.descends_from("/entity/v1/computer", "/unregistered").unwrap());
    }

    #[test]
    fn test_required_is_unioned() {
        let mut registry = TypeRegistry::new();
        registry.register(Arc::new(
            Instance::new("/relation", ROOT_TYPE).with_property("required", json!(["a", "b"])),
        ));
        registry.register(Arc::new(
            Instance::new("/relation/v1/was_built_by", ROOT_TYPE)
                .with_property("parent", "/relation")
                .with_property("required", json!(["ref"])),
        ));

        assert_eq!(
            registry.required("/relation/v1/was_built_by").unwrap(),
            vec!["a", "b", "ref"]
        );
    }
}
