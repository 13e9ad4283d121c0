//! The graph store: owns every instance and the indices over them
//!
//! # Concurrency
//!
//! A [`GraphStore`] is shared between loader tasks as `Arc<GraphStore>`.
//! Normalization and validation run outside the write lock; only the index
//! update in [`GraphStore::add_instance`] takes it, and it does no I/O
//! while held. Readers take the read side of the same lock, so a lookup
//! sees each `add` either completely or not at all.

use std::collections::{btree_map, BTreeMap, HashMap, HashSet};
use std::iter::Flatten;
use std::option;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ChainKind, Diagnostic, Error, Result, Side, ValidationError, ValidationErrors};
use crate::instance::{Category, Instance};
use crate::registry::{ChainGuard, TypeRegistry};
use crate::schema::{ReferenceResolver, Referent};
use crate::traversal::{TraversalEngine, TraversalQuery, TraversalResult};
use crate::validator::{ValidateOptions, Validator};

/// Type given to a placeholder endpoint when the relation's spec has no
/// `pointer_to` for that side
pub const PLACEHOLDER_TYPE: &str = "/entity";

/// Instances keyed by id, iterated in id order
type IdIndex = BTreeMap<String, Arc<Instance>>;

/// Everything behind the store's lock
///
/// Every collection is keyed by instance id, so replacing an instance
/// touches a fixed number of map entries.
#[derive(Debug, Default)]
pub(crate) struct GraphState {
    entities: HashMap<String, Arc<Instance>>,
    relations: HashMap<String, Arc<Instance>>,
    /// Entities, relations and links by id
    by_id: HashMap<String, Arc<Instance>>,
    /// Entities by exact type id
    by_type: HashMap<String, IdIndex>,
    /// Relations by each endpoint id
    by_endpoint: HashMap<String, IdIndex>,
    pub(crate) registry: TypeRegistry,
}

impl GraphState {
    /// Relations with `id` as an endpoint, in relation id order
    pub(crate) fn relations_touching(
        &self,
        id: &str,
    ) -> Flatten<option::IntoIter<btree_map::Values<'_, String, Arc<Instance>>>> {
        self.by_endpoint
            .get(id)
            .map(BTreeMap::values)
            .into_iter()
            .flatten()
    }

    pub(crate) fn entity(&self, id: &str) -> Option<&Arc<Instance>> {
        self.entities.get(id)
    }

    /// Follow `link` aliases from `id` to the id they finally name
    pub(crate) fn canonical_id<'a>(&'a self, id: &'a str) -> Result<&'a str> {
        let mut guard = ChainGuard::new(ChainKind::Link);
        let mut current = id;

        while let Some(found) = self.by_id.get(current) {
            if found.category() != Category::Link {
                break;
            }
            let Some(target) = found.link_target() else {
                break;
            };
            guard.visit(current)?;
            current = target;
        }

        Ok(current)
    }

    /// Id lookup through links, falling back to type declarations
    fn lookup(&self, id: &str) -> Result<Option<&Arc<Instance>>> {
        let canonical = self.canonical_id(id)?;
        Ok(self
            .by_id
            .get(canonical)
            .filter(|found| found.category() != Category::Link)
            .or_else(|| self.registry.get(canonical)))
    }

    /// Index an instance, returning a diagnostic if it replaced another
    fn insert(&mut self, instance: Arc<Instance>) -> Option<Diagnostic> {
        let category = instance.category();
        let id = instance.id().to_string();

        let replaced = match category {
            Category::Type => self.registry.register(Arc::clone(&instance)).is_some(),
            Category::Entity | Category::Relation | Category::Link => {
                let previous = self.by_id.insert(id.clone(), Arc::clone(&instance));
                if let Some(previous) = &previous {
                    self.evict(previous);
                }

                match category {
                    Category::Entity => {
                        self.by_type
                            .entry(instance.type_id().to_string())
                            .or_default()
                            .insert(id.clone(), Arc::clone(&instance));
                        self.entities.insert(id.clone(), instance);
                    }
                    Category::Relation => {
                        // A self-loop lands in one adjacency entry
                        if let Some((a, b)) = instance.endpoints() {
                            for end in [a, b] {
                                self.by_endpoint
                                    .entry(end.to_string())
                                    .or_default()
                                    .insert(id.clone(), Arc::clone(&instance));
                            }
                        }
                        self.relations.insert(id.clone(), instance);
                    }
                    _ => {}
                }

                previous.is_some()
            }
            Category::Unknown => false,
        };

        replaced.then_some(Diagnostic::Overwrite { id, category })
    }

    /// Drop a replaced instance from the category-specific indices
    fn evict(&mut self, previous: &Instance) {
        let id = previous.id();
        match previous.category() {
            Category::Entity => {
                self.entities.remove(id);
                remove_from(&mut self.by_type, previous.type_id(), id);
            }
            Category::Relation => {
                self.relations.remove(id);
                if let Some((a, b)) = previous.endpoints() {
                    for end in [a, b] {
                        remove_from(&mut self.by_endpoint, end, id);
                    }
                }
            }
            _ => {}
        }
    }

    fn validator(&self, options: ValidateOptions) -> Validator<'_> {
        Validator::new(&self.registry, self, options)
    }
}

/// Remove `id` from the index under `key`, dropping the key once empty
fn remove_from(index: &mut HashMap<String, IdIndex>, key: &str, id: &str) {
    if let Some(ids) = index.get_mut(key) {
        ids.remove(id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

fn sorted<'a>(instances: impl Iterator<Item = &'a Arc<Instance>>) -> Vec<Arc<Instance>> {
    let mut instances: Vec<Arc<Instance>> = instances.cloned().collect();
    instances.sort_by(|a, b| a.id().cmp(b.id()));
    instances
}

impl ReferenceResolver for GraphState {
    fn resolve_reference(&self, id: &str, type_id: &str) -> Referent {
        // Only entities satisfy pointer_to
        let found = match self.canonical_id(id) {
            Ok(canonical) => match self.entity(canonical) {
                Some(found) => found,
                None => return Referent::Missing,
            },
            Err(e) => {
                tracing::warn!("Cannot resolve reference {}: {}", id, e);
                return Referent::Missing;
            }
        };

        match self.registry.descends_from(found.type_id(), type_id) {
            Ok(true) => Referent::Found,
            Ok(false) => Referent::WrongType {
                actual: found.type_id().to_string(),
            },
            Err(e) => {
                tracing::warn!("Cannot check type of {}: {}", id, e);
                Referent::WrongType {
                    actual: found.type_id().to_string(),
                }
            }
        }
    }
}

/// Counts of what the store holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub entities: usize,
    pub relations: usize,
    pub types: usize,
    pub links: usize,
}

#[derive(Debug, Default)]
struct DiagnosticLog {
    entries: Vec<Diagnostic>,
    /// Lookup diagnostics already in `entries`
    seen: HashSet<Diagnostic>,
}

/// In-memory typed graph of entities, relations, types and links
#[derive(Debug, Default)]
pub struct GraphStore {
    state: RwLock<GraphState>,
    diagnostics: Mutex<DiagnosticLog>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ingestion
    // ─────────────────────────────────────────────────────────────────────────

    /// Normalize a raw record and index it
    ///
    /// With `validate`, a record that fails validation is rejected with
    /// [`Error::InvalidRecord`] and nothing is indexed.
    pub fn add(&self, record: Value, validate: bool) -> Result<Arc<Instance>> {
        let instance = Instance::from_record(record)?;
        self.add_instance(instance, validate)
    }

    /// Index an already-normalized instance
    pub fn add_instance(&self, instance: Instance, validate: bool) -> Result<Arc<Instance>> {
        instance.check_structure()?;

        if validate {
            let errors = self.validate(&instance)?;
            if !errors.is_empty() {
                tracing::debug!("Rejecting {}: {} problems", instance, errors.len());
                return Err(Error::InvalidRecord(ValidationErrors(errors)));
            }
        }

        let instance = Arc::new(instance);

        if instance.category() == Category::Unknown {
            self.report(Diagnostic::UnknownCategory {
                id: instance.id().to_string(),
                type_id: instance.type_id().to_string(),
            });
            return Ok(instance);
        }

        let replaced = self.state.write().insert(Arc::clone(&instance));
        if let Some(diagnostic) = replaced {
            self.report(diagnostic);
        }

        tracing::trace!("Added {}", instance);
        Ok(instance)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Diagnostics
    // ─────────────────────────────────────────────────────────────────────────

    fn report(&self, diagnostic: Diagnostic) {
        tracing::warn!("{}", diagnostic);
        self.diagnostics.lock().entries.push(diagnostic);
    }

    /// Report a diagnostic raised by a read, unless it is already logged
    fn report_once(&self, diagnostic: Diagnostic) {
        let mut log = self.diagnostics.lock();
        if log.seen.insert(diagnostic.clone()) {
            tracing::warn!("{}", diagnostic);
            log.entries.push(diagnostic);
        } else {
            tracing::debug!("{}", diagnostic);
        }
    }

    /// Diagnostics reported so far
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().entries.clone()
    }

    /// Diagnostics reported so far, clearing the log
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        let mut log = self.diagnostics.lock();
        log.seen.clear();
        std::mem::take(&mut log.entries)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────────────────

    /// Look up an instance by id
    ///
    /// Link aliases are followed to the canonical instance. Ids of
    /// relations and type declarations resolve too. A link cycle is
    /// reported as a diagnostic and yields `None`.
    pub fn by_id(&self, id: &str) -> Option<Arc<Instance>> {
        let found = {
            let state = self.state.read();
            state.lookup(id).map(|found| found.cloned())
        };

        match found {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!("Lookup of {} failed: {}", id, e);
                self.report_once(Diagnostic::LinkCycle { id: id.to_string() });
                None
            }
        }
    }

    /// The id `id` names once link aliases are followed
    pub fn canonical_id(&self, id: &str) -> Result<String> {
        let state = self.state.read();
        state.canonical_id(id).map(String::from)
    }

    /// Immediate target of a link record
    pub fn link_target(&self, id: &str) -> Option<String> {
        let state = self.state.read();
        state
            .by_id
            .get(id)
            .and_then(|found| found.link_target())
            .map(String::from)
    }

    /// Every entity, in id order
    pub fn entities(&self) -> Vec<Arc<Instance>> {
        sorted(self.state.read().entities.values())
    }

    /// Every relation, in id order
    pub fn relations(&self) -> Vec<Arc<Instance>> {
        sorted(self.state.read().relations.values())
    }

    pub fn types(&self) -> Vec<Arc<Instance>> {
        self.state.read().registry.iter().cloned().collect()
    }

    pub fn type_declaration(&self, type_id: &str) -> Option<Arc<Instance>> {
        self.state.read().registry.get(type_id).cloned()
    }

    /// Entities whose type is exactly `type_id`
    pub fn entities_by_type(&self, type_id: &str) -> Vec<Arc<Instance>> {
        self.state
            .read()
            .by_type
            .get(type_id)
            .map(|of_type| of_type.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Entities whose type is `type_id` or descends from it
    pub fn entities_of_type(&self, type_id: &str) -> Result<Vec<Arc<Instance>>> {
        let state = self.state.read();
        let mut matching = Vec::new();
        for entity in state.entities.values() {
            if state.registry.descends_from(entity.type_id(), type_id)? {
                matching.push(Arc::clone(entity));
            }
        }
        matching.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(matching)
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.state.read();
        StoreStats {
            entities: state.entities.len(),
            relations: state.relations.len(),
            types: state.registry.len(),
            links: state
                .by_id
                .values()
                .filter(|found| found.category() == Category::Link)
                .count(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Types
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether the instance's type is `type_id` or descends from it
    pub fn type_of(&self, instance: &Instance, type_id: &str) -> Result<bool> {
        self.state
            .read()
            .registry
            .descends_from(instance.type_id(), type_id)
    }

    /// Ids of `type_id` and its registered ancestors, leaf first
    pub fn ancestry(&self, type_id: &str) -> Result<Vec<String>> {
        let state = self.state.read();
        let chain = state.registry.ancestry(type_id)?;
        Ok(chain.iter().map(|t| t.id().to_string()).collect())
    }

    /// Root-to-leaf deep merge of the specs along `type_id`'s hierarchy
    pub fn merged_spec(&self, type_id: &str) -> Result<Map<String, Value>> {
        self.state.read().registry.merged_spec(type_id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation
    // ─────────────────────────────────────────────────────────────────────────

    pub fn validate(&self, instance: &Instance) -> Result<Vec<ValidationError>> {
        self.validate_with(instance, ValidateOptions::default())
    }

    pub fn validate_with(
        &self,
        instance: &Instance,
        options: ValidateOptions,
    ) -> Result<Vec<ValidationError>> {
        let state = self.state.read();
        state.validator(options).validate(instance)
    }

    /// Validate a raw record; a record that does not normalize is
    /// reported as "not a proper instance"
    pub fn validate_record(&self, record: &Value) -> Result<Vec<ValidationError>> {
        let state = self.state.read();
        state
            .validator(ValidateOptions::default())
            .validate_record(record)
    }

    pub fn is_valid(&self, instance: &Instance) -> Result<bool> {
        Ok(self.validate(instance)?.is_empty())
    }

    pub fn is_valid_record(&self, record: &Value) -> Result<bool> {
        Ok(self.validate_record(record)?.is_empty())
    }

    /// Relations that fail validation, with their problems
    pub fn invalid_relations(&self) -> Result<Vec<(String, Vec<ValidationError>)>> {
        let state = self.state.read();
        let validator = state.validator(ValidateOptions::default());

        let mut invalid = Vec::new();
        for relation in state.relations.values() {
            let errors = validator.validate(relation)?;
            if !errors.is_empty() {
                invalid.push((relation.id().to_string(), errors));
            }
        }
        invalid.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(invalid)
    }

    /// Whether every stored relation independently passes validation
    pub fn all_relations_valid(&self) -> Result<bool> {
        Ok(self.invalid_relations()?.is_empty())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Relations and traversal
    // ─────────────────────────────────────────────────────────────────────────

    /// Relations with `id` as either endpoint
    pub fn relations_for(&self, id: &str) -> Vec<Arc<Instance>> {
        self.state.read().relations_touching(id).cloned().collect()
    }

    /// Every relation reachable from `id` through shared endpoints
    ///
    /// The result has no defined order and holds each relation once.
    pub fn all_relations_for(&self, id: &str) -> Vec<Arc<Instance>> {
        let state = self.state.read();
        TraversalEngine::connected_relations(id, &state)
    }

    /// Depth-bounded traversal from `query.start`
    pub fn traverse(&self, query: &TraversalQuery) -> TraversalResult {
        let state = self.state.read();
        TraversalEngine::execute(query, &state)
    }

    /// Both endpoints of a relation
    ///
    /// A missing endpoint is replaced by a placeholder typed from the
    /// relation type's `pointer_to` for that side. Without a `pointer_to`
    /// the placeholder gets [`PLACEHOLDER_TYPE`] and a
    /// [`Diagnostic::MissingPointerTo`] is reported.
    pub fn resolve(&self, relation: &Instance) -> Result<(Arc<Instance>, Arc<Instance>)> {
        let (a, b) = relation
            .endpoints()
            .ok_or_else(|| Error::NotARelation(relation.id().to_string()))?;

        let mut diagnostics = Vec::new();
        let resolved = {
            let state = self.state.read();
            let spec = state
                .registry
                .merged_spec(relation.type_id())
                .unwrap_or_else(|e| {
                    tracing::warn!("No spec for {}: {}", relation.type_id(), e);
                    Map::new()
                });

            let mut endpoint = |side: Side, id: &str| -> Arc<Instance> {
                match state.lookup(id) {
                    Ok(Some(found)) => return Arc::clone(found),
                    Ok(None) => {}
                    Err(_) => diagnostics.push(Diagnostic::LinkCycle { id: id.to_string() }),
                }

                let pointer_to = spec
                    .get(side.key())
                    .and_then(|s| s.get("pointer_to"))
                    .and_then(Value::as_str);

                let type_id = match pointer_to {
                    Some(type_id) => type_id,
                    None => {
                        diagnostics.push(Diagnostic::MissingPointerTo {
                            relation: relation.id().to_string(),
                            relation_type: relation.type_id().to_string(),
                            side,
                        });
                        PLACEHOLDER_TYPE
                    }
                };

                Arc::new(Instance::new(id, type_id))
            };

            (endpoint(Side::A, a), endpoint(Side::B, b))
        };

        for diagnostic in diagnostics {
            self.report_once(diagnostic);
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COMPUTER: &str = "/entity/v1/computer";
    const RUNNING_ON: &str = "/relation/v1/is_running_on";

    fn type_record(id: &str, properties: Value) -> Value {
        json!({ "metadata": { "id": id, "type": "/type" }, "properties": properties })
    }

    fn entity(id: &str, type_id: &str, properties: Value) -> Value {
        json!({ "metadata": { "id": id, "type": type_id }, "properties": properties })
    }

    fn relation(id: &str, type_id: &str, a: &str, b: &str) -> Value {
        json!({ "metadata": { "id": id, "type": type_id }, "properties": { "a": a, "b": b } })
    }

    fn ids(instances: &[Arc<Instance>]) -> Vec<String> {
        let mut ids: Vec<String> = instances.iter().map(|i| i.id().to_string()).collect();
        ids.sort();
        ids
    }

    fn computer_store() -> GraphStore {
        let store = GraphStore::new();
        store
            .add(
                type_record(COMPUTER, json!({ "spec": { "image": { "type": "string" } } })),
                true,
            )
            .unwrap();
        store
            .add(
                type_record(
                    RUNNING_ON,
                    json!({ "spec": { "a": { "type": "string", "pointer_to": COMPUTER } } }),
                ),
                true,
            )
            .unwrap();
        store
    }

    #[test]
    fn test_end_to_end() {
        let store = computer_store();
        let added = store
            .add(entity("/c1", COMPUTER, json!({ "image": "ubuntu" })), true)
            .unwrap();

        assert!(store.is_valid(&added).unwrap());
        assert_eq!(ids(&store.entities_by_type(COMPUTER)), vec!["/c1"]);
        assert_eq!(store.by_id("/c1").unwrap().get_str("image"), Some("ubuntu"));
    }

    #[test]
    fn test_strict_mode_rejects_without_indexing() {
        let store = computer_store();
        let result = store.add(entity("/c1", COMPUTER, json!({ "image": 42 })), true);

        match result {
            Err(Error::InvalidRecord(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("expected InvalidRecord, got {:?}", other),
        }
        assert!(store.by_id("/c1").is_none());
        assert!(store.entities_by_type(COMPUTER).is_empty());
    }

    #[test]
    fn test_overwrite_is_last_write_wins() {
        let store = computer_store();
        store
            .add(entity("/x", COMPUTER, json!({ "image": "ubuntu" })), false)
            .unwrap();
        store
            .add(entity("/x", COMPUTER, json!({ "image": "alpine" })), false)
            .unwrap();

        assert_eq!(store.by_id("/x").unwrap().get_str("image"), Some("alpine"));
        assert_eq!(store.entities_by_type(COMPUTER).len(), 1);
        assert_eq!(store.stats().entities, 1);
        assert!(store.diagnostics().contains(&Diagnostic::Overwrite {
            id: "/x".into(),
            category: Category::Entity,
        }));
    }

    #[test]
    fn test_overwrite_moves_type_index() {
        let store = GraphStore::new();
        store.add(entity("/x", "/entity/v1/a", json!({})), false).unwrap();
        store.add(entity("/x", "/entity/v1/b", json!({})), false).unwrap();

        assert!(store.entities_by_type("/entity/v1/a").is_empty());
        assert_eq!(ids(&store.entities_by_type("/entity/v1/b")), vec!["/x"]);
    }

    #[test]
    fn test_relation_overwrite_updates_adjacency() {
        let store = GraphStore::new();
        store.add(relation("/r", RUNNING_ON, "/a", "/b"), false).unwrap();
        store.add(relation("/r", RUNNING_ON, "/a", "/c"), false).unwrap();

        assert!(store.relations_for("/b").is_empty());
        assert_eq!(ids(&store.relations_for("/c")), vec!["/r"]);
        assert_eq!(store.relations_for("/a").len(), 1);
        assert_eq!(store.stats().relations, 1);
    }

    #[test]
    fn test_mass_overwrite_keeps_indices_consistent() {
        let store = GraphStore::new();
        for n in 0..500 {
            let id = format!("/n/{}", n);
            store.add(entity(&id, "/entity/v1/a", json!({})), false).unwrap();
            store
                .add(relation(&format!("/r/{}", n), RUNNING_ON, &id, "/hub"), false)
                .unwrap();
        }
        for n in 0..500 {
            let id = format!("/n/{}", n);
            store.add(entity(&id, "/entity/v1/b", json!({})), false).unwrap();
            store
                .add(relation(&format!("/r/{}", n), RUNNING_ON, &id, "/spoke"), false)
                .unwrap();
        }

        let stats = store.stats();
        assert_eq!((stats.entities, stats.relations), (500, 500));
        assert!(store.entities_by_type("/entity/v1/a").is_empty());
        assert_eq!(store.entities_by_type("/entity/v1/b").len(), 500);
        assert!(store.relations_for("/hub").is_empty());
        assert_eq!(store.relations_for("/spoke").len(), 500);
        assert_eq!(store.relations_for("/n/7").len(), 1);
        assert_eq!(store.entities().len(), 500);
        assert_eq!(store.relations().len(), 500);
        assert_eq!(store.take_diagnostics().len(), 1000);
    }

    #[test]
    fn test_unknown_category_is_not_indexed() {
        let store = GraphStore::new();
        let instance = store
            .add(entity("/odd", "/gizmo/v1/thing", json!({})), false)
            .unwrap();

        assert_eq!(instance.category(), Category::Unknown);
        assert!(store.by_id("/odd").is_none());
        assert_eq!(
            store.take_diagnostics(),
            vec![Diagnostic::UnknownCategory {
                id: "/odd".into(),
                type_id: "/gizmo/v1/thing".into(),
            }]
        );
        assert!(store.diagnostics().is_empty());
    }

    #[test]
    fn test_relations_for_both_endpoints() {
        let store = GraphStore::new();
        store.add(relation("/r1", RUNNING_ON, "/a", "/b"), false).unwrap();

        assert_eq!(ids(&store.relations_for("/a")), vec!["/r1"]);
        assert_eq!(ids(&store.relations_for("/b")), vec!["/r1"]);
        assert!(store.relations_for("/c").is_empty());
    }

    #[test]
    fn test_chain_component() {
        let store = GraphStore::new();
        for id in ["/A", "/B", "/C"] {
            store.add(entity(id, COMPUTER, json!({})), false).unwrap();
        }
        store.add(relation("/R1", RUNNING_ON, "/A", "/B"), false).unwrap();
        store.add(relation("/R2", RUNNING_ON, "/B", "/C"), false).unwrap();
        store.add(relation("/R3", RUNNING_ON, "/X", "/Y"), false).unwrap();

        assert_eq!(ids(&store.all_relations_for("/A")), vec!["/R1", "/R2"]);
        assert_eq!(ids(&store.all_relations_for("/C")), vec!["/R1", "/R2"]);
        assert!(store.all_relations_for("/nowhere").is_empty());
    }

    #[test]
    fn test_component_handles_cycles_and_self_loops() {
        let store = GraphStore::new();
        store.add(relation("/r1", RUNNING_ON, "/a", "/b"), false).unwrap();
        store.add(relation("/r2", RUNNING_ON, "/b", "/a"), false).unwrap();
        store.add(relation("/r3", RUNNING_ON, "/a", "/a"), false).unwrap();

        assert_eq!(store.relations_for("/a").len(), 3);
        assert_eq!(ids(&store.all_relations_for("/b")), vec!["/r1", "/r2", "/r3"]);
    }

    #[test]
    fn test_type_of_walks_parents() {
        let store = GraphStore::new();
        store.add(type_record("/entity/v1/p", json!({})), false).unwrap();
        store
            .add(type_record("/entity/v1/c", json!({ "parent": "/entity/v1/p" })), false)
            .unwrap();
        store.add(type_record("/entity/v1/other", json!({})), false).unwrap();
        let child = store.add(entity("/i", "/entity/v1/c", json!({})), false).unwrap();

        assert!(store.type_of(&child, "/entity/v1/p").unwrap());
        assert!(store.type_of(&child, "/entity/v1/c").unwrap());
        assert!(!store.type_of(&child, "/entity/v1/other").unwrap());
        assert_eq!(
            store.ancestry("/entity/v1/c").unwrap(),
            vec!["/entity/v1/c", "/entity/v1/p"]
        );
        assert_eq!(ids(&store.entities_of_type("/entity/v1/p").unwrap()), vec!["/i"]);
        assert!(store.entities_by_type("/entity/v1/p").is_empty());
    }

    #[test]
    fn test_merged_spec_scenario() {
        let store = GraphStore::new();
        store
            .add(type_record("/type/p", json!({ "spec": { "x": 0, "y": 2 } })), false)
            .unwrap();
        store
            .add(
                type_record("/type/c", json!({ "parent": "/type/p", "spec": { "x": 1 } })),
                false,
            )
            .unwrap();

        assert_eq!(
            Value::Object(store.merged_spec("/type/c").unwrap()),
            json!({ "x": 1, "y": 2 })
        );
    }

    #[test]
    fn test_missing_type_is_invalid() {
        let store = GraphStore::new();
        let record = json!({ "metadata": { "id": "/x" }, "properties": {} });

        assert!(!store.validate_record(&record).unwrap().is_empty());
        assert!(!store.is_valid_record(&record).unwrap());
        assert!(matches!(store.add(record, false), Err(Error::Structural(_))));
    }

    #[test]
    fn test_unregistered_type_is_invalid() {
        let store = GraphStore::new();
        let instance = Instance::new("/x", "/entity/v1/unregistered");
        assert_eq!(
            store.validate(&instance).unwrap(),
            vec![ValidationError::TypeResolution {
                type_id: "/entity/v1/unregistered".into()
            }]
        );
    }

    #[test]
    fn test_cross_reference() {
        let store = computer_store();
        let rel = Instance::new("/r1", RUNNING_ON)
            .with_property("a", "/c1")
            .with_property("b", "/anything");

        // referent missing
        assert!(!store.is_valid(&rel).unwrap());

        // referent present but of another type
        store
            .add(entity("/c1", "/entity/v1/repository", json!({})), false)
            .unwrap();
        assert!(!store.is_valid(&rel).unwrap());

        // referent of the right type
        store
            .add(entity("/c1", COMPUTER, json!({ "image": "ubuntu" })), false)
            .unwrap();
        let referent = store.by_id("/c1").unwrap();
        assert!(store.type_of(&referent, COMPUTER).unwrap());
        assert!(store.is_valid(&rel).unwrap());
    }

    #[test]
    fn test_cross_reference_accepts_subtypes() {
        let store = computer_store();
        store
            .add(type_record("/entity/v1/vm", json!({ "parent": COMPUTER })), false)
            .unwrap();
        store.add(entity("/vm1", "/entity/v1/vm", json!({})), false).unwrap();

        let rel = Instance::new("/r1", RUNNING_ON)
            .with_property("a", "/vm1")
            .with_property("b", "/host");
        assert!(store.is_valid(&rel).unwrap());
    }

    #[test]
    fn test_pointer_to_needs_an_entity() {
        let store = computer_store();
        store
            .add(type_record("/relation/v1/odd", json!({ "parent": COMPUTER })), false)
            .unwrap();
        store.add(relation("/r9", "/relation/v1/odd", "/x", "/y"), false).unwrap();

        // /r9's type descends from the pointer_to target, but it is no entity
        let rel = Instance::new("/r1", RUNNING_ON)
            .with_property("a", "/r9")
            .with_property("b", "/host");
        assert!(!store.is_valid(&rel).unwrap());

        let at_type = Instance::new("/r2", RUNNING_ON)
            .with_property("a", COMPUTER)
            .with_property("b", "/host");
        assert!(!store.is_valid(&at_type).unwrap());
    }

    #[test]
    fn test_all_relations_valid() {
        let store = computer_store();
        store.add(entity("/c1", COMPUTER, json!({})), false).unwrap();
        store.add(relation("/ok", RUNNING_ON, "/c1", "/x"), false).unwrap();
        assert!(store.all_relations_valid().unwrap());

        store.add(relation("/bad", RUNNING_ON, "/ghost", "/x"), false).unwrap();
        assert!(!store.all_relations_valid().unwrap());

        let invalid = store.invalid_relations().unwrap();
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].0, "/bad");
    }

    #[test]
    fn test_links_redirect_lookups() {
        let store = GraphStore::new();
        store.add(entity("/c1", COMPUTER, json!({})), false).unwrap();
        store
            .add(
                json!({ "metadata": { "id": "/alias", "type": "/link" }, "properties": { "link": "/c1" } }),
                false,
            )
            .unwrap();

        assert_eq!(store.by_id("/alias").unwrap().id(), "/c1");
        assert_eq!(store.link_target("/alias").as_deref(), Some("/c1"));
        assert_eq!(store.canonical_id("/alias").unwrap(), "/c1");
        assert_eq!(store.stats().links, 1);
    }

    #[test]
    fn test_link_cycle_is_surfaced() {
        let store = GraphStore::new();
        for (id, target) in [("/l1", "/l2"), ("/l2", "/l1")] {
            store
                .add(
                    json!({ "metadata": { "id": id, "type": "/link" }, "properties": { "link": target } }),
                    false,
                )
                .unwrap();
        }

        assert!(store.by_id("/l1").is_none());
        assert!(matches!(
            store.canonical_id("/l1"),
            Err(Error::Cycle {
                kind: ChainKind::Link,
                ..
            })
        ));
        assert!(store
            .diagnostics()
            .contains(&Diagnostic::LinkCycle { id: "/l1".into() }));
    }

    #[test]
    fn test_resolve_with_placeholders() {
        let store = computer_store();
        store
            .add(entity("/c1", COMPUTER, json!({ "image": "ubuntu" })), false)
            .unwrap();
        let rel = store
            .add(relation("/r1", RUNNING_ON, "/c2", "/host9"), false)
            .unwrap();

        let (a, b) = store.resolve(&rel).unwrap();
        assert_eq!(a.id(), "/c2");
        assert_eq!(a.type_id(), COMPUTER);
        assert!(a.is_empty());
        assert_eq!(b.id(), "/host9");
        assert_eq!(b.type_id(), PLACEHOLDER_TYPE);
        assert!(store.diagnostics().contains(&Diagnostic::MissingPointerTo {
            relation: "/r1".into(),
            relation_type: RUNNING_ON.into(),
            side: Side::B,
        }));

        let present = store.add(relation("/r2", RUNNING_ON, "/c1", "/c1"), false).unwrap();
        let (a, _) = store.resolve(&present).unwrap();
        assert_eq!(a.get_str("image"), Some("ubuntu"));
    }

    #[test]
    fn test_lookup_diagnostics_are_logged_once() {
        let store = computer_store();
        for (id, target) in [("/l1", "/l2"), ("/l2", "/l1")] {
            store
                .add(
                    json!({ "metadata": { "id": id, "type": "/link" }, "properties": { "link": target } }),
                    false,
                )
                .unwrap();
        }
        let rel = store.add(relation("/r1", RUNNING_ON, "/c9", "/host"), false).unwrap();

        for _ in 0..5 {
            assert!(store.by_id("/l1").is_none());
            store.resolve(&rel).unwrap();
        }
        assert_eq!(store.diagnostics().len(), 2);

        assert_eq!(store.take_diagnostics().len(), 2);
        assert!(store.by_id("/l1").is_none());
        assert_eq!(
            store.diagnostics(),
            vec![Diagnostic::LinkCycle { id: "/l1".into() }]
        );
    }

    #[test]
    fn test_resolve_rejects_non_relations() {
        let store = GraphStore::new();
        let not_a_relation = Instance::new("/c1", COMPUTER);
        assert!(matches!(
            store.resolve(&not_a_relation),
            Err(Error::NotARelation(_))
        ));
    }

    #[test]
    fn test_concurrent_ingestion() {
        let store = Arc::new(computer_store());

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for n in 0..50 {
                        let id = format!("/c/{}/{}", worker, n);
                        store
                            .add(entity(&id, COMPUTER, json!({ "image": "ubuntu" })), true)
                            .unwrap();
                        store
                            .add(relation(&format!("{}/r", id), RUNNING_ON, &id, "/hub"), false)
                            .unwrap();
                        assert!(store.by_id(&id).is_some());
                    }
                });
            }
        });

        assert_eq!(store.stats().entities, 200);
        assert_eq!(store.relations_for("/hub").len(), 200);
        assert_eq!(store.all_relations_for("/c/0/0").len(), 200);
    }
}
