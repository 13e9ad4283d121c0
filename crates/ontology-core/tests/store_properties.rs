//! Property-based tests for graph store invariants
//!
//! Random graphs of entities and relations checked for lookup, adjacency
//! and connected-component behaviour.

use std::collections::{BTreeSet, HashSet};

use ontology_core::{GraphStore, Instance};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

const THING: &str = "/entity/v1/thing";
const LINKS: &str = "/relation/v1/links";

fn entity(id: &str, properties: Value) -> Value {
    json!({ "metadata": { "id": id, "type": THING }, "properties": properties })
}

fn relation(id: &str, a: &str, b: &str) -> Value {
    json!({ "metadata": { "id": id, "type": LINKS }, "properties": { "a": a, "b": b } })
}

fn property_map() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(
        "[a-z]{1,8}",
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            "[a-z ]{0,12}".prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
        ],
        0..6,
    )
    .prop_map(|fields| fields.into_iter().collect())
}

/// Edges between node indices, as relation endpoints
fn edges() -> impl Strategy<Value = Vec<(u8, u8)>> {
    prop::collection::vec((0u8..12, 0u8..12), 0..30)
}

fn build(edges: &[(u8, u8)]) -> GraphStore {
    let store = GraphStore::new();
    for (n, (a, b)) in edges.iter().enumerate() {
        store
            .add(
                relation(&format!("/r/{}", n), &format!("/n/{}", a), &format!("/n/{}", b)),
                false,
            )
            .unwrap();
    }
    store
}

/// Component of `start` computed by a plain flood fill over `edges`
fn expected_component(edges: &[(u8, u8)], start: u8) -> BTreeSet<String> {
    let mut reached: HashSet<u8> = HashSet::from([start]);
    loop {
        let before = reached.len();
        for (a, b) in edges {
            if reached.contains(a) || reached.contains(b) {
                reached.insert(*a);
                reached.insert(*b);
            }
        }
        if reached.len() == before {
            break;
        }
    }

    edges
        .iter()
        .enumerate()
        .filter(|(_, (a, _))| reached.contains(a))
        .map(|(n, _)| format!("/r/{}", n))
        .collect()
}

fn relation_ids(relations: &[std::sync::Arc<Instance>]) -> BTreeSet<String> {
    relations.iter().map(|r| r.id().to_string()).collect()
}

proptest! {
    /// Property: a type with an empty spec accepts any properties
    #[test]
    fn empty_spec_accepts_anything(properties in property_map()) {
        let store = GraphStore::new();
        store
            .add(json!({ "metadata": { "id": THING, "type": "/type" } }), true)
            .unwrap();

        let instance = Instance::new("/n/0", THING).with_properties(properties);
        prop_assert!(store.is_valid(&instance).unwrap());
    }

    /// Property: an added entity is returned unchanged by id
    #[test]
    fn added_entity_is_found_by_id(name in "[a-z]{1,10}", properties in property_map()) {
        let store = GraphStore::new();
        let id = format!("/n/{}", name);
        let added = store.add(entity(&id, Value::Object(properties)), false).unwrap();

        let found = store.by_id(&id).unwrap();
        prop_assert_eq!(&*found, &*added);
    }

    /// Property: each relation is seen from both of its endpoints
    #[test]
    fn relations_visible_from_both_ends(edges in edges()) {
        let store = build(&edges);

        for (n, (a, b)) in edges.iter().enumerate() {
            let id = format!("/r/{}", n);
            for end in [a, b] {
                let touching = relation_ids(&store.relations_for(&format!("/n/{}", end)));
                prop_assert!(touching.contains(&id));
            }
        }
    }

    /// Property: the connected component matches a flood fill and is
    /// the same from every node inside it
    #[test]
    fn component_matches_flood_fill(edges in edges(), start in 0u8..12) {
        let store = build(&edges);
        let component = store.all_relations_for(&format!("/n/{}", start));
        let ids = relation_ids(&component);

        prop_assert_eq!(ids.len(), component.len());
        prop_assert_eq!(&ids, &expected_component(&edges, start));

        let again = store.all_relations_for(&format!("/n/{}", start));
        prop_assert_eq!(&relation_ids(&again), &ids);

        for relation in &component {
            let (a, _) = relation.endpoints().unwrap();
            prop_assert_eq!(&relation_ids(&store.all_relations_for(a)), &ids);
        }
    }
}
