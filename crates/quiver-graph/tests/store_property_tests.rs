use proptest::prelude::*;
use quiver_graph::{NodeId, Term, Triple, TripleSource, TripleStore};
use std::collections::HashSet;

const MAX_NODES: usize = 10;
const MAX_PREDICATES: usize = 4;
const MAX_EDGES: usize = 60;

#[derive(Debug, Clone)]
struct StoreCase {
    edges: Vec<(usize, usize, usize)>, // (subject_idx, predicate_idx, object_idx)
    lookup: (Option<usize>, Option<usize>, Option<usize>),
}

fn store_case_strategy() -> impl Strategy<Value = StoreCase> {
    (
        prop::collection::vec(
            (0usize..MAX_NODES, 0usize..MAX_PREDICATES, 0usize..MAX_NODES),
            0..=MAX_EDGES,
        ),
        (
            prop::option::of(0usize..MAX_NODES),
            prop::option::of(0usize..MAX_PREDICATES),
            prop::option::of(0usize..MAX_NODES),
        ),
    )
        .prop_map(|(edges, lookup)| StoreCase { edges, lookup })
}

fn node(i: usize) -> Term {
    Term::iri(format!("http://example.org/n{i}"))
}

fn predicate(i: usize) -> Term {
    Term::iri(format!("http://example.org/p{i}"))
}

fn build_store(case: &StoreCase) -> TripleStore {
    let mut store = TripleStore::new();
    for (s, p, o) in &case.edges {
        store
            .insert(&node(*s), &predicate(*p), &node(*o))
            .expect("generated triples are well formed");
    }
    store
}

fn id(store: &TripleStore, term: Term) -> Option<NodeId> {
    store.lookup(&term)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 192,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn store_len_matches_distinct_edges(case in store_case_strategy()) {
        let store = build_store(&case);
        let distinct: HashSet<_> = case.edges.iter().collect();
        prop_assert_eq!(store.len(), distinct.len());
    }

    #[test]
    fn wildcard_lookup_matches_naive_scan(case in store_case_strategy()) {
        let store = build_store(&case);
        let (ps, pp, po) = case.lookup;

        // A lookup term the store never saw cannot match anything.
        let s = ps.map(|i| id(&store, node(i)));
        let p = pp.map(|i| id(&store, predicate(i)));
        let o = po.map(|i| id(&store, node(i)));
        if matches!(s, Some(None)) || matches!(p, Some(None)) || matches!(o, Some(None)) {
            return Ok(());
        }

        let mut actual: Vec<Triple> = store.triples(s.flatten(), p.flatten(), o.flatten());
        let mut expected: Vec<Triple> = store
            .triples(None, None, None)
            .into_iter()
            .filter(|t| s.flatten().map_or(true, |s| t.subject == s))
            .filter(|t| p.flatten().map_or(true, |p| t.predicate == p))
            .filter(|t| o.flatten().map_or(true, |o| t.object == o))
            .collect();

        let key = |t: &Triple| (t.subject.raw(), t.predicate.raw(), t.object.raw());
        actual.sort_by_key(key);
        expected.sort_by_key(key);
        prop_assert_eq!(actual, expected);
    }
}
