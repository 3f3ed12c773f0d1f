//! Solution mappings: variable → node bindings produced by evaluation.

use crate::pattern::Var;
use quiver_graph::{NodeId, Term, TripleSource};
use std::collections::BTreeMap;

/// One row of results. Unbound variables are simply absent.
pub type Solution = BTreeMap<Var, NodeId>;

/// Two solutions are compatible when every shared variable has the same binding.
pub fn compatible(a: &Solution, b: &Solution) -> bool {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .all(|(var, id)| large.get(var).map_or(true, |other| other == id))
}

/// Merge two solutions, or `None` when they disagree on a shared variable.
pub fn merge(a: &Solution, b: &Solution) -> Option<Solution> {
    if !compatible(a, b) {
        return None;
    }
    let mut merged = a.clone();
    merged.extend(b.iter().map(|(var, id)| (var.clone(), *id)));
    Some(merged)
}

/// Resolve every binding of a solution back to its term.
pub fn resolve<G: TripleSource + ?Sized>(graph: &G, solution: &Solution) -> BTreeMap<Var, Term> {
    solution
        .iter()
        .filter_map(|(var, id)| graph.resolve(*id).map(|term| (var.clone(), term)))
        .collect()
}
