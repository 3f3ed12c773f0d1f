//! Minimal FILTER expressions over solution bindings.

use crate::pattern::Var;
use crate::solution::Solution;
use quiver_graph::{Term, TripleSource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterExpr {
    /// `BOUND(?v)`
    Bound { var: Var },
    /// `?v = term`; false when `?v` is unbound.
    Equals { var: Var, term: Term },
    /// `?a = ?b`; false when either side is unbound.
    SameVar { left: Var, right: Var },
    Not { expr: Box<FilterExpr> },
    And { left: Box<FilterExpr>, right: Box<FilterExpr> },
    Or { left: Box<FilterExpr>, right: Box<FilterExpr> },
}

impl FilterExpr {
    pub fn bound(var: impl Into<Var>) -> Self {
        Self::Bound { var: var.into() }
    }

    pub fn equals(var: impl Into<Var>, term: Term) -> Self {
        Self::Equals {
            var: var.into(),
            term,
        }
    }

    pub fn same_var(left: impl Into<Var>, right: impl Into<Var>) -> Self {
        Self::SameVar {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn negate(self) -> Self {
        Self::Not {
            expr: Box::new(self),
        }
    }

    pub fn and(self, other: FilterExpr) -> Self {
        Self::And {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn or(self, other: FilterExpr) -> Self {
        Self::Or {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn evaluate<G: TripleSource + ?Sized>(&self, solution: &Solution, graph: &G) -> bool {
        match self {
            Self::Bound { var } => solution.contains_key(var),
            Self::Equals { var, term } => match (solution.get(var), graph.lookup(term)) {
                (Some(bound), Some(id)) => *bound == id,
                _ => false,
            },
            Self::SameVar { left, right } => match (solution.get(left), solution.get(right)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            Self::Not { expr } => !expr.evaluate(solution, graph),
            Self::And { left, right } => left.evaluate(solution, graph) && right.evaluate(solution, graph),
            Self::Or { left, right } => left.evaluate(solution, graph) || right.evaluate(solution, graph),
        }
    }

    pub fn variables(&self) -> BTreeSet<&Var> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables<'a>(&'a self, out: &mut BTreeSet<&'a Var>) {
        match self {
            Self::Bound { var } | Self::Equals { var, .. } => {
                out.insert(var);
            }
            Self::SameVar { left, right } => {
                out.insert(left);
                out.insert(right);
            }
            Self::Not { expr } => expr.collect_variables(out),
            Self::And { left, right } | Self::Or { left, right } => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
        }
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bound { var } => write!(f, "bound({var})"),
            Self::Equals { var, term } => write!(f, "{var} = {term}"),
            Self::SameVar { left, right } => write!(f, "{left} = {right}"),
            Self::Not { expr } => write!(f, "!({expr})"),
            Self::And { left, right } => write!(f, "({left} && {right})"),
            Self::Or { left, right } => write!(f, "({left} || {right})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_graph::TripleStore;

    #[test]
    fn unbound_variables_never_compare_equal() {
        let mut store = TripleStore::new();
        let bob = Term::literal("Bob");
        store
            .insert(&Term::iri("http://example.org/p1"), &Term::iri("http://example.org/name"), &bob)
            .unwrap();
        let id = store.lookup(&bob).unwrap();

        let bound = Solution::from([(Var::new("name"), id)]);
        let empty = Solution::new();

        let is_bob = FilterExpr::equals("name", bob);
        assert!(is_bob.evaluate(&bound, &store));
        assert!(!is_bob.evaluate(&empty, &store));
        assert!(is_bob.clone().negate().evaluate(&empty, &store));
        assert!(!FilterExpr::same_var("name", "other").evaluate(&bound, &store));
        assert!(FilterExpr::bound("name").or(is_bob).evaluate(&bound, &store));
    }

    #[test]
    fn display_and_variables() {
        let expr = FilterExpr::bound("a").and(FilterExpr::same_var("b", "c").negate());
        assert_eq!(expr.to_string(), "(bound(?a) && !(?b = ?c))");
        assert_eq!(expr.variables().len(), 3);
    }
}
