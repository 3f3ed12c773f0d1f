//! ORDER BY specifications.

use crate::pattern::Var;
use crate::solution::Solution;
use quiver_graph::{Term, TripleSource};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderCondition {
    pub variable: Var,
    pub direction: SortDirection,
}

/// An ordered list of sort keys; the first condition is the primary key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderSpec {
    conditions: Vec<OrderCondition>,
}

impl OrderSpec {
    pub fn new(conditions: Vec<OrderCondition>) -> Self {
        Self { conditions }
    }

    pub fn asc(variable: impl Into<Var>) -> Self {
        Self::default().then_asc(variable)
    }

    pub fn desc(variable: impl Into<Var>) -> Self {
        Self::default().then_desc(variable)
    }

    pub fn then_asc(mut self, variable: impl Into<Var>) -> Self {
        self.conditions.push(OrderCondition {
            variable: variable.into(),
            direction: SortDirection::Ascending,
        });
        self
    }

    pub fn then_desc(mut self, variable: impl Into<Var>) -> Self {
        self.conditions.push(OrderCondition {
            variable: variable.into(),
            direction: SortDirection::Descending,
        });
        self
    }

    pub fn conditions(&self) -> &[OrderCondition] {
        &self.conditions
    }

    /// The sort-key variables, primary key first.
    pub fn variables(&self) -> impl Iterator<Item = &Var> {
        self.conditions.iter().map(|c| &c.variable)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Stable sort. Unbound values sort before every term.
    pub fn sort<G: TripleSource + ?Sized>(&self, solutions: Vec<Solution>, graph: &G) -> Vec<Solution> {
        if self.is_empty() {
            return solutions;
        }

        let mut keyed: Vec<(Vec<Option<Term>>, Solution)> = solutions
            .into_iter()
            .map(|solution| {
                let key = self
                    .variables()
                    .map(|var| solution.get(var).and_then(|id| graph.resolve(*id)))
                    .collect();
                (key, solution)
            })
            .collect();
        keyed.sort_by(|(a, _), (b, _)| self.compare_keys(a, b));
        keyed.into_iter().map(|(_, solution)| solution).collect()
    }

    fn compare_keys(&self, a: &[Option<Term>], b: &[Option<Term>]) -> Ordering {
        for ((condition, x), y) in self.conditions.iter().zip(a).zip(b) {
            let ord = match condition.direction {
                SortDirection::Ascending => x.cmp(y),
                SortDirection::Descending => y.cmp(x),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for OrderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.conditions.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match c.direction {
                SortDirection::Ascending => write!(f, "ASC({})", c.variable)?,
                SortDirection::Descending => write!(f, "DESC({})", c.variable)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_graph::{NodeId, TripleStore};

    fn store_with_names(names: &[&str]) -> (TripleStore, Vec<NodeId>) {
        let mut store = TripleStore::new();
        let name = Term::iri("http://example.org/name");
        let mut ids = Vec::new();
        for (i, n) in names.iter().enumerate() {
            let literal = Term::literal(*n);
            store
                .insert(&Term::blank(format!("p{i}")), &name, &literal)
                .unwrap();
            ids.push(store.lookup(&literal).unwrap());
        }
        (store, ids)
    }

    #[test]
    fn sort_is_stable_and_puts_unbound_first() {
        let (store, ids) = store_with_names(&["Bob", "Al"]);
        let var = Var::new("name");
        let tagged = |id: Option<NodeId>, tag: u32| {
            let mut s = Solution::new();
            if let Some(id) = id {
                s.insert(var.clone(), id);
            }
            s.insert(Var::new("tag"), NodeId::new(tag));
            s
        };

        let input = vec![
            tagged(Some(ids[0]), 1),
            tagged(None, 2),
            tagged(Some(ids[1]), 3),
            tagged(Some(ids[0]), 4),
        ];
        let sorted = OrderSpec::asc("name").sort(input, &store);
        let tags: Vec<u32> = sorted
            .iter()
            .map(|s| s[&Var::new("tag")].raw())
            .collect();
        assert_eq!(tags, vec![2, 3, 1, 4]);
    }

    #[test]
    fn descending_reverses_the_key() {
        let (store, ids) = store_with_names(&["Al", "Bob"]);
        let input: Vec<Solution> = ids
            .iter()
            .map(|id| Solution::from([(Var::new("name"), *id)]))
            .collect();
        let sorted = OrderSpec::desc("name").sort(input, &store);
        assert_eq!(sorted[0][&Var::new("name")], ids[1]);
    }

    #[test]
    fn display_lists_conditions_in_order() {
        let spec = OrderSpec::asc("name").then_desc("age");
        assert_eq!(spec.to_string(), "ASC(?name) DESC(?age)");
        assert_eq!(spec.variables().count(), 2);
    }
}
