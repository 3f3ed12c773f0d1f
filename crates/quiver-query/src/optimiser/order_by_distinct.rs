//! Hoist ORDER BY out of a DISTINCT/REDUCED projection.
//!
//! `Distinct(Select(OrderBy(inner)))` becomes `OrderBy(Distinct(Select(inner)))`
//! (likewise for `Reduced`) when the projection is explicit and keeps every
//! sort key. Deduplication then runs over the unsorted stream and the sort
//! happens once, outermost.

use super::AlgebraOptimiser;
use crate::algebra::Algebra;
use crate::error::{QueryError, Result};
use crate::ordering::OrderSpec;
use crate::pattern::Var;
use crate::query::{QueryDescriptor, QueryForm};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct OrderByDistinctOptimiser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dedup {
    Distinct,
    Reduced,
}

impl OrderByDistinctOptimiser {
    /// `Some` when `tree` has the hoist shape: the rewritten tree, or `tree`
    /// itself when a sort key is not projected. `None` for any other shape.
    fn hoist(&self, tree: &Arc<Algebra>) -> Result<Option<Arc<Algebra>>> {
        let (dedup, projection) = match tree.as_ref() {
            Algebra::Distinct { inner } => (Dedup::Distinct, inner),
            Algebra::Reduced { inner } => (Dedup::Reduced, inner),
            _ => return Ok(None),
        };
        let Algebra::Select {
            inner: sorted,
            select_all: false,
            variables,
        } = projection.as_ref()
        else {
            return Ok(None);
        };
        let Algebra::OrderBy { inner, ordering } = sorted.as_ref() else {
            return Ok(None);
        };

        check_ordering_is_bound(ordering, inner, tree)?;

        if let Some(dropped) = ordering.variables().find(|v| !variables.contains(v)) {
            debug!(variable = %dropped, "sort key not projected, ORDER BY stays inside");
            return Ok(Some(Arc::clone(tree)));
        }

        let inner = self.optimise(inner)?;
        let select = Arc::new(Algebra::Select {
            inner,
            select_all: false,
            variables: variables.clone(),
        });
        let deduped = match dedup {
            Dedup::Distinct => Algebra::distinct(select),
            Dedup::Reduced => Algebra::reduced(select),
        };
        Ok(Some(Algebra::order_by(deduped, ordering.clone())))
    }
}

/// A sort key its input can never bind means whatever built the tree is broken.
fn check_ordering_is_bound(ordering: &OrderSpec, inner: &Algebra, tree: &Algebra) -> Result<()> {
    let produced: Vec<Var> = inner.variables();
    match ordering.variables().find(|v| !produced.contains(v)) {
        None => Ok(()),
        Some(missing) => {
            warn!(variable = %missing, tree = %tree, "ORDER BY references an unbound variable");
            Err(QueryError::invalid_algebra(format!(
                "ORDER BY references {missing}, which its input never binds"
            )))
        }
    }
}

impl AlgebraOptimiser for OrderByDistinctOptimiser {
    fn name(&self) -> &'static str {
        "order_by_distinct"
    }

    fn optimise(&self, tree: &Arc<Algebra>) -> Result<Arc<Algebra>> {
        match self.hoist(tree)? {
            Some(rewritten) => Ok(rewritten),
            None => Algebra::transform(tree, self),
        }
    }

    fn is_applicable(&self, query: &QueryDescriptor) -> bool {
        matches!(query.form, QueryForm::SelectDistinct | QueryForm::SelectReduced) && query.has_ordering()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryConfig;
    use crate::eval::Evaluator;
    use crate::pattern::{TermPattern, TriplePattern};
    use quiver_graph::{Term, TripleStore};

    fn iri(name: &str) -> Term {
        Term::iri(format!("http://example.org/{name}"))
    }

    fn scan() -> Arc<Algebra> {
        Algebra::bgp(vec![
            TriplePattern::new(TermPattern::var("p"), iri("name"), TermPattern::var("name")),
            TriplePattern::new(TermPattern::var("p"), iri("age"), TermPattern::var("age")),
        ])
    }

    fn shaped(dedup: fn(Arc<Algebra>) -> Arc<Algebra>, order: OrderSpec, vars: &[&str]) -> Arc<Algebra> {
        dedup(Algebra::select(
            Algebra::order_by(scan(), order),
            vars.iter().copied(),
        ))
    }

    #[test]
    fn test_hoists_order_by_out_of_distinct() {
        let tree = shaped(Algebra::distinct, OrderSpec::asc("name"), &["name"]);
        let optimised = OrderByDistinctOptimiser.optimise(&tree).unwrap();
        let expected = Algebra::order_by(
            Algebra::distinct(Algebra::select(scan(), ["name"])),
            OrderSpec::asc("name"),
        );
        assert_eq!(*optimised, *expected);
    }

    #[test]
    fn test_hoists_order_by_out_of_reduced() {
        let tree = shaped(Algebra::reduced, OrderSpec::desc("age").then_asc("name"), &["name", "age"]);
        let optimised = OrderByDistinctOptimiser.optimise(&tree).unwrap();
        let Algebra::OrderBy { inner, ordering } = optimised.as_ref() else {
            panic!("expected OrderBy at the root, got {optimised}");
        };
        assert_eq!(ordering, &OrderSpec::desc("age").then_asc("name"));
        let Algebra::Reduced { inner } = inner.as_ref() else {
            panic!("expected Reduced under OrderBy, got {inner}");
        };
        match inner.as_ref() {
            Algebra::Select {
                select_all,
                variables,
                inner,
            } => {
                assert!(!select_all);
                assert_eq!(variables, &vec![Var::new("name"), Var::new("age")]);
                assert_eq!(**inner, *scan());
            }
            other => panic!("expected Select, got {other}"),
        }
    }

    #[test]
    fn test_unprojected_sort_key_leaves_tree_untouched() {
        let tree = shaped(Algebra::distinct, OrderSpec::asc("age"), &["name"]);
        let optimised = OrderByDistinctOptimiser.optimise(&tree).unwrap();
        assert!(Arc::ptr_eq(&optimised, &tree));
    }

    #[test]
    fn test_select_all_is_not_hoisted() {
        let tree = Algebra::distinct(Algebra::select_all(Algebra::order_by(
            scan(),
            OrderSpec::asc("name"),
        )));
        let optimised = OrderByDistinctOptimiser.optimise(&tree).unwrap();
        assert!(Arc::ptr_eq(&optimised, &tree));
    }

    #[test]
    fn test_sort_key_missing_from_input_is_an_error() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let tree = shaped(Algebra::distinct, OrderSpec::asc("ghost"), &["name", "ghost"]);
        let err = OrderByDistinctOptimiser.optimise(&tree).unwrap_err();
        assert!(matches!(err, QueryError::InvalidAlgebra { .. }));
    }

    #[test]
    fn test_rewrites_below_join_operators() {
        let hoistable = shaped(Algebra::distinct, OrderSpec::asc("name"), &["name"]);
        let other = scan();
        let tree = Algebra::union(Arc::clone(&other), hoistable);
        let optimised = OrderByDistinctOptimiser.optimise(&tree).unwrap();

        let Algebra::Union { left, right } = optimised.as_ref() else {
            panic!("expected Union, got {optimised}");
        };
        assert!(Arc::ptr_eq(left, &other));
        assert!(matches!(right.as_ref(), Algebra::OrderBy { .. }));
    }

    #[test]
    fn test_nested_hoist_inside_hoisted_inner() {
        let nested = shaped(Algebra::distinct, OrderSpec::asc("name"), &["name", "age"]);
        let tree = Algebra::reduced(Algebra::select(
            Algebra::order_by(nested, OrderSpec::asc("name")),
            ["name"],
        ));
        let optimised = OrderByDistinctOptimiser.optimise(&tree).unwrap();
        assert_eq!(
            optimised.to_string(),
            "OrderBy(Reduced(Select(OrderBy(Distinct(Select(Bgp(?p <http://example.org/name> ?name . \
             ?p <http://example.org/age> ?age), [?name ?age])), ASC(?name)), [?name])), ASC(?name))"
        );
    }

    #[test]
    fn test_is_applicable_only_for_ordered_distinct_or_reduced_selects() {
        let opt = OrderByDistinctOptimiser;
        let ordered = |form| QueryDescriptor::new(form).with_order_by(OrderSpec::asc("name"));

        assert!(opt.is_applicable(&ordered(QueryForm::SelectDistinct)));
        assert!(opt.is_applicable(&ordered(QueryForm::SelectReduced)));
        assert!(!opt.is_applicable(&QueryDescriptor::new(QueryForm::SelectDistinct)));
        assert!(!opt.is_applicable(
            &QueryDescriptor::new(QueryForm::SelectReduced).with_order_by(OrderSpec::default())
        ));

        for form in [
            QueryForm::Select,
            QueryForm::SelectAll,
            QueryForm::SelectAllDistinct,
            QueryForm::SelectAllReduced,
            QueryForm::Ask,
            QueryForm::Construct,
            QueryForm::Describe,
            QueryForm::DescribeAll,
            QueryForm::Update,
        ] {
            assert!(!opt.is_applicable(&ordered(form)), "{form:?}");
        }
    }

    #[test]
    fn test_hoist_preserves_results_and_order() {
        let mut store = TripleStore::new();
        for (person, label) in [("p1", "Bob"), ("p2", "Al"), ("p3", "Bob")] {
            store.insert(&iri(person), &iri("name"), &Term::literal(label)).unwrap();
        }
        let names = Algebra::bgp(vec![TriplePattern::new(
            TermPattern::var("p"),
            iri("name"),
            TermPattern::var("name"),
        )]);
        let tree = Algebra::distinct(Algebra::select(
            Algebra::order_by(names, OrderSpec::asc("name")),
            ["name"],
        ));
        let optimised = OrderByDistinctOptimiser.optimise(&tree).unwrap();
        assert!(matches!(optimised.as_ref(), Algebra::OrderBy { .. }));

        let evaluator = Evaluator::new(&store, QueryConfig::default());
        let render = |tree: &Arc<Algebra>| -> Vec<String> {
            evaluator
                .evaluate_terms(tree)
                .unwrap()
                .iter()
                .map(|row| row[&Var::new("name")].value().to_string())
                .collect()
        };
        assert_eq!(render(&tree), vec!["Al", "Bob"]);
        assert_eq!(render(&optimised), vec!["Al", "Bob"]);
    }
}
