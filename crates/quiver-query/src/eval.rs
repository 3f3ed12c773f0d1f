//! General algebra evaluation against a [`TripleSource`].

use crate::algebra::Algebra;
use crate::config::{PathStrategy, QueryConfig};
use crate::error::Result;
use crate::pattern::{PathPattern, TermPattern, TriplePattern, Var};
use crate::path::{
    check_interrupt, lower_paths, CancellationToken, PathEnd, PathEvaluationContext, PathEvaluator,
};
use crate::solution::{self, Solution};
use quiver_graph::{NodeId, Term, TripleSource};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Clock for one evaluation call.
#[derive(Debug, Clone, Copy)]
struct Budget {
    started: Instant,
    deadline: Option<Instant>,
}

/// Executes algebra trees.
///
/// `Path` nodes are walked by [`PathEvaluator`] or, under
/// [`PathStrategy::Translate`], lowered into ordinary algebra first.
pub struct Evaluator<'g, G: TripleSource + ?Sized> {
    graph: &'g G,
    config: QueryConfig,
    cancellation: CancellationToken,
}

impl<'g, G: TripleSource + ?Sized> Evaluator<'g, G> {
    pub fn new(graph: &'g G, config: QueryConfig) -> Self {
        Self {
            graph,
            config,
            cancellation: CancellationToken::default(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn evaluate(&self, tree: &Arc<Algebra>) -> Result<Vec<Solution>> {
        let tree = match self.config.path_strategy {
            PathStrategy::Traverse => Arc::clone(tree),
            PathStrategy::Translate => lower_paths(tree)?,
        };
        let started = Instant::now();
        let budget = Budget {
            started,
            deadline: self.config.timeout().and_then(|t| started.checked_add(t)),
        };
        let rows = self.eval(&tree, budget)?;
        debug!(
            rows = rows.len(),
            strategy = ?self.config.path_strategy,
            elapsed_us = started.elapsed().as_micros() as u64,
            "evaluated algebra"
        );
        Ok(rows)
    }

    /// Evaluate and resolve every binding back to its term.
    pub fn evaluate_terms(&self, tree: &Arc<Algebra>) -> Result<Vec<BTreeMap<Var, Term>>> {
        Ok(self
            .evaluate(tree)?
            .iter()
            .map(|row| solution::resolve(self.graph, row))
            .collect())
    }

    fn eval(&self, node: &Algebra, budget: Budget) -> Result<Vec<Solution>> {
        check_interrupt(&self.cancellation, budget.started, budget.deadline)?;
        match node {
            Algebra::Empty => Ok(vec![Solution::new()]),
            Algebra::Bgp { patterns } => self.bgp(patterns, budget),
            Algebra::Path { pattern } => self.path(pattern, budget),
            Algebra::Select { inner, .. } => {
                let keep: BTreeSet<Var> = node.variables().into_iter().collect();
                Ok(self
                    .eval(inner, budget)?
                    .into_iter()
                    .map(|row| row.into_iter().filter(|(var, _)| keep.contains(var)).collect())
                    .collect())
            }
            // Reduced eliminates duplicates exactly like Distinct.
            Algebra::Distinct { inner } | Algebra::Reduced { inner } => {
                let rows = self.eval(inner, budget)?;
                let mut seen = HashSet::with_capacity(rows.len());
                Ok(rows.into_iter().filter(|row| seen.insert(row.clone())).collect())
            }
            Algebra::OrderBy { inner, ordering } => Ok(ordering.sort(self.eval(inner, budget)?, self.graph)),
            Algebra::Filter { inner, expr } => Ok(self
                .eval(inner, budget)?
                .into_iter()
                .filter(|row| expr.evaluate(row, self.graph))
                .collect()),
            Algebra::Slice { inner, offset, limit } => {
                let rows = self.eval(inner, budget)?.into_iter().skip(*offset);
                Ok(match limit {
                    Some(limit) => rows.take(*limit).collect(),
                    None => rows.collect(),
                })
            }
            Algebra::Join { left, right } => {
                let left = self.eval(left, budget)?;
                let right = self.eval(right, budget)?;
                let mut out = Vec::new();
                for l in &left {
                    out.extend(right.iter().filter_map(|r| solution::merge(l, r)));
                }
                Ok(out)
            }
            Algebra::LeftJoin { left, right } => {
                let left = self.eval(left, budget)?;
                let right = self.eval(right, budget)?;
                let mut out = Vec::new();
                for l in left {
                    let before = out.len();
                    out.extend(right.iter().filter_map(|r| solution::merge(&l, r)));
                    if out.len() == before {
                        out.push(l);
                    }
                }
                Ok(out)
            }
            Algebra::Union { left, right } => {
                let mut rows = self.eval(left, budget)?;
                rows.extend(self.eval(right, budget)?);
                Ok(rows)
            }
        }
    }

    // ========================================================================
    // Pattern Matching
    // ========================================================================

    fn bgp(&self, patterns: &[TriplePattern], budget: Budget) -> Result<Vec<Solution>> {
        let mut rows = vec![Solution::new()];
        for pattern in patterns {
            check_interrupt(&self.cancellation, budget.started, budget.deadline)?;
            let mut next = Vec::new();
            for row in &rows {
                let (Some(s), Some(p), Some(o)) = (
                    self.position(&pattern.subject, row),
                    self.position(&pattern.predicate, row),
                    self.position(&pattern.object, row),
                ) else {
                    // a constant the graph has never seen
                    return Ok(Vec::new());
                };
                for t in self.graph.triples(s.node(), p.node(), o.node()) {
                    let bound = bind(row.clone(), &pattern.subject, t.subject)
                        .and_then(|r| bind(r, &pattern.predicate, t.predicate))
                        .and_then(|r| bind(r, &pattern.object, t.object));
                    next.extend(bound);
                }
            }
            rows = next;
            if rows.is_empty() {
                break;
            }
        }
        Ok(rows)
    }

    fn path(&self, pattern: &PathPattern, budget: Budget) -> Result<Vec<Solution>> {
        pattern.path.validate()?;
        let empty = Solution::new();
        let (Some(subject), Some(object)) = (
            self.position(&pattern.subject, &empty),
            self.position(&pattern.object, &empty),
        ) else {
            return Ok(Vec::new());
        };

        let mut ctx = PathEvaluationContext::new(subject, object)
            .with_cancellation(self.cancellation.clone())
            .with_deadline(budget.started, budget.deadline);
        let pairs = PathEvaluator::new(self.graph).evaluate(&pattern.path, &mut ctx)?;

        Ok(pairs
            .into_iter()
            .filter_map(|(s, o)| {
                bind(Solution::new(), &pattern.subject, s).and_then(|r| bind(r, &pattern.object, o))
            })
            .collect())
    }

    /// The lookup key for one pattern position under `row`, or `None` when a
    /// constant is unknown to the graph and nothing can match.
    fn position(&self, term: &TermPattern, row: &Solution) -> Option<PathEnd> {
        match term {
            TermPattern::Var(var) => Some(row.get(var).copied().into()),
            TermPattern::Node(term) => self.graph.lookup(term).map(PathEnd::Bound),
        }
    }
}

/// Bind `var` positions, rejecting a repeated variable that would need two
/// different values.
fn bind(mut row: Solution, term: &TermPattern, id: NodeId) -> Option<Solution> {
    let TermPattern::Var(var) = term else {
        return Some(row);
    };
    match row.get(var) {
        Some(existing) if *existing != id => None,
        Some(_) => Some(row),
        None => {
            row.insert(var.clone(), id);
            Some(row)
        }
    }
}
