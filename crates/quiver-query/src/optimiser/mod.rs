//! Algebra optimisers.
//!
//! An optimiser is a tree-to-tree rewrite that must not change results. Each
//! one special-cases the node shapes it knows and hands everything else to
//! [`Algebra::transform`], which recurses by capability class (terminal nodes
//! come back as is, unary nodes optimise their child, join nodes both
//! operands).
//!
//! # Example
//!
//! ```ignore
//! let pipeline = OptimiserPipeline::default();
//! let optimised = pipeline.optimise(&tree, &descriptor)?;
//! ```

mod order_by_distinct;

pub use order_by_distinct::OrderByDistinctOptimiser;

use crate::algebra::Algebra;
use crate::error::Result;
use crate::query::QueryDescriptor;
use crate::trace::{NoTrace, TraceMode};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A semantics-preserving algebra rewrite.
pub trait AlgebraOptimiser: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rewrite `tree`. Returns the same `Arc` when nothing applies; errors only
    /// for structurally invalid input.
    fn optimise(&self, tree: &Arc<Algebra>) -> Result<Arc<Algebra>>;

    /// Whether this optimiser should run for `query` at all.
    fn is_applicable(&self, query: &QueryDescriptor) -> bool;
}

/// What one optimiser did during a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum RewriteEvent {
    Skipped {
        optimiser: &'static str,
    },
    Unchanged {
        optimiser: &'static str,
    },
    Rewritten {
        optimiser: &'static str,
        before: Arc<Algebra>,
        after: Arc<Algebra>,
    },
}

/// A pipeline result together with its journal, which is `()` under
/// [`NoTrace`].
pub struct Optimised<M: TraceMode> {
    pub tree: Arc<Algebra>,
    pub events: M::Journal<RewriteEvent>,
}

/// Ordered list of optimisers, each run on the previous one's output.
pub struct OptimiserPipeline {
    optimisers: Vec<Box<dyn AlgebraOptimiser>>,
}

impl OptimiserPipeline {
    /// A pipeline with no optimisers.
    pub fn new() -> Self {
        Self {
            optimisers: Vec::new(),
        }
    }

    pub fn with_optimiser(mut self, optimiser: impl AlgebraOptimiser + 'static) -> Self {
        self.optimisers.push(Box::new(optimiser));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.optimisers.iter().map(|o| o.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.optimisers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.optimisers.is_empty()
    }

    pub fn optimise(&self, tree: &Arc<Algebra>, query: &QueryDescriptor) -> Result<Arc<Algebra>> {
        Ok(self.optimise_traced::<NoTrace>(tree, query)?.tree)
    }

    /// Run every applicable optimiser in order, journaling what each did when
    /// `M` is [`crate::trace::WithTrace`].
    pub fn optimise_traced<M: TraceMode>(
        &self,
        tree: &Arc<Algebra>,
        query: &QueryDescriptor,
    ) -> Result<Optimised<M>> {
        let mut events = M::empty::<RewriteEvent>();
        let mut current = Arc::clone(tree);

        for optimiser in &self.optimisers {
            let name = optimiser.name();
            if !optimiser.is_applicable(query) {
                debug!(optimiser = name, form = ?query.form, "optimiser not applicable");
                M::record::<RewriteEvent>(&mut events, || RewriteEvent::Skipped { optimiser: name });
                continue;
            }

            let next = optimiser.optimise(&current)?;
            if Arc::ptr_eq(&next, &current) {
                M::record::<RewriteEvent>(&mut events, || RewriteEvent::Unchanged { optimiser: name });
                continue;
            }

            debug!(optimiser = name, before = %current, after = %next, "optimiser rewrote algebra");
            M::record::<RewriteEvent>(&mut events, || RewriteEvent::Rewritten {
                optimiser: name,
                before: Arc::clone(&current),
                after: Arc::clone(&next),
            });
            current = next;
        }

        Ok(Optimised {
            tree: current,
            events,
        })
    }
}

impl Default for OptimiserPipeline {
    fn default() -> Self {
        Self::new().with_optimiser(OrderByDistinctOptimiser)
    }
}

impl fmt::Debug for OptimiserPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimiserPipeline")
            .field("optimisers", &self.names())
            .finish()
    }
}
