//! Query execution driver: optimise, then evaluate.

use crate::algebra::Algebra;
use crate::config::QueryConfig;
use crate::error::Result;
use crate::eval::Evaluator;
use crate::optimiser::{OptimiserPipeline, RewriteEvent};
use crate::path::CancellationToken;
use crate::pattern::Var;
use crate::query::QueryDescriptor;
use crate::solution::Solution;
use crate::trace::WithTrace;
use quiver_graph::{Term, TripleSource};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct QueryEngine<'g, G: TripleSource + ?Sized> {
    graph: &'g G,
    config: QueryConfig,
    pipeline: OptimiserPipeline,
    cancellation: CancellationToken,
}

impl<'g, G: TripleSource + ?Sized> QueryEngine<'g, G> {
    /// An engine with the default optimiser pipeline.
    pub fn new(graph: &'g G, config: QueryConfig) -> Self {
        Self {
            graph,
            config,
            pipeline: OptimiserPipeline::default(),
            cancellation: CancellationToken::default(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: OptimiserPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// The tree that [`QueryEngine::execute`] would evaluate.
    pub fn prepare(&self, tree: &Arc<Algebra>, query: &QueryDescriptor) -> Result<Arc<Algebra>> {
        if self.config.optimise {
            self.pipeline.optimise(tree, query)
        } else {
            Ok(Arc::clone(tree))
        }
    }

    /// Which optimisers fired, and how, for `tree`.
    pub fn explain(&self, tree: &Arc<Algebra>, query: &QueryDescriptor) -> Result<Vec<RewriteEvent>> {
        Ok(self.pipeline.optimise_traced::<WithTrace>(tree, query)?.events)
    }

    pub fn execute(&self, tree: &Arc<Algebra>, query: &QueryDescriptor) -> Result<Vec<Solution>> {
        let prepared = self.prepare(tree, query)?;
        self.evaluator().evaluate(&prepared)
    }

    pub fn execute_terms(
        &self,
        tree: &Arc<Algebra>,
        query: &QueryDescriptor,
    ) -> Result<Vec<BTreeMap<Var, Term>>> {
        let prepared = self.prepare(tree, query)?;
        self.evaluator().evaluate_terms(&prepared)
    }

    fn evaluator(&self) -> Evaluator<'g, G> {
        Evaluator::new(self.graph, self.config.clone()).with_cancellation(self.cancellation.clone())
    }
}
