//! Quiver query core: property paths and algebra rewriting.
//!
//! Key pieces:
//! 1. **Property Paths**: a closed [`Path`] AST (sequence, alternative,
//!    inverse, closures, bounded repetition, negated property sets) that is
//!    either walked directly ([`PathEvaluator`]) or lowered into join/union
//!    algebra ([`compile`], [`lower_paths`])
//! 2. **Algebra**: immutable, `Arc`-shared operator trees ([`Algebra`]) with
//!    capability-based dispatch (terminal / unary / join)
//! 3. **Optimisers**: semantics-preserving rewrites ([`AlgebraOptimiser`]),
//!    driven by an [`OptimiserPipeline`] with optional rewrite tracing
//! 4. **Evaluation**: a general [`Evaluator`] and the [`QueryEngine`] driver
//!
//! Closure traversal keeps a visited set per closure, so `p*` and `p+`
//! terminate on cyclic graphs and report each reachable node once per start
//! node. Long walks can be interrupted through a [`CancellationToken`] or a
//! configured timeout.
//!
//! ## Module Organization
//!
//! - `path`: path AST, traversal contexts, traversal, lowering
//! - `algebra`: operator trees and filter expressions
//! - `optimiser`: the optimiser trait, pipeline and rules
//! - `trace`: compile-time switch for rewrite journaling

pub mod algebra;
pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod optimiser;
pub mod ordering;
pub mod path;
pub mod pattern;
pub mod query;
pub mod solution;
pub mod trace;

pub use algebra::{Algebra, FilterExpr, Operator};
pub use config::{PathStrategy, QueryConfig};
pub use engine::QueryEngine;
pub use error::{QueryError, Result};
pub use eval::Evaluator;
pub use optimiser::{
    AlgebraOptimiser, Optimised, OptimiserPipeline, OrderByDistinctOptimiser, RewriteEvent,
};
pub use ordering::{OrderCondition, OrderSpec, SortDirection};
pub use path::{
    compile, lower_paths, CancellationToken, Direction, Path, PathEnd, PathEvaluationContext,
    PathEvaluator, PathTransformContext,
};
pub use pattern::{PathPattern, TermPattern, TriplePattern, Var};
pub use query::{QueryDescriptor, QueryForm};
pub use solution::Solution;
pub use trace::{NoTrace, TraceMode, WithTrace};
