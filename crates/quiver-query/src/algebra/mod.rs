//! The compiled query algebra.
//!
//! Trees are immutable and shared through `Arc`: a rewrite either hands back
//! the very same `Arc` or builds new nodes above unchanged subtrees, so one
//! pass can never corrupt a subtree another holder still references.
//!
//! Every node belongs to one capability class (see [`Operator`]). Generic
//! passes dispatch on the class rather than the concrete kind, so a node kind
//! added later is walked correctly by every existing pass.

mod filter;

pub use filter::FilterExpr;

use crate::error::Result;
use crate::ordering::OrderSpec;
use crate::pattern::{PathPattern, TriplePattern, Var};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Algebra {
    // ---- terminal ----
    /// The single empty solution.
    Empty,
    /// Basic graph pattern scan.
    Bgp { patterns: Vec<TriplePattern> },
    /// A property path between two ends.
    Path { pattern: PathPattern },

    // ---- unary ----
    /// Projection. A select-all projects every non-hidden variable of `inner`
    /// and ignores `variables`.
    Select {
        inner: Arc<Algebra>,
        select_all: bool,
        variables: Vec<Var>,
    },
    Distinct { inner: Arc<Algebra> },
    /// Permits (but does not require) duplicate elimination.
    Reduced { inner: Arc<Algebra> },
    OrderBy { inner: Arc<Algebra>, ordering: OrderSpec },
    Filter { inner: Arc<Algebra>, expr: FilterExpr },
    Slice {
        inner: Arc<Algebra>,
        offset: usize,
        limit: Option<usize>,
    },

    // ---- join ----
    Join { left: Arc<Algebra>, right: Arc<Algebra> },
    LeftJoin { left: Arc<Algebra>, right: Arc<Algebra> },
    Union { left: Arc<Algebra>, right: Arc<Algebra> },
}

/// Structural capability of a node.
#[derive(Debug, Clone, Copy)]
pub enum Operator<'a> {
    Terminal,
    Unary { inner: &'a Arc<Algebra> },
    Join { left: &'a Arc<Algebra>, right: &'a Arc<Algebra> },
}

// ============================================================================
// Construction
// ============================================================================

impl Algebra {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::Empty)
    }

    pub fn bgp(patterns: Vec<TriplePattern>) -> Arc<Self> {
        Arc::new(Self::Bgp { patterns })
    }

    pub fn path(pattern: PathPattern) -> Arc<Self> {
        Arc::new(Self::Path { pattern })
    }

    /// Explicit projection; repeated variables are kept once.
    pub fn select<V: Into<Var>>(inner: Arc<Self>, variables: impl IntoIterator<Item = V>) -> Arc<Self> {
        let mut seen = BTreeSet::new();
        let variables = variables
            .into_iter()
            .map(|v| -> Var { v.into() })
            .filter(|v| seen.insert(v.clone()))
            .collect();
        Arc::new(Self::Select {
            inner,
            select_all: false,
            variables,
        })
    }

    pub fn select_all(inner: Arc<Self>) -> Arc<Self> {
        Arc::new(Self::Select {
            inner,
            select_all: true,
            variables: Vec::new(),
        })
    }

    pub fn distinct(inner: Arc<Self>) -> Arc<Self> {
        Arc::new(Self::Distinct { inner })
    }

    pub fn reduced(inner: Arc<Self>) -> Arc<Self> {
        Arc::new(Self::Reduced { inner })
    }

    pub fn order_by(inner: Arc<Self>, ordering: OrderSpec) -> Arc<Self> {
        Arc::new(Self::OrderBy { inner, ordering })
    }

    pub fn filter(inner: Arc<Self>, expr: FilterExpr) -> Arc<Self> {
        Arc::new(Self::Filter { inner, expr })
    }

    pub fn slice(inner: Arc<Self>, offset: usize, limit: Option<usize>) -> Arc<Self> {
        Arc::new(Self::Slice { inner, offset, limit })
    }

    /// Join two trees; two BGPs fuse into one.
    pub fn join(left: Arc<Self>, right: Arc<Self>) -> Arc<Self> {
        match (&*left, &*right) {
            (Self::Bgp { patterns: l }, Self::Bgp { patterns: r }) => {
                Self::bgp(l.iter().chain(r).cloned().collect())
            }
            _ => Arc::new(Self::Join { left, right }),
        }
    }

    pub fn left_join(left: Arc<Self>, right: Arc<Self>) -> Arc<Self> {
        Arc::new(Self::LeftJoin { left, right })
    }

    pub fn union(left: Arc<Self>, right: Arc<Self>) -> Arc<Self> {
        Arc::new(Self::Union { left, right })
    }
}

// ============================================================================
// Capability Dispatch
// ============================================================================

impl Algebra {
    pub fn operator(&self) -> Operator<'_> {
        match self {
            Self::Empty | Self::Bgp { .. } | Self::Path { .. } => Operator::Terminal,
            Self::Select { inner, .. }
            | Self::Distinct { inner }
            | Self::Reduced { inner }
            | Self::OrderBy { inner, .. }
            | Self::Filter { inner, .. }
            | Self::Slice { inner, .. } => Operator::Unary { inner },
            Self::Join { left, right } | Self::LeftJoin { left, right } | Self::Union { left, right } => {
                Operator::Join { left, right }
            }
        }
    }

    /// Short operator name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::Bgp { .. } => "Bgp",
            Self::Path { .. } => "Path",
            Self::Select { .. } => "Select",
            Self::Distinct { .. } => "Distinct",
            Self::Reduced { .. } => "Reduced",
            Self::OrderBy { .. } => "OrderBy",
            Self::Filter { .. } => "Filter",
            Self::Slice { .. } => "Slice",
            Self::Join { .. } => "Join",
            Self::LeftJoin { .. } => "LeftJoin",
            Self::Union { .. } => "Union",
        }
    }

    /// Apply `f` to each child and rebuild `node` around the results.
    ///
    /// Terminal nodes, and nodes whose children all come back pointer-equal,
    /// are returned as the same `Arc`.
    pub fn map_children<F>(node: &Arc<Self>, mut f: F) -> Result<Arc<Self>>
    where
        F: FnMut(&Arc<Self>) -> Result<Arc<Self>>,
    {
        match node.operator() {
            Operator::Terminal => Ok(Arc::clone(node)),
            Operator::Unary { inner } => {
                let new_inner = f(inner)?;
                if Arc::ptr_eq(&new_inner, inner) {
                    return Ok(Arc::clone(node));
                }
                Ok(Arc::new(node.with_inner(new_inner)))
            }
            Operator::Join { left, right } => {
                let new_left = f(left)?;
                let new_right = f(right)?;
                if Arc::ptr_eq(&new_left, left) && Arc::ptr_eq(&new_right, right) {
                    return Ok(Arc::clone(node));
                }
                Ok(Arc::new(node.with_operands(new_left, new_right)))
            }
        }
    }

    /// Accept a transform: hand every child to `optimiser` and rebuild.
    ///
    /// This is the default behaviour for any node an optimiser has no rule
    /// for.
    pub fn transform<O>(node: &Arc<Self>, optimiser: &O) -> Result<Arc<Self>>
    where
        O: crate::optimiser::AlgebraOptimiser + ?Sized,
    {
        Self::map_children(node, |child| optimiser.optimise(child))
    }

    /// Same node kind and attributes over a new child. Only meaningful for
    /// unary nodes; anything else is returned as is.
    fn with_inner(&self, inner: Arc<Self>) -> Self {
        match self {
            Self::Select {
                select_all,
                variables,
                ..
            } => Self::Select {
                inner,
                select_all: *select_all,
                variables: variables.clone(),
            },
            Self::Distinct { .. } => Self::Distinct { inner },
            Self::Reduced { .. } => Self::Reduced { inner },
            Self::OrderBy { ordering, .. } => Self::OrderBy {
                inner,
                ordering: ordering.clone(),
            },
            Self::Filter { expr, .. } => Self::Filter {
                inner,
                expr: expr.clone(),
            },
            Self::Slice { offset, limit, .. } => Self::Slice {
                inner,
                offset: *offset,
                limit: *limit,
            },
            Self::Empty
            | Self::Bgp { .. }
            | Self::Path { .. }
            | Self::Join { .. }
            | Self::LeftJoin { .. }
            | Self::Union { .. } => self.clone(),
        }
    }

    /// Same node kind over new operands. Only meaningful for join-class nodes.
    fn with_operands(&self, left: Arc<Self>, right: Arc<Self>) -> Self {
        match self {
            Self::Join { .. } => Self::Join { left, right },
            Self::LeftJoin { .. } => Self::LeftJoin { left, right },
            Self::Union { .. } => Self::Union { left, right },
            Self::Empty
            | Self::Bgp { .. }
            | Self::Path { .. }
            | Self::Select { .. }
            | Self::Distinct { .. }
            | Self::Reduced { .. }
            | Self::OrderBy { .. }
            | Self::Filter { .. }
            | Self::Slice { .. } => self.clone(),
        }
    }
}

// ============================================================================
// Variables
// ============================================================================

impl Algebra {
    /// Variables this node can bind in its output, in first-seen order.
    pub fn variables(&self) -> Vec<Var> {
        let mut out = Vec::new();
        self.collect_output(&mut out);
        out
    }

    fn collect_output(&self, out: &mut Vec<Var>) {
        fn push(out: &mut Vec<Var>, var: &Var) {
            if !out.contains(var) {
                out.push(var.clone());
            }
        }
        match self {
            Self::Empty => {}
            Self::Bgp { patterns } => {
                for var in patterns.iter().flat_map(TriplePattern::variables) {
                    push(out, var);
                }
            }
            Self::Path { pattern } => {
                for var in pattern.variables() {
                    push(out, var);
                }
            }
            Self::Select {
                inner,
                select_all: true,
                ..
            } => {
                for var in inner.variables().iter().filter(|v| !v.is_hidden()) {
                    push(out, var);
                }
            }
            Self::Select { variables, .. } => {
                for var in variables {
                    push(out, var);
                }
            }
            Self::Distinct { inner }
            | Self::Reduced { inner }
            | Self::OrderBy { inner, .. }
            | Self::Filter { inner, .. }
            | Self::Slice { inner, .. } => inner.collect_output(out),
            Self::Join { left, right } | Self::LeftJoin { left, right } | Self::Union { left, right } => {
                left.collect_output(out);
                right.collect_output(out);
            }
        }
    }

    /// Every variable named anywhere in the tree, hidden ones included.
    pub fn mentioned_variables(&self) -> BTreeSet<Var> {
        let mut out = BTreeSet::new();
        self.collect_mentioned(&mut out);
        out
    }

    fn collect_mentioned(&self, out: &mut BTreeSet<Var>) {
        match self {
            Self::Select { variables, .. } => out.extend(variables.iter().cloned()),
            Self::OrderBy { ordering, .. } => out.extend(ordering.variables().cloned()),
            Self::Filter { expr, .. } => out.extend(expr.variables().into_iter().cloned()),
            Self::Bgp { .. } | Self::Path { .. } => out.extend(self.variables()),
            _ => {}
        }
        match self.operator() {
            Operator::Terminal => {}
            Operator::Unary { inner } => inner.collect_mentioned(out),
            Operator::Join { left, right } => {
                left.collect_mentioned(out);
                right.collect_mentioned(out);
            }
        }
    }
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for Algebra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Bgp { patterns } => {
                let rendered: Vec<String> = patterns.iter().map(ToString::to_string).collect();
                write!(f, "Bgp({})", rendered.join(" . "))
            }
            Self::Path { pattern } => write!(f, "Path({pattern})"),
            Self::Select {
                inner,
                select_all: true,
                ..
            } => write!(f, "Select({inner}, *)"),
            Self::Select { inner, variables, .. } => {
                let rendered: Vec<String> = variables.iter().map(ToString::to_string).collect();
                write!(f, "Select({inner}, [{}])", rendered.join(" "))
            }
            Self::Distinct { inner } => write!(f, "Distinct({inner})"),
            Self::Reduced { inner } => write!(f, "Reduced({inner})"),
            Self::OrderBy { inner, ordering } => write!(f, "OrderBy({inner}, {ordering})"),
            Self::Filter { inner, expr } => write!(f, "Filter({inner}, {expr})"),
            Self::Slice { inner, offset, limit } => match limit {
                Some(limit) => write!(f, "Slice({inner}, {offset}, {limit})"),
                None => write!(f, "Slice({inner}, {offset}, *)"),
            },
            Self::Join { left, right } => write!(f, "Join({left}, {right})"),
            Self::LeftJoin { left, right } => write!(f, "LeftJoin({left}, {right})"),
            Self::Union { left, right } => write!(f, "Union({left}, {right})"),
        }
    }
}
