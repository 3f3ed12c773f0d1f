//! Property path expressions.
//!
//! A [`Path`] is an immutable tree; each composite node exclusively owns its
//! children. Paths are consumed two ways:
//!
//! - **traversal**: [`PathEvaluator`] walks the graph directly, and
//! - **translation**: [`compile`] lowers a path into ordinary BGP/join/union
//!   algebra, leaving only closures as opaque `Path` operators.

mod context;
mod eval;
mod transform;

pub(crate) use context::check_interrupt;
pub use context::{CancellationToken, Direction, PathEnd, PathEvaluationContext};
pub use eval::PathEvaluator;
pub use transform::{compile, lower_paths, PathTransformContext};

use crate::error::{QueryError, Result};
use quiver_graph::Term;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Property path AST.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Path {
    /// A single edge labelled `iri`.
    Predicate { iri: Term },
    /// `^p`
    Inverse { path: Box<Path> },
    /// `a / b`
    Sequence { left: Box<Path>, right: Box<Path> },
    /// `a | b`
    Alternative { left: Box<Path>, right: Box<Path> },
    /// `p?`
    ZeroOrOne { path: Box<Path> },
    /// `p*`
    ZeroOrMore { path: Box<Path> },
    /// `p+`
    OneOrMore { path: Box<Path> },
    /// `p{n}`
    FixedLength { path: Box<Path>, n: u32 },
    /// `p{n,}`
    NOrMore { path: Box<Path>, n: u32 },
    /// `p{,n}`
    ZeroToN { path: Box<Path>, n: u32 },
    /// `p{n,m}`
    NToM { path: Box<Path>, n: u32, m: u32 },
    /// `!(a|^b)`: any edge whose label is not forbidden. `forward` constrains
    /// edges walked subject→object, `inverse` edges walked object→subject;
    /// a direction with an empty list is not walked at all.
    NegatedSet { forward: Vec<Term>, inverse: Vec<Term> },
}

impl Path {
    pub fn predicate(iri: Term) -> Self {
        Self::Predicate { iri }
    }

    pub fn iri(iri: impl Into<String>) -> Self {
        Self::predicate(Term::iri(iri))
    }

    pub fn inverse(self) -> Self {
        Self::Inverse {
            path: Box::new(self),
        }
    }

    pub fn sequence(left: Path, right: Path) -> Self {
        Self::Sequence {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn alternative(left: Path, right: Path) -> Self {
        Self::Alternative {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn zero_or_one(self) -> Self {
        Self::ZeroOrOne {
            path: Box::new(self),
        }
    }

    pub fn zero_or_more(self) -> Self {
        Self::ZeroOrMore {
            path: Box::new(self),
        }
    }

    pub fn one_or_more(self) -> Self {
        Self::OneOrMore {
            path: Box::new(self),
        }
    }

    pub fn fixed_length(self, n: u32) -> Self {
        Self::FixedLength {
            path: Box::new(self),
            n,
        }
    }

    /// Build a cardinality-bounded path from parser-supplied bounds
    /// (`{n}`, `{n,}`, `{,m}`, `{n,m}`), picking the narrowest variant.
    pub fn bounded(self, min: i64, max: Option<i64>) -> Result<Self> {
        let min = cardinality(min)?;
        let max = max.map(cardinality).transpose()?;
        let path = Box::new(self);
        Ok(match max {
            None => match min {
                0 => Self::ZeroOrMore { path },
                1 => Self::OneOrMore { path },
                n => Self::NOrMore { path, n },
            },
            Some(m) if m < min => {
                return Err(QueryError::malformed_path(format!(
                    "cardinality upper bound {m} is below lower bound {min}"
                )))
            }
            Some(m) if m == min => Self::FixedLength { path, n: m },
            Some(m) if min == 0 => Self::ZeroToN { path, n: m },
            Some(m) => Self::NToM { path, n: min, m },
        })
    }

    /// `!(forward|^inverse)`; the set must not be empty and may only name IRIs.
    pub fn negated_set(forward: Vec<Term>, inverse: Vec<Term>) -> Result<Self> {
        let path = Self::NegatedSet { forward, inverse };
        path.validate()?;
        Ok(path)
    }

    /// Check the whole tree for malformed nodes.
    ///
    /// Constructors only see the node they build; trees assembled directly from
    /// variants (or deserialized) are checked here before first use.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Predicate { iri } => require_iri(iri),
            Self::Inverse { path }
            | Self::ZeroOrOne { path }
            | Self::ZeroOrMore { path }
            | Self::OneOrMore { path }
            | Self::FixedLength { path, .. }
            | Self::NOrMore { path, .. }
            | Self::ZeroToN { path, .. } => path.validate(),
            Self::NToM { path, n, m } => {
                if m < n {
                    return Err(QueryError::malformed_path(format!(
                        "cardinality upper bound {m} is below lower bound {n}"
                    )));
                }
                path.validate()
            }
            Self::Sequence { left, right } | Self::Alternative { left, right } => {
                left.validate()?;
                right.validate()
            }
            Self::NegatedSet { forward, inverse } => {
                if forward.is_empty() && inverse.is_empty() {
                    return Err(QueryError::malformed_path("negated property set is empty"));
                }
                forward.iter().chain(inverse).try_for_each(require_iri)
            }
        }
    }

    /// Whether the path is a fixed-direction chain of edges with no repetition
    /// or alternation, i.e. expressible as plain triple patterns.
    pub fn is_simple(&self) -> bool {
        match self {
            Self::Predicate { .. } => true,
            Self::Inverse { path } => path.is_simple(),
            Self::Sequence { left, right } => left.is_simple() && right.is_simple(),
            Self::FixedLength { path, n } => *n > 0 && path.is_simple(),
            Self::Alternative { .. }
            | Self::ZeroOrOne { .. }
            | Self::ZeroOrMore { .. }
            | Self::OneOrMore { .. }
            | Self::NOrMore { .. }
            | Self::ZeroToN { .. }
            | Self::NToM { .. }
            | Self::NegatedSet { .. } => false,
        }
    }

    /// Whether a match may start and end on the same node without walking an edge.
    pub fn allows_zero_length(&self) -> bool {
        match self {
            Self::ZeroOrOne { .. } | Self::ZeroOrMore { .. } | Self::ZeroToN { .. } => true,
            Self::FixedLength { path, n } | Self::NOrMore { path, n } => {
                *n == 0 || path.allows_zero_length()
            }
            Self::NToM { path, n, .. } => *n == 0 || path.allows_zero_length(),
            Self::Inverse { path } | Self::OneOrMore { path } => path.allows_zero_length(),
            Self::Sequence { left, right } => {
                left.allows_zero_length() && right.allows_zero_length()
            }
            Self::Alternative { left, right } => {
                left.allows_zero_length() || right.allows_zero_length()
            }
            Self::Predicate { .. } | Self::NegatedSet { .. } => false,
        }
    }

    fn is_atomic(&self) -> bool {
        matches!(self, Self::Predicate { .. } | Self::NegatedSet { .. })
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_atomic() {
            write!(f, "{self}")
        } else {
            write!(f, "({self})")
        }
    }
}

fn cardinality(bound: i64) -> Result<u32> {
    u32::try_from(bound)
        .map_err(|_| QueryError::malformed_path(format!("invalid path cardinality {bound}")))
}

fn require_iri(term: &Term) -> Result<()> {
    if term.is_iri() {
        Ok(())
    } else {
        Err(QueryError::malformed_path(format!(
            "path predicates must be IRIs (got {term})"
        )))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predicate { iri } => write!(f, "{iri}"),
            Self::Inverse { path } => {
                f.write_str("^")?;
                path.fmt_operand(f)
            }
            Self::Sequence { left, right } => {
                left.fmt_operand(f)?;
                f.write_str(" / ")?;
                right.fmt_operand(f)
            }
            Self::Alternative { left, right } => {
                left.fmt_operand(f)?;
                f.write_str(" | ")?;
                right.fmt_operand(f)
            }
            Self::ZeroOrOne { path } => {
                path.fmt_operand(f)?;
                f.write_str("?")
            }
            Self::ZeroOrMore { path } => {
                path.fmt_operand(f)?;
                f.write_str("*")
            }
            Self::OneOrMore { path } => {
                path.fmt_operand(f)?;
                f.write_str("+")
            }
            Self::FixedLength { path, n } => {
                path.fmt_operand(f)?;
                write!(f, "{{{n}}}")
            }
            Self::NOrMore { path, n } => {
                path.fmt_operand(f)?;
                write!(f, "{{{n},}}")
            }
            Self::ZeroToN { path, n } => {
                path.fmt_operand(f)?;
                write!(f, "{{,{n}}}")
            }
            Self::NToM { path, n, m } => {
                path.fmt_operand(f)?;
                write!(f, "{{{n},{m}}}")
            }
            Self::NegatedSet { forward, inverse } => {
                let members: Vec<String> = forward
                    .iter()
                    .map(ToString::to_string)
                    .chain(inverse.iter().map(|t| format!("^{t}")))
                    .collect();
                write!(f, "!({})", members.join("|"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str) -> Path {
        Path::iri(format!("http://example.org/{name}"))
    }

    #[test]
    fn simple_paths_are_fixed_direction_chains() {
        assert!(p("a").is_simple());
        assert!(p("a").inverse().is_simple());
        assert!(Path::sequence(p("a"), p("b").inverse()).is_simple());
        assert!(p("a").fixed_length(3).is_simple());

        assert!(!p("a").fixed_length(0).is_simple());
        assert!(!Path::alternative(p("a"), p("b")).is_simple());
        assert!(!p("a").one_or_more().is_simple());
        assert!(!Path::sequence(p("a"), p("b").zero_or_more()).is_simple());
    }

    #[test]
    fn zero_length_follows_composition() {
        assert!(p("a").zero_or_one().allows_zero_length());
        assert!(p("a").zero_or_more().allows_zero_length());
        assert!(!p("a").one_or_more().allows_zero_length());
        assert!(!p("a").allows_zero_length());
        assert!(p("a").fixed_length(0).allows_zero_length());

        let both = Path::sequence(p("a").zero_or_more(), p("b").zero_or_one());
        assert!(both.allows_zero_length());
        let one_side = Path::sequence(p("a").zero_or_more(), p("b"));
        assert!(!one_side.allows_zero_length());
        assert!(Path::alternative(p("a"), p("b").zero_or_one()).allows_zero_length());
    }

    #[test]
    fn bounded_picks_narrowest_variant() {
        assert!(matches!(p("a").bounded(0, None).unwrap(), Path::ZeroOrMore { .. }));
        assert!(matches!(p("a").bounded(1, None).unwrap(), Path::OneOrMore { .. }));
        assert!(matches!(p("a").bounded(3, None).unwrap(), Path::NOrMore { n: 3, .. }));
        assert!(matches!(p("a").bounded(2, Some(2)).unwrap(), Path::FixedLength { n: 2, .. }));
        assert!(matches!(p("a").bounded(0, Some(4)).unwrap(), Path::ZeroToN { n: 4, .. }));
        assert!(matches!(
            p("a").bounded(1, Some(4)).unwrap(),
            Path::NToM { n: 1, m: 4, .. }
        ));
    }

    #[test]
    fn malformed_cardinalities_are_rejected() {
        assert!(matches!(
            p("a").bounded(-1, None),
            Err(QueryError::MalformedPath { .. })
        ));
        assert!(matches!(
            p("a").bounded(3, Some(2)),
            Err(QueryError::MalformedPath { .. })
        ));

        let direct = Path::NToM {
            path: Box::new(p("a")),
            n: 5,
            m: 1,
        };
        assert!(direct.validate().is_err());
    }

    #[test]
    fn negated_sets_must_be_non_empty_iris() {
        assert!(Path::negated_set(vec![], vec![]).is_err());
        assert!(Path::negated_set(vec![Term::literal("x")], vec![]).is_err());
        assert!(Path::negated_set(vec![], vec![Term::iri("http://example.org/a")]).is_ok());
    }

    #[test]
    fn literal_predicates_are_malformed() {
        let path = Path::sequence(p("a"), Path::predicate(Term::literal("b")));
        assert!(path.validate().is_err());
    }

    #[test]
    fn display_renders_sparql_syntax() {
        let path = Path::sequence(p("a").one_or_more(), Path::alternative(p("b"), p("c").inverse()));
        assert_eq!(
            path.to_string(),
            "(<http://example.org/a>+) / (<http://example.org/b> | (^<http://example.org/c>))"
        );
        let negated = Path::negated_set(
            vec![Term::iri("http://example.org/a")],
            vec![Term::iri("http://example.org/b")],
        )
        .unwrap();
        assert_eq!(
            negated.to_string(),
            "!(<http://example.org/a>|^<http://example.org/b>)"
        );
        assert_eq!(p("a").bounded(1, Some(3)).unwrap().to_string(), "<http://example.org/a>{1,3}");
    }
}
