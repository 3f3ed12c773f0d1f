//! Variables, term patterns and triple patterns.

use crate::path::Path;
use quiver_graph::Term;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of compiler-allocated variables.
const HIDDEN_PREFIX: &str = "_:path";

/// Names starting with this are escaped by [`Var::new`], so no user-built
/// variable can collide with a hidden one.
const RESERVED_PREFIX: &str = "_:";

/// A query variable, stored without its leading `?`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Var(String);

impl Var {
    /// A user variable. A leading `?` is dropped, and a name in the reserved
    /// `_:` namespace gets one more `_:` in front.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let name = match name.strip_prefix('?') {
            Some(stripped) => stripped.to_string(),
            None => name,
        };
        if name.starts_with(RESERVED_PREFIX) {
            Self(format!("{RESERVED_PREFIX}{name}"))
        } else {
            Self(name)
        }
    }

    pub(crate) fn hidden(index: usize) -> Self {
        Self(format!("{HIDDEN_PREFIX}{index}"))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Hidden variables are intermediate path nodes; select-all projections drop them.
    pub fn is_hidden(&self) -> bool {
        self.0.starts_with(HIDDEN_PREFIX)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

impl From<&str> for Var {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Either a variable or a concrete term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TermPattern {
    Var(Var),
    Node(Term),
}

impl TermPattern {
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(Var::new(name))
    }

    pub fn as_var(&self) -> Option<&Var> {
        match self {
            Self::Var(v) => Some(v),
            Self::Node(_) => None,
        }
    }
}

impl From<Var> for TermPattern {
    fn from(var: Var) -> Self {
        Self::Var(var)
    }
}

impl From<Term> for TermPattern {
    fn from(term: Term) -> Self {
        Self::Node(term)
    }
}

impl fmt::Display for TermPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(v) => v.fmt(f),
            Self::Node(t) => t.fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriplePattern {
    pub subject: TermPattern,
    pub predicate: TermPattern,
    pub object: TermPattern,
}

impl TriplePattern {
    pub fn new(
        subject: impl Into<TermPattern>,
        predicate: impl Into<TermPattern>,
        object: impl Into<TermPattern>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    pub fn variables(&self) -> impl Iterator<Item = &Var> {
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter_map(TermPattern::as_var)
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// A property path anchored between a subject and an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathPattern {
    pub subject: TermPattern,
    pub path: Path,
    pub object: TermPattern,
}

impl PathPattern {
    pub fn new(subject: impl Into<TermPattern>, path: Path, object: impl Into<TermPattern>) -> Self {
        Self {
            subject: subject.into(),
            path,
            object: object.into(),
        }
    }

    pub fn variables(&self) -> impl Iterator<Item = &Var> {
        [&self.subject, &self.object]
            .into_iter()
            .filter_map(TermPattern::as_var)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.path, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_strips_question_mark() {
        assert_eq!(Var::new("?name"), Var::new("name"));
        assert_eq!(Var::new("name").to_string(), "?name");
    }

    #[test]
    fn hidden_vars_are_recognised() {
        assert!(Var::hidden(3).is_hidden());
        assert!(!Var::new("path3").is_hidden());
    }

    #[test]
    fn user_names_cannot_spell_hidden_vars() {
        for name in ["_:path0", "?_:path0"] {
            let var = Var::new(name);
            assert!(!var.is_hidden(), "{name}");
            assert_ne!(var, Var::hidden(0));
            assert_eq!(var.name(), "_:_:path0");
        }
        assert_ne!(Var::new("_:x"), Var::new("_:_:x"));
    }

    #[test]
    fn triple_pattern_lists_only_variables() {
        let tp = TriplePattern::new(
            TermPattern::var("s"),
            Term::iri("http://example.org/p"),
            TermPattern::var("o"),
        );
        let vars: Vec<_> = tp.variables().map(Var::name).collect();
        assert_eq!(vars, vec!["s", "o"]);
    }
}
