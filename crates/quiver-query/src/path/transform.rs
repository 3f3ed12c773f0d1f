//! Lowering property paths into join/union algebra.

use super::Path;
use crate::algebra::Algebra;
use crate::error::Result;
use crate::pattern::{PathPattern, TermPattern, TriplePattern, Var};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// State for compiling one path: its anchoring ends and the fresh-variable
/// allocator.
#[derive(Debug, Clone)]
pub struct PathTransformContext {
    subject: TermPattern,
    object: TermPattern,
    next_id: usize,
    reserved: BTreeSet<Var>,
}

impl PathTransformContext {
    pub fn new(subject: impl Into<TermPattern>, object: impl Into<TermPattern>) -> Self {
        let subject = subject.into();
        let object = object.into();
        let reserved = [&subject, &object]
            .into_iter()
            .filter_map(TermPattern::as_var)
            .cloned()
            .collect();
        Self {
            subject,
            object,
            next_id: 0,
            reserved,
        }
    }

    /// Variables already in scope; fresh variables never reuse them.
    pub fn with_reserved(mut self, vars: impl IntoIterator<Item = Var>) -> Self {
        self.reserved.extend(vars);
        self
    }

    pub fn subject(&self) -> &TermPattern {
        &self.subject
    }

    pub fn object(&self) -> &TermPattern {
        &self.object
    }

    /// A hidden variable not yet used in this scope.
    pub fn next_variable(&mut self) -> Var {
        loop {
            let candidate = Var::hidden(self.next_id);
            self.next_id += 1;
            if self.reserved.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Reserved plus allocated variables, for seeding the next context.
    pub fn into_reserved(self) -> BTreeSet<Var> {
        self.reserved
    }
}

/// Compile `path` between the context's ends.
///
/// Predicates become triple patterns, sequences join on a fresh hidden
/// variable, alternatives become unions and simple fixed-length repetitions
/// unroll into joins. Everything with closure or reachability semantics stays a
/// `Path` operator, evaluated by traversal.
pub fn compile(path: &Path, ctx: &mut PathTransformContext) -> Result<Arc<Algebra>> {
    path.validate()?;
    let (subject, object) = (ctx.subject.clone(), ctx.object.clone());
    Ok(compile_between(path, subject, object, ctx))
}

fn compile_between(
    path: &Path,
    subject: TermPattern,
    object: TermPattern,
    ctx: &mut PathTransformContext,
) -> Arc<Algebra> {
    match path {
        Path::Predicate { iri } => {
            Algebra::bgp(vec![TriplePattern::new(subject, iri.clone(), object)])
        }
        Path::Inverse { path } => compile_between(path, object, subject, ctx),
        Path::Sequence { left, right } => {
            let mid: TermPattern = ctx.next_variable().into();
            let l = compile_between(left, subject, mid.clone(), ctx);
            let r = compile_between(right, mid, object, ctx);
            Algebra::join(l, r)
        }
        Path::Alternative { left, right } => {
            let l = compile_between(left, subject.clone(), object.clone(), ctx);
            let r = compile_between(right, subject, object, ctx);
            Algebra::union(l, r)
        }
        Path::FixedLength { path: inner, n } if path.is_simple() => {
            let mut from = subject;
            let mut acc: Option<Arc<Algebra>> = None;
            for k in 1..=*n {
                let to: TermPattern = if k == *n {
                    object.clone()
                } else {
                    ctx.next_variable().into()
                };
                let hop = compile_between(inner, from, to.clone(), ctx);
                acc = Some(match acc {
                    Some(prev) => Algebra::join(prev, hop),
                    None => hop,
                });
                from = to;
            }
            acc.unwrap_or_else(Algebra::empty)
        }
        _ => Algebra::path(PathPattern::new(subject, path.clone(), object)),
    }
}

/// Lower every `Path` node of `tree` through [`compile`].
///
/// Fresh variables are allocated against everything the tree already
/// mentions, and against each other, so two lowered paths never share an
/// intermediate node by accident. A fragment that binds intermediates is
/// projected back onto the path's end variables, so its rows carry the same
/// columns as traversal. Subtrees without paths keep their identity.
pub fn lower_paths(tree: &Arc<Algebra>) -> Result<Arc<Algebra>> {
    let mut reserved = tree.mentioned_variables();
    let lowered = lower(tree, &mut reserved)?;
    if !Arc::ptr_eq(&lowered, tree) {
        debug!(tree = %lowered, "lowered property paths");
    }
    Ok(lowered)
}

fn lower(node: &Arc<Algebra>, reserved: &mut BTreeSet<Var>) -> Result<Arc<Algebra>> {
    match &**node {
        Algebra::Path { pattern } => {
            let mut ctx = PathTransformContext::new(pattern.subject.clone(), pattern.object.clone())
                .with_reserved(std::mem::take(reserved));
            let compiled = compile(&pattern.path, &mut ctx);
            *reserved = ctx.into_reserved();
            let compiled = compiled?;
            if *compiled == **node {
                return Ok(Arc::clone(node));
            }
            // Intermediate nodes are existential: only the path's ends leave
            // the lowered fragment.
            if compiled.mentioned_variables().iter().any(Var::is_hidden) {
                Ok(Algebra::select(compiled, pattern.variables().cloned()))
            } else {
                Ok(compiled)
            }
        }
        _ => Algebra::map_children(node, |child| lower(child, reserved)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_graph::Term;

    fn p(name: &str) -> Path {
        Path::iri(format!("http://example.org/{name}"))
    }

    fn ctx() -> PathTransformContext {
        PathTransformContext::new(TermPattern::var("s"), TermPattern::var("o"))
    }

    #[test]
    fn sequence_joins_on_fresh_hidden_variable() {
        let path = Path::sequence(p("a"), p("b").inverse());
        let algebra = compile(&path, &mut ctx()).unwrap();
        let Algebra::Bgp { patterns } = &*algebra else {
            panic!("expected fused BGP, got {algebra}");
        };
        assert_eq!(patterns.len(), 2);
        let mid = patterns[0].object.as_var().unwrap();
        assert!(mid.is_hidden());
        // ^b swaps ends: ?o b ?mid
        assert_eq!(patterns[1].subject, TermPattern::var("o"));
        assert_eq!(patterns[1].object.as_var(), Some(mid));
    }

    #[test]
    fn alternative_compiles_to_union() {
        let algebra = compile(&Path::alternative(p("a"), p("b")), &mut ctx()).unwrap();
        assert!(matches!(&*algebra, Algebra::Union { .. }));
    }

    #[test]
    fn closures_stay_path_operators() {
        let path = Path::sequence(p("a").one_or_more(), p("b"));
        let algebra = compile(&path, &mut ctx()).unwrap();
        let Algebra::Join { left, right } = &*algebra else {
            panic!("expected join, got {algebra}");
        };
        assert!(matches!(&**left, Algebra::Path { .. }));
        assert!(matches!(&**right, Algebra::Bgp { .. }));
    }

    #[test]
    fn simple_fixed_length_unrolls() {
        let algebra = compile(&p("a").fixed_length(3), &mut ctx()).unwrap();
        let Algebra::Bgp { patterns } = &*algebra else {
            panic!("expected fused BGP, got {algebra}");
        };
        assert_eq!(patterns.len(), 3);
        assert_eq!(patterns[0].subject, TermPattern::var("s"));
        assert_eq!(patterns[2].object, TermPattern::var("o"));
        assert_eq!(patterns[0].object, patterns[1].subject);
    }

    #[test]
    fn fresh_variables_skip_reserved_names() {
        let mut ctx = ctx().with_reserved([Var::hidden(0), Var::hidden(1)]);
        assert_eq!(ctx.next_variable(), Var::hidden(2));
        assert_eq!(ctx.next_variable(), Var::hidden(3));
    }

    #[test]
    fn lowering_never_reuses_variables_across_paths() {
        let seq = Path::sequence(p("a"), p("b"));
        let tree = Algebra::join(
            Algebra::path(PathPattern::new(TermPattern::var("x"), seq.clone(), TermPattern::var("y"))),
            Algebra::path(PathPattern::new(TermPattern::var("y"), seq, TermPattern::var("z"))),
        );
        let lowered = lower_paths(&tree).unwrap();
        let hidden: Vec<Var> = lowered
            .mentioned_variables()
            .into_iter()
            .filter(Var::is_hidden)
            .collect();
        assert_eq!(hidden.len(), 2);
    }

    #[test]
    fn lowered_fragments_project_away_intermediates() {
        let tree = Algebra::distinct(Algebra::path(PathPattern::new(
            TermPattern::var("x"),
            Path::sequence(p("knows"), p("name")),
            TermPattern::var("n"),
        )));
        let lowered = lower_paths(&tree).unwrap();
        let Algebra::Distinct { inner } = &*lowered else {
            panic!("expected Distinct, got {lowered}");
        };
        assert!(matches!(&**inner, Algebra::Select { select_all: false, .. }));
        assert_eq!(lowered.variables(), vec![Var::new("x"), Var::new("n")]);

        // a single predicate has no intermediates and stays a bare scan
        let single = Algebra::path(PathPattern::new(TermPattern::var("x"), p("knows"), TermPattern::var("y")));
        assert!(matches!(&*lower_paths(&single).unwrap(), Algebra::Bgp { .. }));
    }

    #[test]
    fn lowering_leaves_path_free_trees_untouched() {
        let tree = Algebra::distinct(Algebra::bgp(vec![TriplePattern::new(
            TermPattern::var("s"),
            Term::iri("http://example.org/p"),
            TermPattern::var("o"),
        )]));
        assert!(Arc::ptr_eq(&lower_paths(&tree).unwrap(), &tree));

        let closure = Algebra::path(PathPattern::new(
            TermPattern::var("s"),
            p("a").zero_or_more(),
            TermPattern::var("o"),
        ));
        assert!(Arc::ptr_eq(&lower_paths(&closure).unwrap(), &closure));
    }

    #[test]
    fn malformed_paths_are_rejected() {
        let path = Path::predicate(Term::literal("nope"));
        assert!(compile(&path, &mut ctx()).is_err());
    }
}
