//! Direct traversal of property paths over a [`TripleSource`].
//!
//! Results are `(subject, object)` pairs oriented like the path pattern, no
//! matter which end the walk started from. Sequencing, alternation and fixed
//! repetition keep bag semantics (one pair per matching walk), which is what
//! the join/union translation of the same path produces. Closures and the
//! cardinality ranges are reachability questions and yield each end node once
//! per start node.

use super::context::{Direction, PathEnd, PathEvaluationContext};
use super::Path;
use crate::error::Result;
use quiver_graph::{NodeId, Term, TripleSource};
use roaring::RoaringBitmap;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::trace;

type Pairs = Vec<(NodeId, NodeId)>;

/// Walks a [`Path`] against a graph.
pub struct PathEvaluator<'g, G: TripleSource + ?Sized> {
    graph: &'g G,
}

impl<'g, G: TripleSource + ?Sized> PathEvaluator<'g, G> {
    pub fn new(graph: &'g G) -> Self {
        Self { graph }
    }

    /// Evaluate `path` between the ends held by `ctx`.
    pub fn evaluate(&self, path: &Path, ctx: &mut PathEvaluationContext) -> Result<Pairs> {
        path.validate()?;
        let (subject, object) = (ctx.subject(), ctx.object());
        self.step(path, subject, object, ctx)
    }

    /// Every node reachable from `start` along `path`, once each.
    pub fn reachable_from(&self, path: &Path, start: NodeId) -> Result<Vec<NodeId>> {
        let mut ctx = PathEvaluationContext::new(PathEnd::Bound(start), PathEnd::Unbound);
        let pairs = self.evaluate(path, &mut ctx)?;
        let mut seen = HashSet::new();
        Ok(pairs
            .into_iter()
            .map(|(_, object)| object)
            .filter(|object| seen.insert(*object))
            .collect())
    }

    fn step(&self, path: &Path, from: PathEnd, to: PathEnd, ctx: &mut PathEvaluationContext) -> Result<Pairs> {
        ctx.check()?;
        match path {
            Path::Predicate { iri } => Ok(self.edges(iri, from, to)),
            Path::Inverse { path } => {
                ctx.flip_direction();
                let swapped = self.step(path, to, from, ctx);
                ctx.flip_direction();
                Ok(swapped?.into_iter().map(|(s, o)| (o, s)).collect())
            }
            Path::Sequence { left, right } => self.sequence(left, right, from, to, ctx),
            Path::Alternative { left, right } => {
                let mut pairs = self.step(left, from, to, ctx)?;
                pairs.extend(self.step(right, from, to, ctx)?);
                Ok(pairs)
            }
            Path::ZeroOrOne { path } => {
                let mut pairs = self.zero_length(from, to);
                pairs.extend(self.step(path, from, to, ctx)?);
                Ok(distinct(pairs))
            }
            Path::ZeroOrMore { path } => self.reach(path, 0, None, from, to, ctx),
            Path::OneOrMore { path } => self.reach(path, 1, None, from, to, ctx),
            Path::NOrMore { path, n } => self.reach(path, *n, None, from, to, ctx),
            Path::ZeroToN { path, n } => self.reach(path, 0, Some(*n), from, to, ctx),
            Path::NToM { path, n, m } => self.reach(path, *n, Some(*m), from, to, ctx),
            Path::FixedLength { path, n } => self.repeat(path, *n, from, to, ctx),
            Path::NegatedSet { forward, inverse } => Ok(self.negated(forward, inverse, from, to)),
        }
    }

    fn edges(&self, iri: &Term, from: PathEnd, to: PathEnd) -> Pairs {
        let Some(predicate) = self.graph.lookup(iri) else {
            return Vec::new();
        };
        self.graph
            .triples(from.node(), Some(predicate), to.node())
            .into_iter()
            .map(|t| (t.subject, t.object))
            .collect()
    }

    fn zero_length(&self, from: PathEnd, to: PathEnd) -> Pairs {
        match (from, to) {
            (PathEnd::Bound(s), PathEnd::Bound(o)) if s == o => vec![(s, s)],
            (PathEnd::Bound(_), PathEnd::Bound(_)) => Vec::new(),
            (PathEnd::Bound(n), PathEnd::Unbound) | (PathEnd::Unbound, PathEnd::Bound(n)) => {
                vec![(n, n)]
            }
            (PathEnd::Unbound, PathEnd::Unbound) => self
                .graph
                .nodes()
                .iter()
                .map(|raw| (NodeId::new(raw), NodeId::new(raw)))
                .collect(),
        }
    }

    // ========================================================================
    // Sequencing
    // ========================================================================

    /// Walk from whichever end is bound so the intermediate node is always
    /// known when the second hop is evaluated.
    fn sequence(
        &self,
        left: &Path,
        right: &Path,
        from: PathEnd,
        to: PathEnd,
        ctx: &mut PathEvaluationContext,
    ) -> Result<Pairs> {
        if !from.is_bound() && to.is_bound() {
            let tail = self.step(right, PathEnd::Unbound, to, ctx)?;
            self.prepend(left, from, tail, ctx)
        } else {
            let head = self.step(left, from, PathEnd::Unbound, ctx)?;
            self.extend(head, right, to, ctx)
        }
    }

    fn extend(&self, head: Pairs, path: &Path, to: PathEnd, ctx: &mut PathEvaluationContext) -> Result<Pairs> {
        let mut hops: HashMap<NodeId, Pairs> = HashMap::new();
        let mut out = Vec::new();
        for (subject, mid) in head {
            let next = match hops.entry(mid) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    let pairs = self.step(path, PathEnd::Bound(mid), to, ctx)?;
                    e.insert(pairs)
                }
            };
            out.extend(next.iter().map(|&(_, object)| (subject, object)));
        }
        Ok(out)
    }

    fn prepend(&self, path: &Path, from: PathEnd, tail: Pairs, ctx: &mut PathEvaluationContext) -> Result<Pairs> {
        let mut hops: HashMap<NodeId, Pairs> = HashMap::new();
        let mut out = Vec::new();
        for (mid, object) in tail {
            let prev = match hops.entry(mid) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    let pairs = self.step(path, from, PathEnd::Bound(mid), ctx)?;
                    e.insert(pairs)
                }
            };
            out.extend(prev.iter().map(|&(subject, _)| (subject, object)));
        }
        Ok(out)
    }

    /// `p{n}` as `n` sequenced copies of `p`, one pair per walk.
    fn repeat(&self, path: &Path, n: u32, from: PathEnd, to: PathEnd, ctx: &mut PathEvaluationContext) -> Result<Pairs> {
        if n == 0 {
            return Ok(self.zero_length(from, to));
        }
        let (starts, direction, far): (Vec<NodeId>, Direction, PathEnd) = match (from, to) {
            (PathEnd::Bound(s), _) => (vec![s], Direction::Forward, to),
            (PathEnd::Unbound, PathEnd::Bound(o)) => (vec![o], Direction::Inverse, from),
            (PathEnd::Unbound, PathEnd::Unbound) => (
                self.graph.nodes().iter().map(NodeId::new).collect(),
                Direction::Forward,
                to,
            ),
        };

        let mut hops = HashMap::new();
        let mut pairs = Vec::new();
        for start in starts {
            for (node, walks) in self.count_walks(path, start, n, direction, &mut hops, ctx)? {
                if !far.admits(node) {
                    continue;
                }
                let pair = match direction {
                    Direction::Forward => (start, node),
                    Direction::Inverse => (node, start),
                };
                for _ in 0..walks {
                    ctx.check()?;
                    pairs.push(pair);
                }
            }
        }
        Ok(pairs)
    }

    /// Number of walks of exactly `n` applications of `path` from `start` to
    /// each node.
    ///
    /// Each round's counts are a function of the previous round's, so once a
    /// round repeats the rest of the sequence cycles through the history.
    fn count_walks(
        &self,
        path: &Path,
        start: NodeId,
        n: u32,
        direction: Direction,
        hops: &mut HashMap<NodeId, Vec<NodeId>>,
        ctx: &mut PathEvaluationContext,
    ) -> Result<BTreeMap<NodeId, u64>> {
        let mut counts = BTreeMap::from([(start, 1u64)]);
        let mut history = vec![counts.clone()];
        let mut seen = HashMap::from([(counts.clone(), 0usize)]);

        for k in 1..=n as usize {
            let mut next: BTreeMap<NodeId, u64> = BTreeMap::new();
            for (&node, &walks) in &counts {
                let targets = match hops.entry(node) {
                    Entry::Occupied(e) => e.into_mut(),
                    Entry::Vacant(e) => {
                        let targets = self.hop(path, node, direction, ctx)?;
                        e.insert(targets)
                    }
                };
                for &target in targets.iter() {
                    let slot = next.entry(target).or_insert(0);
                    *slot = slot.saturating_add(walks);
                }
            }
            if next.is_empty() {
                return Ok(next);
            }
            if let Some(&i) = seen.get(&next) {
                let period = k - i;
                let remaining = n as usize - k;
                return Ok(history[i + remaining % period].clone());
            }
            seen.insert(next.clone(), k);
            history.push(next.clone());
            counts = next;
        }
        Ok(counts)
    }

    // ========================================================================
    // Reachability (closures and cardinality ranges)
    // ========================================================================

    /// Pairs whose ends are joined by a walk of `min..=max` applications of
    /// `path` (`max = None` is unbounded).
    fn reach(
        &self,
        path: &Path,
        min: u32,
        max: Option<u32>,
        from: PathEnd,
        to: PathEnd,
        ctx: &mut PathEvaluationContext,
    ) -> Result<Pairs> {
        let (starts, direction): (Vec<NodeId>, Direction) = match (from, to) {
            (PathEnd::Bound(s), _) => (vec![s], Direction::Forward),
            (PathEnd::Unbound, PathEnd::Bound(o)) => (vec![o], Direction::Inverse),
            (PathEnd::Unbound, PathEnd::Unbound) => (
                self.graph.nodes().iter().map(NodeId::new).collect(),
                Direction::Forward,
            ),
        };

        let mut pairs = Vec::new();
        for start in starts {
            let seeds = self.exactly(path, start, min, direction, ctx)?;
            let depth = max.map(|m| m.saturating_sub(min));
            let reached = self.closure(path, seeds, depth, direction, ctx)?;
            for node in reached.iter().map(NodeId::new) {
                match direction {
                    Direction::Forward if to.admits(node) => pairs.push((start, node)),
                    Direction::Inverse if from.admits(node) => pairs.push((node, start)),
                    _ => {}
                }
            }
        }
        Ok(pairs)
    }

    /// Ends of every one-step walk of `path` from `node`, repeated per walk.
    fn hop(&self, path: &Path, node: NodeId, direction: Direction, ctx: &mut PathEvaluationContext) -> Result<Vec<NodeId>> {
        Ok(match direction {
            Direction::Forward => self
                .step(path, PathEnd::Bound(node), PathEnd::Unbound, ctx)?
                .into_iter()
                .map(|(_, o)| o)
                .collect(),
            Direction::Inverse => self
                .step(path, PathEnd::Unbound, PathEnd::Bound(node), ctx)?
                .into_iter()
                .map(|(s, _)| s)
                .collect(),
        })
    }

    /// Nodes one application of `path` away from `node`.
    fn successors(
        &self,
        path: &Path,
        node: NodeId,
        direction: Direction,
        ctx: &mut PathEvaluationContext,
    ) -> Result<RoaringBitmap> {
        Ok(self.hop(path, node, direction, ctx)?.into_iter().map(NodeId::raw).collect())
    }

    /// Nodes at the end of a walk of exactly `n` steps from `start`.
    ///
    /// Each frontier is a function of the previous one, so once a frontier
    /// repeats the sequence is periodic and the answer for any `n` can be read
    /// off the history.
    fn exactly(
        &self,
        path: &Path,
        start: NodeId,
        n: u32,
        direction: Direction,
        ctx: &mut PathEvaluationContext,
    ) -> Result<RoaringBitmap> {
        let mut frontier = RoaringBitmap::new();
        frontier.insert(start.raw());
        let mut history = vec![frontier.clone()];

        for k in 1..=n as usize {
            let mut next = RoaringBitmap::new();
            for node in frontier.iter().map(NodeId::new) {
                next |= self.successors(path, node, direction, ctx)?;
            }
            if next.is_empty() {
                return Ok(next);
            }
            if let Some(i) = history.iter().position(|seen| *seen == next) {
                let period = k - i;
                let remaining = n as usize - k;
                return Ok(history[i + remaining % period].clone());
            }
            history.push(next.clone());
            frontier = next;
        }
        Ok(frontier)
    }

    /// Breadth-first closure from `seeds`, at most `depth` extra steps.
    /// Every node enters the visited set once, which bounds the walk on
    /// cyclic graphs.
    fn closure(
        &self,
        path: &Path,
        seeds: RoaringBitmap,
        depth: Option<u32>,
        direction: Direction,
        ctx: &mut PathEvaluationContext,
    ) -> Result<RoaringBitmap> {
        ctx.enter_closure();
        let walked = self.walk_closure(path, seeds, depth, direction, ctx);
        let visited = ctx.exit_closure().unwrap_or_default();
        walked.map(|()| visited)
    }

    fn walk_closure(
        &self,
        path: &Path,
        seeds: RoaringBitmap,
        depth: Option<u32>,
        direction: Direction,
        ctx: &mut PathEvaluationContext,
    ) -> Result<()> {
        let mut frontier: Vec<NodeId> = seeds
            .iter()
            .map(NodeId::new)
            .filter(|node| ctx.mark_visited(*node))
            .collect();
        let mut level = 0u32;

        while !frontier.is_empty() && depth.map_or(true, |d| level < d) {
            trace!(
                closure_depth = ctx.closure_depth(),
                orientation = ?ctx.direction(),
                bfs_level = level,
                frontier = frontier.len(),
                "path closure frontier"
            );
            let mut next = Vec::new();
            for node in frontier {
                for succ in self.successors(path, node, direction, ctx)?.iter().map(NodeId::new) {
                    if ctx.mark_visited(succ) {
                        next.push(succ);
                    }
                }
            }
            frontier = next;
            level += 1;
        }
        Ok(())
    }

    // ========================================================================
    // Negated property sets
    // ========================================================================

    fn negated(&self, forward: &[Term], inverse: &[Term], from: PathEnd, to: PathEnd) -> Pairs {
        let mut pairs = Vec::new();
        if !forward.is_empty() {
            let banned = self.ids(forward);
            pairs.extend(
                self.graph
                    .triples(from.node(), None, to.node())
                    .into_iter()
                    .filter(|t| !banned.contains(&t.predicate))
                    .map(|t| (t.subject, t.object)),
            );
        }
        if !inverse.is_empty() {
            let banned = self.ids(inverse);
            pairs.extend(
                self.graph
                    .triples(to.node(), None, from.node())
                    .into_iter()
                    .filter(|t| !banned.contains(&t.predicate))
                    .map(|t| (t.object, t.subject)),
            );
        }
        pairs
    }

    /// Forbidden IRIs the graph has never seen cannot match anything anyway.
    fn ids(&self, terms: &[Term]) -> Vec<NodeId> {
        terms.iter().filter_map(|t| self.graph.lookup(t)).collect()
    }
}

fn distinct(pairs: Pairs) -> Pairs {
    let mut seen = HashSet::with_capacity(pairs.len());
    pairs.into_iter().filter(|pair| seen.insert(*pair)).collect()
}
