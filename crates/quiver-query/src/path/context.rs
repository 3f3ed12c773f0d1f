//! Per-call traversal state for path evaluation.

use crate::error::{QueryError, Result};
use quiver_graph::NodeId;
use roaring::RoaringBitmap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One end of a path: a concrete node or a free position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathEnd {
    Bound(NodeId),
    Unbound,
}

impl PathEnd {
    pub fn node(self) -> Option<NodeId> {
        match self {
            Self::Bound(id) => Some(id),
            Self::Unbound => None,
        }
    }

    pub fn is_bound(self) -> bool {
        matches!(self, Self::Bound(_))
    }

    /// Whether `id` may sit at this end.
    pub fn admits(self, id: NodeId) -> bool {
        match self {
            Self::Bound(bound) => bound == id,
            Self::Unbound => true,
        }
    }
}

impl From<Option<NodeId>> for PathEnd {
    fn from(id: Option<NodeId>) -> Self {
        id.map_or(Self::Unbound, Self::Bound)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Inverse,
}

impl Direction {
    pub fn flip(self) -> Self {
        match self {
            Self::Forward => Self::Inverse,
            Self::Inverse => Self::Forward,
        }
    }
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Cancellation has priority over the deadline.
pub(crate) fn check_interrupt(
    token: &CancellationToken,
    started: Instant,
    deadline: Option<Instant>,
) -> Result<()> {
    if token.is_cancelled() {
        return Err(QueryError::Cancelled);
    }
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Err(QueryError::Timeout {
            elapsed: started.elapsed(),
        }),
        _ => Ok(()),
    }
}

#[derive(Debug)]
struct ClosureFrame {
    visited: RoaringBitmap,
}

/// Mutable state for one top-level path evaluation.
///
/// Every closure being walked pushes a frame holding its visited set, so a
/// nested closure never sees (or pollutes) the nodes its parent has reached.
#[derive(Debug)]
pub struct PathEvaluationContext {
    subject: PathEnd,
    object: PathEnd,
    direction: Direction,
    frames: Vec<ClosureFrame>,
    cancellation: CancellationToken,
    started: Instant,
    deadline: Option<Instant>,
    steps: u64,
}

impl PathEvaluationContext {
    pub fn new(subject: PathEnd, object: PathEnd) -> Self {
        Self {
            subject,
            object,
            direction: Direction::Forward,
            frames: Vec::new(),
            cancellation: CancellationToken::default(),
            started: Instant::now(),
            deadline: None,
            steps: 0,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = self.started.checked_add(timeout);
        self
    }

    /// Share an already-running clock, e.g. the enclosing query's.
    pub fn with_deadline(mut self, started: Instant, deadline: Option<Instant>) -> Self {
        self.started = started;
        self.deadline = deadline;
        self
    }

    pub fn subject(&self) -> PathEnd {
        self.subject
    }

    pub fn object(&self) -> PathEnd {
        self.object
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of traversal steps taken so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Count one traversal step and fail if the evaluation was interrupted.
    pub(crate) fn check(&mut self) -> Result<()> {
        self.steps += 1;
        check_interrupt(&self.cancellation, self.started, self.deadline)
    }

    pub(crate) fn flip_direction(&mut self) {
        self.direction = self.direction.flip();
    }

    pub(crate) fn enter_closure(&mut self) {
        self.frames.push(ClosureFrame {
            visited: RoaringBitmap::new(),
        });
    }

    /// Mark `node` as reached by the innermost closure; `false` if it already was.
    pub(crate) fn mark_visited(&mut self, node: NodeId) -> bool {
        match self.frames.last_mut() {
            Some(frame) => frame.visited.insert(node.raw()),
            None => true,
        }
    }

    pub(crate) fn exit_closure(&mut self) -> Option<RoaringBitmap> {
        self.frames.pop().map(|f| f.visited)
    }

    pub(crate) fn closure_depth(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visited_sets_are_scoped_per_closure() {
        let mut ctx = PathEvaluationContext::new(PathEnd::Unbound, PathEnd::Unbound);
        let a = NodeId::new(1);

        ctx.enter_closure();
        assert!(ctx.mark_visited(a));
        assert!(!ctx.mark_visited(a));

        ctx.enter_closure();
        assert!(ctx.mark_visited(a));
        assert_eq!(ctx.closure_depth(), 2);
        ctx.exit_closure();

        assert!(!ctx.mark_visited(a));
        assert_eq!(ctx.exit_closure().map(|v| v.len()), Some(1));
        assert_eq!(ctx.closure_depth(), 0);
    }

    #[test]
    fn inverse_steps_flip_and_restore_orientation() {
        let mut ctx = PathEvaluationContext::new(PathEnd::Unbound, PathEnd::Unbound);
        assert_eq!(ctx.direction(), Direction::Forward);
        ctx.flip_direction();
        assert_eq!(ctx.direction(), Direction::Inverse);
        ctx.flip_direction();
        assert_eq!(ctx.direction(), Direction::Forward);
    }

    #[test]
    fn cancellation_is_observed_by_clones() {
        let token = CancellationToken::new();
        let mut ctx = PathEvaluationContext::new(PathEnd::Unbound, PathEnd::Unbound)
            .with_cancellation(token.clone());
        assert!(ctx.check().is_ok());
        token.cancel();
        assert_eq!(ctx.check(), Err(QueryError::Cancelled));
        assert_eq!(ctx.steps(), 2);
    }

    #[test]
    fn elapsed_deadline_times_out() {
        let mut ctx =
            PathEvaluationContext::new(PathEnd::Unbound, PathEnd::Unbound).with_timeout(Duration::ZERO);
        assert!(matches!(ctx.check(), Err(QueryError::Timeout { .. })));
    }

    #[test]
    fn path_ends_admit_matching_nodes() {
        let a = NodeId::new(1);
        assert!(PathEnd::Unbound.admits(a));
        assert!(PathEnd::Bound(a).admits(a));
        assert!(!PathEnd::Bound(NodeId::new(2)).admits(a));
        assert_eq!(PathEnd::from(Some(a)), PathEnd::Bound(a));
    }
}
