//! Compile-time switch for rewrite journaling.
//!
//! The optimiser pipeline has one code path for plain execution and for
//! EXPLAIN-style tooling. It is generic over a [`TraceMode`]: with
//! [`NoTrace`] the journal is `()` and event constructors never run, with
//! [`WithTrace`] every event is built and kept.

/// Chooses whether journal entries are produced at all.
pub trait TraceMode {
    /// What a journal of `T` entries looks like in this mode.
    type Journal<T>;

    fn empty<T>() -> Self::Journal<T>;

    /// Append the entry built by `produce`. `NoTrace` must not call it.
    fn record<T>(journal: &mut Self::Journal<T>, produce: impl FnOnce() -> T);
}

/// Journaling off; entries are never built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoTrace {}

impl TraceMode for NoTrace {
    type Journal<T> = ();

    #[inline]
    fn empty<T>() -> Self::Journal<T> {}

    #[inline]
    fn record<T>(_journal: &mut Self::Journal<T>, _produce: impl FnOnce() -> T) {}
}

/// Journaling on; entries are kept in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithTrace {}

impl TraceMode for WithTrace {
    type Journal<T> = Vec<T>;

    #[inline]
    fn empty<T>() -> Self::Journal<T> {
        Vec::new()
    }

    #[inline]
    fn record<T>(journal: &mut Self::Journal<T>, produce: impl FnOnce() -> T) {
        journal.push(produce());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn no_trace_never_builds_entries() {
        let built = Cell::new(0);
        let mut journal = NoTrace::empty::<u32>();
        NoTrace::record(&mut journal, || {
            built.set(built.get() + 1);
            7
        });
        let () = journal;
        assert_eq!(built.get(), 0);
    }

    #[test]
    fn with_trace_keeps_entries_in_order() {
        let mut journal = WithTrace::empty::<&str>();
        WithTrace::record(&mut journal, || "first");
        WithTrace::record(&mut journal, || "second");
        assert_eq!(journal, vec!["first", "second"]);
    }
}
