use std::time::Duration;

/// Errors surfaced by path evaluation, path compilation and algebra optimisation.
///
/// "Rule not applicable" is never an error: optimisers express it by returning
/// their input unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("malformed path expression: {reason}")]
    MalformedPath { reason: String },
    /// The algebra tree is structurally invalid, which points at a defect in
    /// whatever compiled it.
    #[error("invalid algebra: {reason}")]
    InvalidAlgebra { reason: String },
    #[error("evaluation timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },
    #[error("evaluation was cancelled")]
    Cancelled,
}

impl QueryError {
    pub fn malformed_path(reason: impl Into<String>) -> Self {
        Self::MalformedPath {
            reason: reason.into(),
        }
    }

    pub fn invalid_algebra(reason: impl Into<String>) -> Self {
        Self::InvalidAlgebra {
            reason: reason.into(),
        }
    }

    /// Timeouts and cancellations are recoverable by the caller (retry with a
    /// larger budget); malformed input is not.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
