//! Records of unsuccessful calls.

use breakwater_core::SharedError;
use std::fmt;
use std::time::Duration;

/// Why an engaged-path call was counted as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FailureKind {
    /// The operation returned an error.
    Fault,
    /// The per-call deadline elapsed before the operation completed.
    TimedOut,
    /// The operation succeeded but the result validator rejected its value.
    InvalidResult,
}

impl FailureKind {
    /// Returns a stable, lowercase label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Fault => "fault",
            FailureKind::TimedOut => "timeout",
            FailureKind::InvalidResult => "invalid_result",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable record of one failed call.
///
/// Records are produced only for failures; successful calls and calls
/// cancelled by the caller never produce one.
#[derive(Clone)]
pub struct OutcomeRecord {
    elapsed: Duration,
    kind: FailureKind,
    cause: Option<SharedError>,
}

impl OutcomeRecord {
    /// A record for an operation that returned `cause`.
    pub fn fault(elapsed: Duration, cause: SharedError) -> Self {
        Self {
            elapsed,
            kind: FailureKind::Fault,
            cause: Some(cause),
        }
    }

    /// A record for an operation that outlived its deadline.
    pub fn timed_out(elapsed: Duration) -> Self {
        Self {
            elapsed,
            kind: FailureKind::TimedOut,
            cause: None,
        }
    }

    /// A record for a result rejected by the validator.
    pub fn invalid_result(elapsed: Duration) -> Self {
        Self {
            elapsed,
            kind: FailureKind::InvalidResult,
            cause: None,
        }
    }

    /// Time spent in the operation before the failure was observed.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// The error returned by the operation, for [`FailureKind::Fault`] records.
    pub fn cause(&self) -> Option<&SharedError> {
        self.cause.as_ref()
    }
}

impl fmt::Debug for OutcomeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeRecord")
            .field("elapsed", &self.elapsed)
            .field("kind", &self.kind)
            .field("cause", &self.cause.as_ref().map(|c| c.to_string()))
            .finish()
    }
}
