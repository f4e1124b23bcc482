use thiserror::Error;

/// Errors detected while building a breaker or monitor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The failure history must retain at least one record.
    #[error("history capacity must be greater than zero")]
    ZeroHistoryCapacity,

    /// Alarm predicates must be evaluated at least every `n` logs for some `n > 0`.
    #[error("evaluation interval must be greater than zero")]
    ZeroEvaluationInterval,
}

/// The error produced when an operation is abandoned because its
/// cancellation signal fired.
///
/// The Tower adapter returns this when it stops waiting on an inner service.
/// Operations passed to [`CircuitBreaker::invoke`](crate::CircuitBreaker::invoke)
/// may return it as well after observing their token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Error)]
#[error("operation cancelled")]
pub struct Cancelled;
