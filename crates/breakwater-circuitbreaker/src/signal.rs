//! Per-call cancellation scope.
//!
//! Every call derives its own signals from the caller's long-lived token and
//! the configured deadline, so concurrent calls on one breaker never share a
//! deadline.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub(crate) struct CallSignal {
    caller: CancellationToken,
    deadline: CancellationToken,
    merged: CancellationToken,
    expires_at: Option<Instant>,
}

impl CallSignal {
    /// Derives the signals for one call. The deadline clock starts now.
    pub(crate) fn new(caller: &CancellationToken, deadline: Option<Duration>) -> Self {
        let signal = Self {
            caller: caller.clone(),
            deadline: CancellationToken::new(),
            merged: caller.child_token(),
            expires_at: None,
        };

        match deadline {
            Some(limit) if limit.is_zero() => {
                signal.expire();
                signal
            }
            Some(limit) => Self {
                expires_at: Instant::now().checked_add(limit),
                ..signal
            },
            None => signal,
        }
    }

    /// The token handed to the operation: fires on caller cancellation or
    /// when the deadline elapses.
    pub(crate) fn token(&self) -> CancellationToken {
        self.merged.clone()
    }

    pub(crate) fn caller_cancelled(&self) -> bool {
        self.caller.is_cancelled()
    }

    pub(crate) fn deadline_elapsed(&self) -> bool {
        self.deadline.is_cancelled()
    }

    /// Drives `fut` to completion, firing the deadline signal if it elapses
    /// first. The future is never dropped early: it keeps running until it
    /// observes the signal or finishes.
    pub(crate) async fn run<F: Future>(&self, fut: F) -> F::Output {
        let Some(expires_at) = self.expires_at else {
            return fut.await;
        };

        tokio::pin!(fut);
        tokio::select! {
            biased;
            output = &mut fut => output,
            _ = tokio::time::sleep_until(expires_at) => {
                self.expire();
                fut.await
            }
        }
    }

    fn expire(&self) {
        self.deadline.cancel();
        self.merged.cancel();
    }
}
