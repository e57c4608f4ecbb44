// src/context.rs
//! Per-call cancellation and deadline carried through admission and retrieval.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Caller-owned cancellation and deadline for one fetch.
///
/// Cloning shares the token, so canceling any clone cancels all of them.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe an existing token instead of a fresh one.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The earlier of `other` and the caller's own deadline.
    pub fn tighter_deadline(&self, other: Instant) -> Instant {
        match self.deadline {
            Some(own) if own < other => own,
            _ => other,
        }
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}
