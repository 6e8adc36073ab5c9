//! Deadline and cancellation signal carried by each invocation.
//!
//! The host hands one [`Deadline`] to the entry point; it is threaded through
//! handlers via the request context and passed unchanged to the publisher.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Why a deadline check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeadlineError {
    /// The host cancelled the invocation.
    #[error("invocation was cancelled")]
    Cancelled,
    /// The invocation ran past its deadline.
    #[error("invocation deadline exceeded")]
    Exceeded,
}

/// Optional expiry instant plus a shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    expires_at: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl Deadline {
    /// A deadline that never expires and starts uncancelled.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// A deadline expiring `timeout` from now.
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    /// A deadline expiring at `instant`.
    #[must_use]
    pub fn at(instant: Instant) -> Self {
        Self {
            expires_at: Some(instant),
            cancelled: Arc::default(),
        }
    }

    /// Returns a handle that cancels this deadline and all of its clones.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    /// Time left before expiry, or `None` when unbounded.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Returns `true` once cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns `true` once the expiry instant has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }

    /// Fails when the invocation should stop.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::Cancelled`] after cancellation and
    /// [`DeadlineError::Exceeded`] after expiry. Cancellation wins when both
    /// apply.
    pub fn check(&self) -> Result<(), DeadlineError> {
        if self.is_cancelled() {
            return Err(DeadlineError::Cancelled);
        }
        if self.is_expired() {
            return Err(DeadlineError::Exceeded);
        }
        Ok(())
    }
}

/// Cancels the [`Deadline`] it was taken from.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Marks the deadline as cancelled.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}
