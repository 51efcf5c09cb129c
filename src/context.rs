//! Operation Context
//!
//! Carries a cancellation signal and an optional deadline into every cache call.

use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::error::{CacheError, Result};

// == Context ==
/// Cancellation and deadline signal checked once at the start of each operation.
///
/// An operation that passes its initial check runs to completion; the context
/// is never re-checked mid-flight.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Attaches a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Attaches an absolute deadline, keeping the earlier one if already set.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    // == Check ==
    /// Returns `Cancelled` or `DeadlineExceeded` if the context is already done.
    pub fn check(&self) -> Result<()> {
        if self.token.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(CacheError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(CacheError::DeadlineExceeded);
        }
        Ok(())
    }
}
