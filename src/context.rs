//! `OpContext`: the cancellation/deadline token threaded through every
//! externally observable operation. Cancellation propagates to any
//! downstream capability call.
//!
//! Built the way `tokio`-based services commonly express this: a cheaply
//! `Clone`-able handle wrapping a shared flag and an optional deadline
//! instant.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::CoreError;

#[derive(Clone)]
pub struct OpContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl OpContext {
    pub fn new() -> Self {
        OpContext {
            deadline: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        OpContext {
            deadline: Some(deadline),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.map(|d| Instant::now() >= d).unwrap_or(false)
    }

    /// Call at the start of every capability dispatch; short-circuits the
    /// operation before any downstream call is made.
    pub fn check(&self) -> Result<(), CoreError> {
        if self.is_cancelled() {
            return Err(CoreError::Internal("operation cancelled".into()));
        }
        if self.is_expired() {
            return Err(CoreError::Internal("operation deadline exceeded".into()));
        }
        Ok(())
    }
}

impl Default for OpContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fresh_context_passes_check() {
        let ctx = OpContext::new();
        assert!(ctx.check().is_ok());
    }

    #[test]
    fn cancelled_context_fails_check() {
        let ctx = OpContext::new();
        ctx.cancel();
        assert!(ctx.check().is_err());
    }

    #[test]
    fn expired_deadline_fails_check() {
        let ctx = OpContext::with_deadline(Instant::now() - Duration::from_secs(1));
        assert!(ctx.check().is_err());
    }
}
