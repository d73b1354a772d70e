//! Cooperative cancellation for long scans.
//!
//! The filter, conflict scan, statistics pass and free-time probe loop call
//! [`Cancellation::check`] between iterations. A clone shares the same flag,
//! so another thread can stop a running operation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::AgendaError;

#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// A token that never fires unless [`cancel`](Self::cancel) is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire once `deadline` has passed.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// Fire `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fail with [`AgendaError::Cancelled`] naming `operation` if fired.
    pub fn check(&self, operation: &str) -> Result<(), AgendaError> {
        if self.is_cancelled() {
            return Err(AgendaError::Cancelled(format!(
                "{operation} stopped before completion"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_token_passes() {
        assert!(Cancellation::new().check("scan").is_ok());
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = Cancellation::new();
        let other = token.clone();
        other.cancel();
        let err = token.check("detect_conflicts").unwrap_err();
        assert!(matches!(err, AgendaError::Cancelled(_)));
        assert!(err.to_string().contains("detect_conflicts"), "got: {err}");
    }

    #[test]
    fn test_past_deadline_fires() {
        let token = Cancellation::with_deadline(Instant::now());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_future_deadline_does_not_fire() {
        let token = Cancellation::with_timeout(Duration::from_secs(3600));
        assert!(!token.is_cancelled());
    }
}
