//! Cooperative cancellation for in-flight queries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::{LoreResult, RetrievalError};

/// Deadline + cancellation flag checked at every suspension point
/// (embedding calls, store reads/writes, reranking).
///
/// A cancelled query fails with `RetrievalError::Cancelled`; it never
/// returns a partial result.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that never cancels.
    pub fn none() -> Self {
        Self::default()
    }

    /// A token that expires after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Request cancellation. Visible to all clones of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        matches!(self.deadline, Some(d) if Instant::now() >= d)
    }

    /// Bail out with `Cancelled` if the token has fired.
    pub fn check(&self) -> LoreResult<()> {
        if self.is_cancelled() {
            Err(RetrievalError::Cancelled.into())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_never_cancels() {
        let token = CancelToken::none();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn explicit_cancel_propagates_to_clones() {
        let token = CancelToken::with_timeout(Duration::from_secs(60));
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
        assert!(clone.check().is_err());
    }

    #[test]
    fn deadline_fires() {
        let token = CancelToken::with_timeout(Duration::from_millis(0));
        assert!(token.is_cancelled());
    }
}
