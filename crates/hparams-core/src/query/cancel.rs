//! Coarse cancellation checked between pipeline stages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::query::error::{QueryError, QueryResult};

/// Clonable cancellation handle with an optional deadline.
///
/// Clones share the cancelled flag, so a caller can keep one clone and hand
/// another to a running query.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail if cancelled or past the deadline; `stage` names the stage about
    /// to run.
    pub fn check(&self, stage: &str) -> QueryResult<()> {
        if self.is_cancelled() {
            return Err(QueryError::Cancelled {
                stage: stage.to_string(),
            });
        }
        if matches!(self.deadline, Some(deadline) if Instant::now() >= deadline) {
            return Err(QueryError::DeadlineExceeded {
                stage: stage.to_string(),
            });
        }
        Ok(())
    }
}
