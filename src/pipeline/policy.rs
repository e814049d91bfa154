//! Fault-tolerance policies evaluated by the coordinator.

use log::warn;
use std::time::Duration;

use crate::error::{IndexError, Result};
use crate::types::RunOpts;

/// Retry transient listing faults (including a discovery pass that hit one) a bounded
/// number of times. `limit` counts total attempts: 3 means the first try plus two retries.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub limit: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(limit: u32, backoff: Duration) -> Self {
        Self { limit, backoff }
    }

    /// `attempt` is the number of attempts already made (1 after the first failure).
    pub fn should_retry(&self, err: &IndexError, attempt: u32) -> bool {
        err.is_transient_listing() && attempt < self.limit
    }

    /// Linear backoff before the next attempt.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl From<&RunOpts> for RetryPolicy {
    fn from(opts: &RunOpts) -> Self {
        Self::new(opts.retry_limit, opts.retry_backoff)
    }
}

/// Tolerate entry-scoped errors (a transform that aborted, a record the store rejected)
/// up to `limit`; anything else is fatal.
#[derive(Debug)]
pub struct SkipPolicy {
    limit: usize,
    skipped: usize,
}

impl SkipPolicy {
    pub fn new(limit: usize) -> Self {
        Self { limit, skipped: 0 }
    }

    pub fn should_skip(&self, err: &IndexError) -> bool {
        err.is_entry_scoped()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Count a skippable error, or hand back the error that ends the run.
    pub fn record(&mut self, err: IndexError) -> Result<()> {
        if !self.should_skip(&err) {
            return Err(err);
        }
        self.skipped += 1;
        if self.skipped > self.limit {
            return Err(IndexError::SkipLimitExceeded {
                limit: self.limit,
                source: Box::new(err),
            });
        }
        warn!("Skipped ({}/{}): {}", self.skipped, self.limit, err);
        Ok(())
    }
}
