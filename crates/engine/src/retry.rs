//! Bounded caller-side retry for transient persistence failures.

use tracing::warn;

use storeroom_core::{DomainError, DomainResult};

/// Explicit retry policy for call sites.
///
/// Only `DomainError::Persistence` is retried — that class always means a
/// full rollback already happened, so re-running the operation cannot
/// duplicate state. Business-rule failures pass through on the first hit.
///
/// A retried consume must reuse its original `external_ref` to stay
/// idempotent; the policy re-runs the closure as-is, so that holds as long
/// as the closure captures the request rather than rebuilding it.
#[derive(Debug, Copy, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn run<T>(&self, mut op: impl FnMut() -> DomainResult<T>) -> DomainResult<T> {
        let mut attempt = 1;
        loop {
            match op() {
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(attempt, error = %e, "transient persistence failure, retrying");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
