//! Bounded retry with server-specified backoff.
//!
//! A [`RetryPolicy`] pairs a predicate with a retry budget. The executor
//! invokes an operation, asks the predicate what to do with each failure,
//! sleeps for the decided delay, and re-invokes until the call succeeds,
//! the predicate declines, or the budget runs out.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::grpc::GrpcStatusCode;

/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: usize = 5;

const BACKOFF_BASE: Duration = Duration::from_millis(250);
const BACKOFF_CAP: Duration = Duration::from_secs(10);

/// What to do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// Do not retry; propagate the error.
    No,
    /// Retry after a computed exponential backoff.
    Backoff,
    /// Retry after exactly this server-mandated delay.
    After(Duration),
}

/// Decides whether a failed call is worth another attempt.
pub type RetryPredicate = Arc<dyn Fn(&ClientError) -> Retry + Send + Sync>;

/// A retry budget plus the predicate classifying failures.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    predicate: RetryPredicate,
}

impl RetryPolicy {
    /// A policy with the given retry budget and the default predicate.
    pub fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            predicate: Arc::new(default_predicate),
        }
    }

    /// Replace the predicate.
    pub fn with_predicate(
        mut self,
        predicate: impl Fn(&ClientError) -> Retry + Send + Sync + 'static,
    ) -> Self {
        self.predicate = Arc::new(predicate);
        self
    }

    /// The number of retries allowed after the initial attempt.
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Classify a failure.
    pub fn decide(&self, error: &ClientError) -> Retry {
        (self.predicate)(error)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

/// The default failure classification.
///
/// Retries with backoff on the transient status codes
/// (see [`GrpcStatusCode::is_retryable`]); honors a parsable
/// `retry-after` trailer on PERMISSION_DENIED; declines everything else,
/// including non-RPC errors.
pub fn default_predicate(error: &ClientError) -> Retry {
    let ClientError::Rpc(status) = error else {
        return Retry::No;
    };
    if status.code().is_retryable() {
        return Retry::Backoff;
    }
    if status.code() == GrpcStatusCode::PermissionDenied {
        if let Some(delay) = status.retry_after() {
            return Retry::After(delay);
        }
    }
    Retry::No
}

/// Exponential backoff for the nth retry (0-based), capped.
fn backoff_delay(retry: usize) -> Duration {
    let factor = 1u32 << retry.min(15) as u32;
    BACKOFF_BASE.saturating_mul(factor).min(BACKOFF_CAP)
}

/// Run an operation under a retry policy.
///
/// `None` short-circuits to a single direct invocation, propagating its
/// error unmodified. With a policy, retryable failures are retried up to
/// the budget; exhaustion yields [`ClientError::RetriesExhausted`] holding
/// every attempt's error in order, with the last one chained as the cause.
/// A failure the predicate declines propagates unmodified no matter which
/// attempt it occurs on.
pub async fn execute<T, F, Fut>(policy: Option<&RetryPolicy>, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let Some(policy) = policy else {
        return operation().await;
    };

    let mut attempts: Vec<ClientError> = Vec::new();
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                // The predicate is consulted on every failure, even the
                // last one: a non-retryable error always propagates
                // directly, never wrapped in the aggregate.
                let delay = match policy.decide(&error) {
                    Retry::No => {
                        debug!(error = %error, "not retrying");
                        return Err(error);
                    }
                    Retry::Backoff => backoff_delay(attempts.len()),
                    Retry::After(delay) => delay,
                };

                if attempts.len() >= policy.max_retries() {
                    debug!(
                        attempts = attempts.len() + 1,
                        error = %error,
                        "retry budget exhausted"
                    );
                    let source = Box::new(error.clone());
                    attempts.push(error);
                    return Err(ClientError::RetriesExhausted { attempts, source });
                }
                warn!(
                    attempt = attempts.len() + 1,
                    max_retries = policy.max_retries(),
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "call failed, retrying"
                );
                attempts.push(error);
                tokio::time::sleep(delay).await;
            }
        }
    }
}
