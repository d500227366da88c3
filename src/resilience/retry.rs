//! Classified retry around core operations

use std::future::Future;
use std::time::{Duration, Instant};

use crate::config::RetrySettings;
use crate::error::{Classify, ErrorClass, NotifyError, NotifyResult};
use crate::metrics::RetryMetrics;

use super::backoff::{BackoffConfig, ExponentialBackoff};
use super::cancel::CancellationSignal;

/// Bounded retry policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1)
    pub max_attempts: u32,
    pub backoff: BackoffConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffConfig::default(),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, never retried
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            backoff: BackoffConfig::from(settings),
        }
    }
}

/// Runs operations under a retry policy.
///
/// Transient failures are retried with exponential backoff (a server-given
/// `retry_after` raises the delay, never lowers it) until `max_attempts`;
/// fatal failures are surfaced at once. Every invocation ends with exactly
/// one log record carrying the operation label.
#[derive(Debug, Clone, Default)]
pub struct ResilienceWrapper {
    policy: RetryPolicy,
}

impl ResilienceWrapper {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute<T, F, Fut>(&self, operation: &str, op: F) -> NotifyResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = NotifyResult<T>>,
    {
        self.execute_with(operation, None, NotifyError::classify, op)
            .await
    }

    pub async fn execute_cancellable<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationSignal,
        op: F,
    ) -> NotifyResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = NotifyResult<T>>,
    {
        self.execute_with(operation, Some(cancel), NotifyError::classify, op)
            .await
    }

    /// Full form: optional cancellation and a custom classifier
    pub async fn execute_with<T, F, Fut, C>(
        &self,
        operation: &str,
        cancel: Option<&CancellationSignal>,
        classify: C,
        mut op: F,
    ) -> NotifyResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = NotifyResult<T>>,
        C: Fn(&NotifyError) -> ErrorClass,
    {
        let started = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut backoff = ExponentialBackoff::with_config(self.policy.backoff.clone());
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            if cancel.is_some_and(CancellationSignal::is_cancelled) {
                return Err(cancelled(operation, attempt - 1, started));
            }

            let result = match cancel {
                Some(signal) => {
                    tokio::select! {
                        result = op() => result,
                        _ = signal.cancelled() => {
                            return Err(cancelled(operation, attempt, started));
                        }
                    }
                }
                None => op().await,
            };

            let err = match result {
                Ok(value) => {
                    tracing::info!(
                        operation,
                        attempts = attempt,
                        elapsed_ms = elapsed_ms(started),
                        "Operation succeeded"
                    );
                    return Ok(value);
                }
                Err(err) => err,
            };

            let retry_after = match classify(&err) {
                ErrorClass::Fatal => {
                    tracing::error!(
                        operation,
                        attempts = attempt,
                        code = err.code(),
                        error = %err,
                        elapsed_ms = elapsed_ms(started),
                        "Operation failed"
                    );
                    RetryMetrics::record_failure(operation, err.code());
                    return Err(err);
                }
                ErrorClass::Transient { retry_after } => retry_after,
            };

            if attempt >= max_attempts {
                let exhausted = NotifyError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    last: Box::new(err),
                };
                tracing::error!(
                    operation,
                    attempts = attempt,
                    code = exhausted.code(),
                    error = %exhausted,
                    elapsed_ms = elapsed_ms(started),
                    "Operation failed, retries exhausted"
                );
                RetryMetrics::record_failure(operation, exhausted.code());
                return Err(exhausted);
            }

            let delay = next_delay(&mut backoff, retry_after);
            tracing::warn!(
                operation,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient failure, retrying"
            );
            RetryMetrics::record_retry(operation);

            match cancel {
                Some(signal) => {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = signal.cancelled() => {
                            return Err(cancelled(operation, attempt, started));
                        }
                    }
                }
                None => tokio::time::sleep(delay).await,
            }
        }
    }
}

fn next_delay(backoff: &mut ExponentialBackoff, retry_after: Option<Duration>) -> Duration {
    let computed = backoff.next_delay();
    match retry_after {
        Some(hint) => hint.max(computed),
        None => computed,
    }
}

fn cancelled(operation: &str, attempts: u32, started: Instant) -> NotifyError {
    tracing::warn!(
        operation,
        attempts,
        elapsed_ms = elapsed_ms(started),
        "Operation cancelled"
    );
    NotifyError::Cancelled {
        operation: operation.to_string(),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
