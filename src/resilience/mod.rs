//! Resilience for calls against the unreliable transport.
//!
//! - `ExponentialBackoff`: delays between attempts, with jitter
//! - `ResilienceWrapper`: classified, bounded retry with one log record per call
//! - `CancellationSource` / `CancellationSignal`: caller-driven abort, never retried

mod backoff;
mod cancel;
mod retry;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use cancel::{CancellationSignal, CancellationSource};
pub use retry::{ResilienceWrapper, RetryPolicy};
