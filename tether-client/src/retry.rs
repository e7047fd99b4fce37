//! Retry with exponential backoff
//!
//! [`with_retry`] re-runs a fallible async operation according to a
//! [`RetryPolicy`]. Attempts are strictly sequential: attempt `k + 1` only starts
//! after attempt `k` has failed and the backoff sleep has elapsed.
//!
//! # Backoff
//!
//! The delay before attempt `k + 1` is `base_delay * 2^k`. With jitter enabled a
//! random extra of up to 25% of that delay is added, so clients that failed
//! together do not retry together.
//!
//! ```text
//! base = 150ms:  attempt 0 ─150ms─ attempt 1 ─300ms─ attempt 2 ─600ms─ attempt 3
//! ```
//!
//! # What Gets Retried
//!
//! The policy's predicate decides, given the error and the 0-based index of the
//! attempt that produced it. The default, [`is_retryable`], retries timeouts,
//! dropped connections and normalized errors with a transient code. A custom
//! predicate can be supplied with [`RetryPolicy::with_should_retry`].
//!
//! # Examples
//!
//! ```rust
//! use tether_client::{with_retry, RetryPolicy};
//! use tether_core::Error;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let policy = RetryPolicy::new(3)
//!     .unwrap()
//!     .with_base_delay(Duration::from_millis(10))
//!     .with_should_retry(|_, _| true);
//!
//! let calls = AtomicU32::new(0);
//! let value = with_retry(
//!     || async {
//!         match calls.fetch_add(1, Ordering::SeqCst) {
//!             0 | 1 => Err(Error::ConnectionClosed),
//!             _ => Ok(42),
//!         }
//!     },
//!     &policy,
//! )
//! .await;
//!
//! assert_eq!(value, Ok(42));
//! assert_eq!(calls.load(Ordering::SeqCst), 3);
//! # }
//! ```

use rand::Rng;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{Error, Result};

/// Default number of attempts: one initial call plus three retries
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Default delay before the first retry
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(150);

/// Retry predicate: `(error, attempt_index) -> retry?`
pub type ShouldRetryFn = Arc<dyn Fn(&Error, u32) -> bool + Send + Sync>;

/// How many times to try, how long to wait in between, and what to retry
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    jitter: bool,
    should_retry: ShouldRetryFn,
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget and default backoff
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `max_attempts` is zero.
    pub fn new(max_attempts: u32) -> Result<Self> {
        if max_attempts == 0 {
            return Err(Error::Configuration(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            max_attempts,
            ..Self::default()
        })
    }

    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set the delay before the first retry
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Enable or disable the random 0-25% extra delay
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replace the retry predicate
    pub fn with_should_retry<F>(mut self, should_retry: F) -> Self
    where
        F: Fn(&Error, u32) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(should_retry);
        self
    }

    /// Total number of attempts, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the first retry
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Whether jitter is enabled
    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Whether the predicate allows retrying `error` raised by attempt `attempt`
    pub fn should_retry(&self, error: &Error, attempt: u32) -> bool {
        (self.should_retry)(error, attempt)
    }

    /// Backoff before the attempt following `attempt`, without jitter
    ///
    /// Saturates instead of overflowing for large attempt indices.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match 1u32.checked_shl(attempt) {
            Some(factor) => self.base_delay.checked_mul(factor).unwrap_or(Duration::MAX),
            None if self.base_delay.is_zero() => Duration::ZERO,
            None => Duration::MAX,
        }
    }

    fn sleep_duration(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        if !self.jitter {
            return delay;
        }

        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        let jitter_ms = rand::thread_rng().gen_range(0..=(delay_ms / 4));
        delay.saturating_add(Duration::from_millis(jitter_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            jitter: false,
            should_retry: Arc::new(|error, _| is_retryable(error)),
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}

/// Default retry predicate
///
/// Retries [`Error::Timeout`], [`Error::ConnectionClosed`] and normalized errors
/// whose code is transient. Never retries configuration errors, malformed
/// requests, user rejections or unknown codes.
pub fn is_retryable(error: &Error) -> bool {
    error.is_retryable()
}

/// Run `operation` until it succeeds, the predicate declines, or attempts run out
///
/// The returned error is exactly the one produced by the last attempt.
pub async fn with_retry<F, Fut, T>(mut operation: F, policy: &RetryPolicy) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let last_attempt = attempt + 1 >= policy.max_attempts;
        if last_attempt || !policy.should_retry(&error, attempt) {
            if attempt > 0 {
                tracing::debug!(attempts = attempt + 1, error = %error, "Giving up after retries");
            }
            return Err(error);
        }

        let delay = policy.sleep_duration(attempt);
        tracing::warn!(
            attempt = attempt + 1,
            max_attempts = policy.max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "Attempt failed, retrying"
        );

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
