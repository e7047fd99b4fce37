//! Per-attempt deadline for async operations
//!
//! [`with_timeout`] races an operation against a tokio timer. Whichever settles
//! first decides the outcome; the loser is dropped. Dropping the operation is all
//! the cancellation there is: the socket transport uses that drop to remove its
//! pending entry, the HTTP transport abandons the in-flight request.
//!
//! # Examples
//!
//! ```rust
//! use tether_client::{with_timeout, TimeoutPolicy};
//! use tether_core::Error;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let policy = TimeoutPolicy::from_millis(50).unwrap();
//!
//! let slow = with_timeout(
//!     || async {
//!         tokio::time::sleep(Duration::from_millis(500)).await;
//!         Ok(1)
//!     },
//!     &policy,
//! )
//! .await;
//!
//! assert_eq!(slow, Err(Error::Timeout { timeout_ms: 50 }));
//! # }
//! ```

use std::future::Future;
use std::time::Duration;
use tether_core::{Error, Result};

/// Default per-attempt deadline used by the client
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A deadline of at least one millisecond
///
/// [`Error::Timeout`] reports the bound in whole milliseconds, so finer bounds
/// are not representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    timeout: Duration,
}

impl TimeoutPolicy {
    /// Create a policy from a duration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a duration under one millisecond.
    pub fn new(timeout: Duration) -> Result<Self> {
        if timeout < Duration::from_millis(1) {
            return Err(Error::Configuration(format!(
                "timeout must be at least 1ms, got {:?}",
                timeout
            )));
        }
        Ok(Self { timeout })
    }

    /// Create a policy from a millisecond count
    pub fn from_millis(timeout_ms: u64) -> Result<Self> {
        Self::new(Duration::from_millis(timeout_ms))
    }

    /// The deadline
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The deadline in whole milliseconds, as reported in [`Error::Timeout`]
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Run `operation`, failing with [`Error::Timeout`] if it has not settled in time
///
/// The operation's own outcome, success or error, is returned untouched when it
/// wins the race.
pub async fn with_timeout<F, Fut, T>(operation: F, policy: &TimeoutPolicy) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(policy.timeout, operation()).await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::debug!(timeout_ms = policy.timeout_ms(), "Operation timed out");
            Err(Error::Timeout {
                timeout_ms: policy.timeout_ms(),
            })
        }
    }
}
