//! The client facade
//!
//! [`RpcClient`] owns one transport router plus the default retry and timeout
//! policies. A call is composed as
//!
//! ```text
//! with_retry(|| with_timeout(|| router.request(request)))
//! ```
//!
//! so the timeout bounds each attempt, not the whole call, and a timed-out attempt
//! is retried like any other transient failure.
//!
//! # Cloning
//!
//! `RpcClient` is cheaply cloneable using `Arc` internally. All clones share the
//! same transport, so closing one closes them all.

use crate::metrics::ClientMetrics;
use crate::retry::{with_retry, RetryPolicy};
use crate::subscription::Subscription;
use crate::timeout::{with_timeout, TimeoutPolicy};
use crate::transport::{Transport, TransportKind, TransportRouter};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tether_core::{Error, Result, RpcRequest, RpcResponse};

/// Resilient JSON-RPC client
#[derive(Clone)]
pub struct RpcClient {
    pub(crate) router: Arc<TransportRouter>,
    pub(crate) retry: RetryPolicy,
    pub(crate) timeout: TimeoutPolicy,
    pub(crate) metrics: Option<Arc<ClientMetrics>>,
}

impl RpcClient {
    /// Wrap an already built router
    pub fn new(router: TransportRouter, retry: RetryPolicy, timeout: TimeoutPolicy) -> Self {
        Self {
            router: Arc::new(router),
            retry,
            timeout,
            metrics: None,
        }
    }

    /// Perform a call with the client's default policies
    pub async fn call(&self, request: &RpcRequest) -> Result<RpcResponse> {
        self.call_with(request, None, None).await
    }

    /// Perform a call, overriding the retry and/or timeout policy
    #[tracing::instrument(
        skip(self, request, retry, timeout),
        fields(method = %request.method, transport = %self.router.kind())
    )]
    pub async fn call_with(
        &self,
        request: &RpcRequest,
        retry: Option<&RetryPolicy>,
        timeout: Option<&TimeoutPolicy>,
    ) -> Result<RpcResponse> {
        let retry = retry.unwrap_or(&self.retry);
        let timeout = timeout.unwrap_or(&self.timeout);
        let router = &self.router;
        let metrics = self.metrics.as_deref();

        let start = Instant::now();
        let attempts = AtomicU32::new(0);

        let outcome = with_retry(
            || {
                let attempt = attempts.fetch_add(1, Ordering::Relaxed);
                if attempt > 0 {
                    if let Some(m) = metrics {
                        m.record_retry(&request.method);
                    }
                }
                async move {
                    let result = with_timeout(|| router.request(request), timeout).await;
                    if let (Err(Error::Timeout { .. }), Some(m)) = (&result, metrics) {
                        m.record_timeout(&request.method);
                    }
                    result
                }
            },
            retry,
        )
        .await;

        let duration = start.elapsed().as_secs_f64();
        let attempts = u64::from(attempts.load(Ordering::Relaxed));

        match outcome {
            Ok(result) => {
                if let Some(m) = metrics {
                    m.record_call(&request.method, "success", duration, attempts);
                }
                tracing::debug!(attempts, duration_secs = duration, "Call completed");
                Ok(RpcResponse::new(result))
            }
            Err(error) => {
                if let Some(m) = metrics {
                    m.record_call(&request.method, "error", duration, attempts);
                    m.record_error(&error);
                }
                tracing::debug!(attempts, error = %error, "Call failed");
                Err(error)
            }
        }
    }

    /// Call `method` and deserialize its result
    ///
    /// A result that does not deserialize into `R` is a parse error (-32700).
    pub async fn request<R>(&self, method: impl Into<String>, params: Vec<Value>) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let request = RpcRequest::new(method, params);
        self.call(&request).await?.into_typed()
    }

    /// Subscribe to pushed events
    ///
    /// Socket transports deliver notifications by method name (`eth_subscription`);
    /// provider transports deliver provider events (`accountsChanged`).
    pub async fn subscribe(&self, event: &str) -> Result<Subscription> {
        self.router.subscribe(event).await
    }

    /// Stop delivering events to `subscription`
    pub async fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.router.unsubscribe(subscription).await
    }

    /// Which transport variant this client uses
    pub fn transport_kind(&self) -> TransportKind {
        self.router.kind()
    }

    /// Polling interval for HTTP clients, `None` otherwise
    pub fn polling_interval(&self) -> Option<Duration> {
        self.router.polling_interval()
    }

    /// Default retry policy
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Default timeout policy
    pub fn timeout_policy(&self) -> &TimeoutPolicy {
        &self.timeout
    }

    /// The underlying router
    pub fn transport(&self) -> &TransportRouter {
        &self.router
    }

    /// Close the transport; socket clients refuse further calls
    pub async fn close(&self) -> Result<()> {
        tracing::info!(transport = %self.router.kind(), "Closing client");
        self.router.close().await
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("transport", &self.router.kind())
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
