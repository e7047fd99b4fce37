//! Client builder
//!
//! The `ClientBuilder` picks the transport and sets the default policies before
//! the client exists. It allows you to:
//! - Choose HTTP, WebSocket or an injected provider
//! - Override the retry and timeout defaults
//! - Configure observability (OpenTelemetry)
//!
//! # Examples
//!
//! ```rust,no_run
//! use tether_client::{ClientBuilder, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> tether_core::Result<()> {
//! let client = ClientBuilder::http("https://rpc.example.org")
//!     .retry_policy(RetryPolicy::new(3)?.with_jitter(true))
//!     .build()
//!     .await?;
//!
//! let socket = ClientBuilder::socket("wss://rpc.example.org/ws")
//!     .with_default_observability()
//!     .service_name("indexer")
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::ClientConfig;
use crate::metrics::ClientMetrics;
use crate::retry::RetryPolicy;
use crate::timeout::TimeoutPolicy;
use crate::transport::{
    Eip1193Provider, HttpConfig, SocketConfig, TransportDescriptor, TransportRouter,
};
use crate::RpcClient;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{Error, ObservabilityConfig, Result};

/// Builder for configuring and creating an [`RpcClient`]
pub struct ClientBuilder {
    descriptor: TransportDescriptor,
    retry: RetryPolicy,
    timeout: TimeoutPolicy,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ClientBuilder {
    fn new(descriptor: TransportDescriptor) -> Self {
        Self {
            descriptor,
            retry: RetryPolicy::default(),
            timeout: TimeoutPolicy::default(),
            observability_config: None,
            service_name: None,
        }
    }

    /// Client over HTTP POST
    pub fn http(url: impl Into<String>) -> Self {
        Self::new(TransportDescriptor::Http(HttpConfig::new(url)))
    }

    /// Client over one persistent WebSocket
    pub fn socket(url: impl Into<String>) -> Self {
        Self::new(TransportDescriptor::Socket(SocketConfig::new(url)))
    }

    /// Client forwarding to an injected provider
    pub fn provider(provider: Arc<dyn Eip1193Provider>) -> Self {
        Self::new(TransportDescriptor::Provider(provider))
    }

    /// Builder preloaded from a [`ClientConfig`]
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let mut builder = Self::new(config.transport_descriptor()?)
            .retry_policy(config.retry_policy()?)
            .timeout_policy(config.timeout_policy()?);
        builder.service_name = config.service_name;
        Ok(builder)
    }

    /// Set the polling interval of an HTTP client; ignored for other transports
    pub fn polling_interval(mut self, interval: Duration) -> Self {
        if let TransportDescriptor::Http(ref mut config) = self.descriptor {
            config.polling_interval = interval;
        }
        self
    }

    /// Default retry policy for every call
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Default per-attempt timeout for every call
    pub fn timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout = policy;
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Set service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Build the client; socket clients connect here, bounded by the timeout policy
    pub async fn build(self) -> Result<RpcClient> {
        // Initialize observability if configured
        let metrics = if let Some(mut config) = self.observability_config {
            if let Some(name) = self.service_name {
                config.service_name = name;
            }

            tether_core::init_observability(config.clone()).map_err(|e| {
                Error::Configuration(format!("failed to initialize observability: {}", e))
            })?;

            Some(Arc::new(ClientMetrics::new(config.service_name)))
        } else {
            None
        };

        let mut descriptor = self.descriptor;
        if let TransportDescriptor::Socket(ref mut config) = descriptor {
            config.connect_timeout = self.timeout.timeout();
        }

        let router = TransportRouter::connect(descriptor, metrics.clone()).await?;

        let mut client = RpcClient::new(router, self.retry, self.timeout);
        client.metrics = metrics;
        Ok(client)
    }
}
