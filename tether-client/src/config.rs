//! Serializable client configuration
//!
//! A JSON document describing one client. Every field except the transport URL
//! has a default:
//!
//! ```json
//! {
//!   "transport": { "kind": "http", "url": "https://rpc.example.org", "polling_interval_ms": 4000 },
//!   "retry": { "max_attempts": 4, "base_delay_ms": 150, "jitter": false },
//!   "timeout_ms": 10000,
//!   "service_name": "tether"
//! }
//! ```
//!
//! Provider transports wrap a host object and cannot be described here; build
//! them with [`ClientBuilder::provider`](crate::ClientBuilder::provider).

use crate::retry::{RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
use crate::timeout::{TimeoutPolicy, DEFAULT_TIMEOUT};
use crate::transport::{
    HttpConfig, SocketConfig, TransportDescriptor, TransportKind, DEFAULT_POLLING_INTERVAL,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tether_core::{Error, Result};

/// Which endpoint to talk to, and over what
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportSettings {
    /// `http` or `socket`; `provider` is rejected when the client is built
    pub kind: TransportKind,
    /// Endpoint URL; the scheme must match `kind`
    pub url: String,
    /// Polling interval in milliseconds, only meaningful for `http`
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
}

/// Serialized form of a [`RetryPolicy`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts including the first; must be at least 1
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, doubled for each later one
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Add up to a quarter of each delay at random
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            jitter: false,
        }
    }
}

/// Complete client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Endpoint and transport kind
    pub transport: TransportSettings,
    /// Default retry policy
    #[serde(default)]
    pub retry: RetrySettings,
    /// Default per-attempt timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Service name used when observability is enabled
    #[serde(default)]
    pub service_name: Option<String>,
}

fn default_polling_interval_ms() -> u64 {
    DEFAULT_POLLING_INTERVAL.as_millis() as u64
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY.as_millis() as u64
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

impl ClientConfig {
    /// Configuration for `kind` at `url` with every other field defaulted
    pub fn new(kind: TransportKind, url: impl Into<String>) -> Self {
        Self {
            transport: TransportSettings {
                kind,
                url: url.into(),
                polling_interval_ms: default_polling_interval_ms(),
            },
            retry: RetrySettings::default(),
            timeout_ms: default_timeout_ms(),
            service_name: None,
        }
    }

    /// Parse a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("invalid client config: {}", e)))
    }

    /// The transport to build
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] for the `provider` kind.
    pub fn transport_descriptor(&self) -> Result<TransportDescriptor> {
        let url = self.transport.url.clone();
        match self.transport.kind {
            TransportKind::Http => Ok(TransportDescriptor::Http(HttpConfig {
                url,
                polling_interval: Duration::from_millis(self.transport.polling_interval_ms),
            })),
            TransportKind::Socket => Ok(TransportDescriptor::Socket(SocketConfig::new(url))),
            TransportKind::Provider => Err(Error::Configuration(
                "provider transports cannot be built from configuration".to_string(),
            )),
        }
    }

    /// The retry policy described by [`ClientConfig::retry`]
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] when `max_attempts` is zero.
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        Ok(RetryPolicy::new(self.retry.max_attempts)?
            .with_base_delay(Duration::from_millis(self.retry.base_delay_ms))
            .with_jitter(self.retry.jitter))
    }

    /// The timeout policy described by [`ClientConfig::timeout_ms`]
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] when `timeout_ms` is zero.
    pub fn timeout_policy(&self) -> Result<TimeoutPolicy> {
        TimeoutPolicy::from_millis(self.timeout_ms)
    }
}
