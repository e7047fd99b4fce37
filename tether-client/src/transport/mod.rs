//! Transports and the router that dispatches to them
//!
//! A transport takes one [`RpcRequest`] and produces the raw result value or one
//! of the [`Error`] kinds. Three variants exist:
//!
//! - [`HttpTransport`]: one POST per call, no persistent resource
//! - [`SocketTransport`]: one persistent WebSocket shared by all calls, replies
//!   correlated by id
//! - [`ProviderTransport`]: forwards to an injected [`Eip1193Provider`]
//!
//! [`TransportRouter`] is the closed set of these variants. It is built once from
//! a [`TransportDescriptor`] and keeps its variant for its whole lifetime.

mod http;
mod provider;
mod socket;

pub use http::HttpTransport;
pub use provider::{Eip1193Provider, ProviderTransport, ACCOUNTS_CHANGED, ADMIN_METHODS};
pub use socket::SocketTransport;

use crate::metrics::ClientMetrics;
use crate::subscription::Subscription;
use crate::timeout::DEFAULT_TIMEOUT;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{Error, Result, RpcRequest};

/// Default interval between polls for callers that poll an HTTP endpoint
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(4);

/// The variant a transport belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Request/response over HTTP POST
    Http,
    /// Persistent WebSocket connection
    Socket,
    /// Injected host provider
    Provider,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::Http => "http",
            TransportKind::Socket => "socket",
            TransportKind::Provider => "provider",
        };
        f.write_str(name)
    }
}

/// A single remote-procedure channel
#[async_trait]
pub trait Transport: Send + Sync {
    /// Which variant this is
    fn kind(&self) -> TransportKind;

    /// Perform one call, returning the raw result value
    async fn request(&self, request: &RpcRequest) -> Result<Value>;

    /// Release held resources; later calls fail with [`Error::ConnectionClosed`]
    /// on transports that hold a connection
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// HTTP endpoint settings
#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    /// Endpoint URL (`http://` or `https://`)
    pub url: String,
    /// Interval exposed to callers that poll; the transport itself never polls
    pub polling_interval: Duration,
}

impl HttpConfig {
    /// HTTP settings with the default polling interval
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            polling_interval: DEFAULT_POLLING_INTERVAL,
        }
    }
}

/// WebSocket endpoint settings
#[derive(Debug, Clone, PartialEq)]
pub struct SocketConfig {
    /// Endpoint URL (`ws://` or `wss://`)
    pub url: String,
    /// Bound on opening one connection, TCP connect and handshake together
    pub connect_timeout: Duration,
}

impl SocketConfig {
    /// Socket settings for `url` with the default connect timeout
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Which transport to build, and how
#[derive(Clone)]
pub enum TransportDescriptor {
    /// HTTP POST per call
    Http(HttpConfig),
    /// One persistent WebSocket
    Socket(SocketConfig),
    /// An injected provider
    Provider(Arc<dyn Eip1193Provider>),
}

impl TransportDescriptor {
    /// The variant this descriptor builds
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportDescriptor::Http(_) => TransportKind::Http,
            TransportDescriptor::Socket(_) => TransportKind::Socket,
            TransportDescriptor::Provider(_) => TransportKind::Provider,
        }
    }
}

impl fmt::Debug for TransportDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportDescriptor::Http(config) => f.debug_tuple("Http").field(config).finish(),
            TransportDescriptor::Socket(config) => f.debug_tuple("Socket").field(config).finish(),
            TransportDescriptor::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

/// Parse and scheme-check an endpoint URL
pub(crate) fn parse_url(raw: &str, schemes: &[&str]) -> Result<url::Url> {
    let url = url::Url::parse(raw)
        .map_err(|e| Error::Configuration(format!("invalid URL {:?}: {}", raw, e)))?;

    if !schemes.contains(&url.scheme()) {
        return Err(Error::Configuration(format!(
            "unsupported URL scheme {:?} for {:?}, expected one of {:?}",
            url.scheme(),
            raw,
            schemes
        )));
    }
    Ok(url)
}

/// Dispatches calls to the one transport variant chosen at build time
pub enum TransportRouter {
    /// HTTP variant
    Http(HttpTransport),
    /// WebSocket variant
    Socket(SocketTransport),
    /// Injected provider variant
    Provider(ProviderTransport),
}

impl TransportRouter {
    /// Build the transport described by `descriptor`
    ///
    /// The socket variant connects here; HTTP and provider only validate.
    pub async fn connect(
        descriptor: TransportDescriptor,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Result<Self> {
        let router = match descriptor {
            TransportDescriptor::Http(config) => {
                TransportRouter::Http(HttpTransport::new(config)?)
            }
            TransportDescriptor::Socket(config) => {
                TransportRouter::Socket(SocketTransport::connect(config, metrics).await?)
            }
            TransportDescriptor::Provider(provider) => {
                TransportRouter::Provider(ProviderTransport::new(provider))
            }
        };

        tracing::debug!(transport = %router.kind(), "Transport ready");
        Ok(router)
    }

    fn inner(&self) -> &dyn Transport {
        match self {
            TransportRouter::Http(t) => t,
            TransportRouter::Socket(t) => t,
            TransportRouter::Provider(t) => t,
        }
    }

    /// Polling interval of the HTTP variant, `None` for the others
    pub fn polling_interval(&self) -> Option<Duration> {
        match self {
            TransportRouter::Http(t) => Some(t.polling_interval()),
            _ => None,
        }
    }

    /// Subscribe to pushed events
    ///
    /// For the socket variant `event` is a notification method name (e.g.
    /// `eth_subscription`); for the provider variant it is a provider event name
    /// (e.g. `accountsChanged`).
    ///
    /// # Errors
    ///
    /// The HTTP variant cannot push and returns [`Error::Configuration`].
    pub async fn subscribe(&self, event: &str) -> Result<Subscription> {
        match self {
            TransportRouter::Socket(t) => Ok(t.subscribe(event)),
            TransportRouter::Provider(t) => t.subscribe(event).await,
            TransportRouter::Http(_) => Err(Error::Configuration(
                "the http transport does not deliver pushed events".to_string(),
            )),
        }
    }

    /// Stop delivering events to a subscription; `true` if it was registered
    pub async fn unsubscribe(&self, subscription: &Subscription) -> bool {
        match self {
            TransportRouter::Socket(t) => t.unsubscribe(subscription),
            TransportRouter::Provider(t) => t.unsubscribe(subscription).await,
            TransportRouter::Http(_) => false,
        }
    }
}

#[async_trait]
impl Transport for TransportRouter {
    fn kind(&self) -> TransportKind {
        self.inner().kind()
    }

    async fn request(&self, request: &RpcRequest) -> Result<Value> {
        self.inner().request(request).await
    }

    async fn close(&self) -> Result<()> {
        self.inner().close().await
    }
}
