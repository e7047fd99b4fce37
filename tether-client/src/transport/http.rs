//! JSON-RPC over HTTP POST
//!
//! Each call is one POST with a fresh numeric id. The reply is read as text and
//! classified:
//!
//! - send or read failure → [`RawFailure::Network`]
//! - non-2xx status → [`RawFailure::Http`] (the body may still carry a JSON-RPC error)
//! - 2xx with an `error` object → that error
//! - 2xx with a `result` → the result, `null` included
//! - 2xx that does not decode → parse error

use super::{parse_url, HttpConfig, Transport, TransportKind};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tether_core::{codec, Error, Id, RawFailure, Result, RpcRequest};
use url::Url;

/// Request/response transport over HTTP
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: Url,
    polling_interval: Duration,
    next_id: AtomicU64,
}

impl HttpTransport {
    /// Validate the endpoint and prepare an HTTP client
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the URL is not a valid `http`/`https` URL.
    pub fn new(config: HttpConfig) -> Result<Self> {
        let url = parse_url(&config.url, &["http", "https"])?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url,
            polling_interval: config.polling_interval,
            next_id: AtomicU64::new(1),
        })
    }

    /// The endpoint this transport posts to
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Interval for callers that poll this endpoint
    pub fn polling_interval(&self) -> Duration {
        self.polling_interval
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    async fn request(&self, request: &RpcRequest) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let wire = request.to_wire(Id::from(id));

        let response = self
            .client
            .post(self.url.clone())
            .json(&wire)
            .send()
            .await
            .map_err(|e| Error::from(RawFailure::Network(e.to_string())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::from(RawFailure::Network(e.to_string())))?;

        if !status.is_success() {
            tracing::debug!(
                method = %request.method,
                status = status.as_u16(),
                "HTTP request failed"
            );
            return Err(RawFailure::Http {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let reply = codec::decode_response(&body)?;
        if reply.id != Id::from(id) {
            tracing::warn!(sent = id, received = %reply.id, "Reply id does not match request id");
        }
        reply.into_result()
    }
}
