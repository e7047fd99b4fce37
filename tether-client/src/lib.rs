//! Resilient JSON-RPC client for blockchain nodes
//!
//! This crate turns a single remote call into a call that retries with
//! exponential backoff, gives up on slow attempts, and reports every failure in
//! one normalized error shape, whatever transport carried it.
//!
//! # Core Features
//!
//! - **Retry**: bounded attempts with `base * 2^k` backoff and optional jitter
//! - **Timeout**: a per-attempt deadline that surfaces as [`Error::Timeout`](tether_core::Error::Timeout)
//! - **HTTP Transport**: one POST per call
//! - **WebSocket Transport**: one shared connection, replies correlated by id,
//!   reconnect on demand after a drop
//! - **Provider Transport**: forwarding to an injected EIP-1193 provider
//! - **Subscriptions**: channel-backed delivery of pushed notifications
//! - **Observability**: OpenTelemetry traces and metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tether_client::ClientBuilder;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::http("https://rpc.example.org").build().await?;
//!
//!     let block: String = client.request("eth_blockNumber", vec![]).await?;
//!     let balance: String = client
//!         .request("eth_getBalance", vec![json!("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"), json!("latest")])
//!         .await?;
//!     println!("{} {}", block, balance);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Notifications
//!
//! ```rust,no_run
//! use tether_client::ClientBuilder;
//! use serde_json::json;
//!
//! # async fn example() -> tether_core::Result<()> {
//! let client = ClientBuilder::socket("wss://rpc.example.org/ws").build().await?;
//! let mut heads = client.subscribe("eth_subscription").await?;
//! let _id: String = client.request("eth_subscribe", vec![json!("newHeads")]).await?;
//!
//! while let Some(event) = heads.recv().await {
//!     println!("{}", event["result"]["number"]);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod client_builder;
mod config;
mod connection_state;
mod metrics;
mod retry;
mod subscription;
mod timeout;
pub mod transport;

pub use client::RpcClient;
pub use client_builder::ClientBuilder;
pub use config::{ClientConfig, RetrySettings, TransportSettings};
pub use connection_state::ConnectionState;
pub use metrics::{error_label, ClientMetrics};
pub use retry::{
    is_retryable, with_retry, RetryPolicy, ShouldRetryFn, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS,
};
pub use subscription::{ListenerHandle, ListenerId, Subscription, SubscriptionRegistry};
pub use timeout::{with_timeout, TimeoutPolicy, DEFAULT_TIMEOUT};
pub use transport::{
    Eip1193Provider, HttpConfig, HttpTransport, ProviderTransport, SocketConfig, SocketTransport,
    Transport, TransportDescriptor, TransportKind, TransportRouter, ACCOUNTS_CHANGED,
    ADMIN_METHODS, DEFAULT_POLLING_INTERVAL,
};
