//! Tether - resilient JSON-RPC for blockchain clients
//!
//! This is the main convenience crate that re-exports the tether sub-crates.
//!
//! # Architecture
//!
//! - **tether-core**: call and wire types, codec, error taxonomy, error mapper,
//!   observability setup
//! - **tether-client**: retry and timeout combinators, HTTP/WebSocket/provider
//!   transports, the client facade
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tether::{ClientBuilder, RetryPolicy, TimeoutPolicy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::http("https://rpc.example.org")
//!         .retry_policy(RetryPolicy::new(5)?.with_jitter(true))
//!         .timeout_policy(TimeoutPolicy::from_millis(2_000)?)
//!         .build()
//!         .await?;
//!
//!     let chain_id: String = client.request("eth_chainId", vec![]).await?;
//!     println!("chain {}", chain_id);
//!     Ok(())
//! }
//! ```

pub use tether_client as client;
pub use tether_core as core;

pub use tether_client::{ClientBuilder, RetryPolicy, RpcClient, TimeoutPolicy};
pub use tether_core::{Error, Result, RpcErrorData, RpcRequest, RpcResponse};
