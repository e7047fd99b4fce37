//! Core types, codec and error normalization for tether
//!
//! This crate holds everything about tether that does not depend on a particular
//! transport:
//!
//! - **Types**: logical call types ([`RpcRequest`], [`RpcResponse`]) and the
//!   JSON-RPC 2.0 wire envelopes the HTTP and socket transports exchange
//! - **Codec**: encoding requests and classifying inbound frames
//! - **Errors**: the four-kind [`Error`] taxonomy every client operation returns
//! - **Mapper**: folding raw transport failures into [`RpcErrorData`]
//! - **Observability**: OpenTelemetry and `tracing` setup
//!
//! The `tether-client` crate builds the retry/timeout combinators, the HTTP,
//! WebSocket and provider transports, and the client facade on top of it.
//!
//! # Example
//!
//! ```rust
//! use tether_core::{codec, mapper, Id, RpcRequest};
//! use serde_json::json;
//!
//! let request = RpcRequest::new("eth_getBalance", vec![json!("0xf39f"), json!("latest")]);
//! let json = codec::encode_request(&request.to_wire(Id::Number(1))).unwrap();
//! assert!(json.contains("eth_getBalance"));
//!
//! let error = mapper::normalize(mapper::RawFailure::Http { status: 503, body: String::new() });
//! assert!(mapper::is_transient(error.code));
//! ```

pub mod codec;
pub mod error;
pub mod mapper;
pub mod observability;
pub mod types;

pub use error::{Error, Result, RpcErrorData};
pub use mapper::{ProviderError, RawFailure};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{
    Id, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RpcRequest,
    RpcResponse,
};
