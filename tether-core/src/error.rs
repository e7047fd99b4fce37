//! Error types for tether
//!
//! Every failure that crosses the transport boundary is one of four kinds:
//!
//! - **Configuration**: an invalid policy or transport setting, detected when the
//!   client is built. Fatal and never retried.
//! - **Timeout**: the per-attempt deadline elapsed before the transport answered.
//! - **ConnectionClosed**: the persistent socket dropped while a call was in flight,
//!   or the transport was explicitly closed.
//! - **Rpc**: a normalized `{code, message, data}` error, produced either by the
//!   remote peer / injected provider or synthesized by the
//!   [`mapper`](crate::mapper) from a transport-level failure.
//!
//! Raw transport errors (reqwest, tungstenite, provider values) never appear here;
//! they are folded into [`RpcErrorData`] by [`mapper::normalize`](crate::mapper::normalize).
//!
//! # Error Codes
//!
//! JSON-RPC 2.0 reserves:
//! - `-32700`: Parse error (invalid JSON)
//! - `-32600`: Invalid request
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error
//! - `-32000 to -32099`: Server error (implementation-defined)
//!
//! Ethereum providers add EIP-1474 (`-32000..-32005`) and EIP-1193 (`4001`, `4100`,
//! `4200`, `4900`, `4901`) codes. Anything else a provider raises passes through
//! unchanged, so callers can branch on `code`.
//!
//! # Examples
//!
//! ```rust
//! use tether_core::{Error, RpcErrorData};
//!
//! let error = Error::Rpc(RpcErrorData::invalid_params("Token type ERC721 not supported."));
//! assert_eq!(error.code(), Some(-32602));
//! assert!(!error.is_retryable());
//!
//! let timeout = Error::Timeout { timeout_ms: 50 };
//! assert!(timeout.is_retryable());
//! ```

use crate::mapper;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for tether operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy surfaced by every tether transport and combinator
///
/// Retry and timeout combinators never wrap these values: a failure that
/// exhausts its retries reaches the caller exactly as the last attempt produced it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Normalized remote-procedure error
    ///
    /// Either received from the peer (JSON-RPC `error` object, provider error) or
    /// synthesized from an HTTP status or a network failure.
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcErrorData),

    /// The per-attempt deadline elapsed
    ///
    /// Carries the configured bound, not the measured elapsed time.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout {
        /// The deadline that elapsed, in milliseconds
        timeout_ms: u64,
    },

    /// The socket connection closed while the call was outstanding
    ///
    /// Also returned for calls issued after the transport was explicitly closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Invalid policy or transport configuration
    ///
    /// Raised at setup time (zero timeout, zero attempts, unparsable URL).
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// The numeric code of a normalized error, `None` for the other kinds
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::Rpc(data) => Some(data.code),
            _ => None,
        }
    }

    /// Whether the default retry predicate would retry this error
    ///
    /// Timeouts and dropped connections are retried; normalized errors only when
    /// their code is transient (see [`mapper::is_transient`]). Configuration
    /// errors never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Timeout { .. } | Error::ConnectionClosed => true,
            Error::Rpc(data) => mapper::is_transient(data.code),
            Error::Configuration(_) => false,
        }
    }
}

/// Normalized JSON-RPC error: `{ code, message, data? }`
///
/// This is the exact wire shape of a JSON-RPC 2.0 error object, and the shape
/// every transport failure is folded into.
///
/// # Examples
///
/// ```rust
/// use tether_core::RpcErrorData;
/// use serde_json::json;
///
/// let error = RpcErrorData::method_not_found("eth_foo");
/// assert_eq!(error.code, -32601);
///
/// let custom = RpcErrorData::with_data(-32005, "Limit exceeded", json!({"rate": {"backoff_seconds": 2}}));
/// assert!(custom.data.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorData {
    /// Numeric error code
    ///
    /// Negative codes from -32768 to -32000 are reserved by JSON-RPC 2.0;
    /// provider codes are passed through as received.
    pub code: i32,

    /// Human-readable error message
    pub message: String,

    /// Optional structured error details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcErrorData {
    /// Create a new error with code and message
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new error with additional data
    ///
    /// # Arguments
    ///
    /// * `code` - Numeric error code
    /// * `message` - Human-readable error description
    /// * `data` - Additional structured error information
    pub fn with_data(code: i32, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Create a parse error (-32700)
    ///
    /// Used when a reply frame or body cannot be decoded.
    pub fn parse_error(details: impl Into<String>) -> Self {
        Self::with_data(
            mapper::PARSE_ERROR,
            "Parse error",
            serde_json::json!({ "details": details.into() }),
        )
    }

    /// Create an invalid request error (-32600)
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(mapper::INVALID_REQUEST, msg)
    }

    /// Create a method not found error (-32601)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tether_core::RpcErrorData;
    ///
    /// let error = RpcErrorData::method_not_found("eth_foo");
    /// assert_eq!(error.message, "Method not found: eth_foo");
    /// ```
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(
            mapper::METHOD_NOT_FOUND,
            format!("Method not found: {}", method.into()),
        )
    }

    /// Create an invalid params error (-32602)
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(mapper::INVALID_PARAMS, msg)
    }

    /// Create an internal error (-32603)
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(mapper::INTERNAL_ERROR, msg)
    }

    /// Create the generic error used for non-conforming provider failures (-1)
    pub fn unknown() -> Self {
        Self::new(mapper::UNKNOWN_ERROR, mapper::UNKNOWN_ERROR_MESSAGE)
    }
}

impl std::fmt::Display for RpcErrorData {
    /// Formats as "[code] message", e.g. "[-32601] Method not found: eth_foo"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for RpcErrorData {}
