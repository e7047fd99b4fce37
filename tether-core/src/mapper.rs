//! Normalization of transport failures into [`RpcErrorData`]
//!
//! Each transport fails in its own vocabulary: an HTTP status with a body, a
//! refused TCP connection, a broken WebSocket, an arbitrary value thrown by an
//! injected provider. [`normalize`] folds all of them into one `{code, message,
//! data}` shape so callers and the retry predicate can branch on `code` alone.
//!
//! # Rules
//!
//! | Raw failure | Code |
//! |---|---|
//! | HTTP body containing a JSON-RPC error | the error's own code |
//! | HTTP 429 | `-32005` limit exceeded |
//! | HTTP 401 / 403 | `4100` unauthorized |
//! | HTTP 408 / 5xx | `-32002` resource unavailable |
//! | other HTTP status | `-32600` invalid request |
//! | network / socket failure | `-32768` transport error |
//! | undecodable reply | `-32700` parse error |
//! | provider error with integer `code` | passed through |
//! | anything else from a provider | `-1` unknown error |
//!
//! `-32768` is the floor of the range JSON-RPC reserves for itself and is never
//! assigned to a server error, so it cannot collide with a code a peer sends.
//!
//! # Examples
//!
//! ```rust
//! use tether_core::mapper::{self, RawFailure};
//!
//! let error = mapper::normalize(RawFailure::Http { status: 429, body: "slow down".into() });
//! assert_eq!(error.code, mapper::LIMIT_EXCEEDED);
//! assert!(mapper::is_transient(error.code));
//!
//! // Already-normalized errors come back unchanged
//! let again = mapper::normalize(RawFailure::Normalized(error.clone()));
//! assert_eq!(again, error);
//! ```

use crate::error::{Error, RpcErrorData};
use serde_json::{json, Value};

/// Invalid JSON was received
pub const PARSE_ERROR: i32 = -32700;
/// The JSON sent is not a valid request object
pub const INVALID_REQUEST: i32 = -32600;
/// The method does not exist or is not available
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Invalid method parameters
pub const INVALID_PARAMS: i32 = -32602;
/// Internal JSON-RPC error
pub const INTERNAL_ERROR: i32 = -32603;
/// Method not supported by this node
pub const METHOD_NOT_SUPPORTED_RPC: i32 = -32604;

/// Missing or invalid parameters; nodes also use it for "header not found"
pub const INVALID_INPUT: i32 = -32000;
/// Requested resource not found
pub const RESOURCE_NOT_FOUND: i32 = -32001;
/// Requested resource not available
pub const RESOURCE_UNAVAILABLE: i32 = -32002;
/// Transaction creation failed
pub const TRANSACTION_REJECTED: i32 = -32003;
/// Method is not implemented
pub const METHOD_NOT_SUPPORTED: i32 = -32004;
/// Request exceeds defined limit
pub const LIMIT_EXCEEDED: i32 = -32005;
/// Version of JSON-RPC protocol is not supported
pub const JSON_RPC_VERSION_NOT_SUPPORTED: i32 = -32006;

/// The user rejected the request
pub const USER_REJECTED_REQUEST: i32 = 4001;
/// The requested method and/or account has not been authorized
pub const UNAUTHORIZED: i32 = 4100;
/// The provider does not support the requested method
pub const UNSUPPORTED_METHOD: i32 = 4200;
/// The provider is disconnected from all chains
pub const DISCONNECTED: i32 = 4900;
/// The provider is not connected to the requested chain
pub const CHAIN_DISCONNECTED: i32 = 4901;
/// The requested chain has not been added to the wallet
pub const SWITCH_CHAIN_ERROR: i32 = 4902;

/// Connection-level failure synthesized by the client itself
pub const TRANSPORT_ERROR: i32 = -32768;
/// Non-conforming failure raised by an injected provider
pub const UNKNOWN_ERROR: i32 = -1;
/// Message used for [`UNKNOWN_ERROR`] and for provider errors without a message
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown RPC error occurred.";

/// A value raised by an injected provider
///
/// Providers are free to fail with anything: a conforming `{code, message}`
/// object, an object wrapping one under `error`, a bare string, or `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderError(pub Value);

impl ProviderError {
    /// A conforming `{code, message}` provider error
    pub fn rpc(code: i32, message: impl Into<String>) -> Self {
        Self(json!({ "code": code, "message": message.into() }))
    }

    /// Wrap an arbitrary raised value
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }
}

/// A transport-specific failure awaiting normalization
#[derive(Debug, Clone, PartialEq)]
pub enum RawFailure {
    /// Non-success HTTP status with the response body as text
    Http {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },
    /// The endpoint could not be reached or the connection failed mid-request
    Network(String),
    /// WebSocket protocol or write failure
    Socket(String),
    /// A reply arrived but could not be decoded
    Malformed(String),
    /// An injected provider failed
    Provider(ProviderError),
    /// Already normalized
    Normalized(RpcErrorData),
}

impl From<RpcErrorData> for RawFailure {
    fn from(error: RpcErrorData) -> Self {
        RawFailure::Normalized(error)
    }
}

impl From<ProviderError> for RawFailure {
    fn from(error: ProviderError) -> Self {
        RawFailure::Provider(error)
    }
}

impl From<RawFailure> for Error {
    fn from(raw: RawFailure) -> Self {
        Error::Rpc(normalize(raw))
    }
}

/// Fold a raw failure into a well-formed normalized error
///
/// Total: every input produces an error with a code and a non-empty message.
pub fn normalize(raw: RawFailure) -> RpcErrorData {
    match raw {
        RawFailure::Http { status, body } => normalize_http(status, body),
        RawFailure::Network(details) | RawFailure::Socket(details) => RpcErrorData::with_data(
            TRANSPORT_ERROR,
            "Transport error",
            json!({ "details": details }),
        ),
        RawFailure::Malformed(details) => RpcErrorData::parse_error(details),
        RawFailure::Provider(ProviderError(value)) => normalize_provider(value),
        RawFailure::Normalized(error) => error,
    }
}

/// Whether a failure with this code is worth another attempt
///
/// Transient: transport errors, internal errors, unavailable resources, rate
/// limits, `-32000` (nodes report "header not found" for blocks they have not
/// seen yet) and provider disconnects. Malformed input, user rejections,
/// authorization failures and unrecognized codes are not.
pub fn is_transient(code: i32) -> bool {
    matches!(
        code,
        TRANSPORT_ERROR
            | INTERNAL_ERROR
            | INVALID_INPUT
            | RESOURCE_UNAVAILABLE
            | LIMIT_EXCEEDED
            | DISCONNECTED
            | CHAIN_DISCONNECTED
    )
}

fn normalize_http(status: u16, body: String) -> RpcErrorData {
    if let Ok(value) = serde_json::from_str::<Value>(&body) {
        if let Some(error) = extract_error_object(&value) {
            return error;
        }
    }

    let (code, reason) = match status {
        429 => (LIMIT_EXCEEDED, "Limit exceeded"),
        401 | 403 => (UNAUTHORIZED, "Unauthorized"),
        408 | 500..=599 => (RESOURCE_UNAVAILABLE, "Resource unavailable"),
        _ => (INVALID_REQUEST, "Invalid request"),
    };

    RpcErrorData::with_data(
        code,
        format!("{} (HTTP {})", reason, status),
        json!({ "status": status, "body": body }),
    )
}

fn normalize_provider(value: Value) -> RpcErrorData {
    if let Some(error) = extract_error_object(&value) {
        return error;
    }

    match value {
        Value::String(message) if !message.is_empty() => RpcErrorData::new(UNKNOWN_ERROR, message),
        Value::Null => RpcErrorData::unknown(),
        other => RpcErrorData::with_data(UNKNOWN_ERROR, UNKNOWN_ERROR_MESSAGE, other),
    }
}

/// Pull `{code, message, data}` out of an error object or a reply wrapping one
fn extract_error_object(value: &Value) -> Option<RpcErrorData> {
    let object = value.as_object()?;

    if let Some(code) = object.get("code").and_then(integer_code) {
        let message = object
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(UNKNOWN_ERROR_MESSAGE);
        let data = object.get("data").filter(|d| !d.is_null()).cloned();

        return Some(RpcErrorData {
            code,
            message: message.to_string(),
            data,
        });
    }

    object.get("error").and_then(extract_error_object)
}

fn integer_code(value: &Value) -> Option<i32> {
    value.as_i64().and_then(|code| i32::try_from(code).ok())
}
