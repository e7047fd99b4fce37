//! Request, response and wire message types
//!
//! Two layers live here:
//!
//! - **Logical call types** ([`RpcRequest`], [`RpcResponse`]): what a caller hands to
//!   the client and gets back. They know nothing about ids or the `jsonrpc` tag and
//!   are forwarded as-is to an injected provider.
//! - **JSON-RPC 2.0 wire types** ([`JsonRpcRequest`], [`JsonRpcResponse`],
//!   [`JsonRpcNotification`]): what the HTTP and socket transports put on the wire.
//!
//! # Null Results
//!
//! `{"result": null}` is a successful reply (e.g. `eth_getTransactionReceipt` for a
//! pending transaction). The wire response keeps a present-but-null result distinct
//! from a missing one, so `null` never turns into an error.

use crate::error::{Error, RpcErrorData, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// JSON-RPC 2.0 request ID
///
/// The transports only ever mint numeric ids, but peers may echo strings and
/// error replies for undecodable requests carry `null`.
///
/// # Examples
///
/// ```rust
/// use tether_core::Id;
///
/// let id: Id = 42u64.into();
/// assert_eq!(id.to_string(), "42");
///
/// let named: Id = "sub-1".into();
/// assert_eq!(named.to_string(), "\"sub-1\"");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// String identifier
    String(String),
    /// Numeric identifier
    Number(i64),
    /// Null identifier, used by peers that could not read the request id
    Null,
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::String(s) => write!(f, "\"{}\"", s),
            Id::Number(n) => write!(f, "{}", n),
            Id::Null => write!(f, "null"),
        }
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n)
    }
}

impl From<u64> for Id {
    /// Values above `i64::MAX` saturate
    fn from(n: u64) -> Self {
        Id::Number(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

/// A logical remote-procedure call: method name plus positional parameters
///
/// Immutable for the duration of a call; every retry attempt sends the same
/// request. The transports never inspect `params`.
///
/// # Examples
///
/// ```rust
/// use tether_core::RpcRequest;
/// use serde_json::json;
///
/// let request = RpcRequest::new("eth_getBalance", vec![json!("0xf39f"), json!("latest")]);
/// assert_eq!(request.method, "eth_getBalance");
///
/// let no_params = RpcRequest::method("eth_blockNumber");
/// assert!(no_params.params.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Remote method name
    pub method: String,
    /// Positional parameters, opaque to the client layer
    #[serde(default)]
    pub params: Vec<Value>,
}

impl RpcRequest {
    /// Create a request with positional parameters
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// Create a request that takes no parameters
    pub fn method(method: impl Into<String>) -> Self {
        Self::new(method, Vec::new())
    }

    /// Wrap this request in a JSON-RPC 2.0 envelope with the given id
    pub fn to_wire(&self, id: Id) -> JsonRpcRequest {
        JsonRpcRequest::new(self.method.clone(), self.params.clone(), id)
    }
}

/// Successful outcome of a call
///
/// `result` may be `Value::Null`; that is a value, not a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// The raw result value returned by the transport
    pub result: Value,
}

impl RpcResponse {
    /// Wrap a raw result value
    pub fn new(result: Value) -> Self {
        Self { result }
    }

    /// Deserialize the result into a concrete type
    ///
    /// A result that does not match `T` is reported as a parse error (-32700).
    pub fn into_typed<T: serde::de::DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(self.result)
            .map_err(|e| Error::Rpc(RpcErrorData::parse_error(e.to_string())))
    }
}

/// JSON-RPC 2.0 request message
///
/// `params` is always serialized as an array, even when empty, which is what
/// Ethereum nodes expect.
///
/// # Examples
///
/// ```rust
/// use tether_core::{JsonRpcRequest, Id};
///
/// let request = JsonRpcRequest::new("eth_chainId", vec![], Id::Number(1));
/// assert_eq!(request.jsonrpc, "2.0");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version, always "2.0"
    pub jsonrpc: String,
    /// Name of the remote method to invoke
    pub method: String,
    /// Positional parameters
    #[serde(default)]
    pub params: Vec<Value>,
    /// Identifier correlating this request with its reply
    pub id: Id,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC 2.0 request
    pub fn new(method: impl Into<String>, params: Vec<Value>, id: Id) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// JSON-RPC 2.0 notification message
///
/// Pushed by a socket peer without an id, e.g. `eth_subscription` events after an
/// `eth_subscribe` call. The socket transport publishes these by method name.
///
/// # Examples
///
/// ```rust
/// use tether_core::JsonRpcNotification;
/// use serde_json::json;
///
/// let notif = JsonRpcNotification::new(
///     "eth_subscription",
///     Some(json!({"subscription": "0x1", "result": {"number": "0x10"}})),
/// );
/// assert_eq!(notif.method, "eth_subscription");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version, always "2.0"
    pub jsonrpc: String,
    /// Name of the method or event being notified
    pub method: String,
    /// Event payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new JSON-RPC 2.0 notification
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response message
///
/// Carries either a result or an error. A present `"result": null` deserializes to
/// `Some(Value::Null)`; only an absent field is `None`.
///
/// # Examples
///
/// ```rust
/// use tether_core::{JsonRpcResponse, Id};
/// use serde_json::{json, Value};
///
/// let pending: JsonRpcResponse =
///     serde_json::from_str(r#"{"jsonrpc":"2.0","id":7,"result":null}"#).unwrap();
/// assert_eq!(pending.result, Some(Value::Null));
/// assert_eq!(pending.into_result().unwrap(), Value::Null);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version, always "2.0"
    pub jsonrpc: String,
    /// The result of the method invocation
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    /// Error information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorData>,
    /// Request ID copied from the originating request
    pub id: Id,
}

/// Maps any present value, including `null`, to `Some`
fn deserialize_some<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl JsonRpcResponse {
    /// Create a successful response
    pub fn success(result: Value, id: Id) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response
    pub fn error(error: RpcErrorData, id: Id) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Check if the response carries an error object
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Resolve the response to its result value or its error
    ///
    /// The error object wins if both fields are present. A reply with neither is
    /// malformed and reported as a parse error.
    pub fn into_result(self) -> Result<Value> {
        match (self.error, self.result) {
            (Some(error), _) => Err(Error::Rpc(error)),
            (None, Some(result)) => Ok(result),
            (None, None) => Err(Error::Rpc(RpcErrorData::parse_error(format!(
                "response {} has neither result nor error",
                self.id
            )))),
        }
    }
}

/// An inbound frame on a persistent connection
///
/// Replies carry an `id`; notifications carry a `method` and no `id`.
#[derive(Debug, Clone)]
pub enum JsonRpcMessage {
    /// Reply to one of our requests
    Response(JsonRpcResponse),
    /// Server-initiated notification
    Notification(JsonRpcNotification),
}

impl JsonRpcMessage {
    /// Check if this message is a response
    pub fn is_response(&self) -> bool {
        matches!(self, JsonRpcMessage::Response(_))
    }

    /// Check if this message is a notification
    pub fn is_notification(&self) -> bool {
        matches!(self, JsonRpcMessage::Notification(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_display() {
        assert_eq!(Id::String("test".to_string()).to_string(), "\"test\"");
        assert_eq!(Id::Number(42).to_string(), "42");
        assert_eq!(Id::Null.to_string(), "null");
    }

    #[test]
    fn test_id_from_u64_saturates() {
        assert_eq!(Id::from(u64::MAX), Id::Number(i64::MAX));
        assert_eq!(Id::from(7u64), Id::Number(7));
    }

    #[test]
    fn test_request_serializes_params_array() {
        let req = RpcRequest::method("eth_blockNumber").to_wire(Id::Number(1));
        let json = serde_json::to_string(&req).unwrap();

        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"eth_blockNumber\""));
        assert!(json.contains("\"params\":[]"));
        assert!(json.contains("\"id\":1"));
    }

    #[test]
    fn test_null_result_is_success() {
        let resp: JsonRpcResponse =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 3, "result": null})).unwrap();

        assert!(!resp.is_error());
        assert_eq!(resp.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn test_missing_result_and_error_is_parse_error() {
        let resp: JsonRpcResponse =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 3})).unwrap();

        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code(), Some(-32700));
    }

    #[test]
    fn test_error_response_into_result() {
        let resp = JsonRpcResponse::error(RpcErrorData::new(-32000, "header not found"), Id::Number(9));
        let err = resp.into_result().unwrap_err();

        assert_eq!(err, Error::Rpc(RpcErrorData::new(-32000, "header not found")));
    }

    #[test]
    fn test_typed_response() {
        let response = RpcResponse::new(json!(["0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"]));
        let accounts: Vec<String> = response.into_typed().unwrap();
        assert_eq!(accounts.len(), 1);

        let mismatched = RpcResponse::new(json!("0x1"));
        let err = mismatched.into_typed::<u64>().unwrap_err();
        assert_eq!(err.code(), Some(-32700));
    }

    #[test]
    fn test_notification_omits_missing_params() {
        let notif = JsonRpcNotification::new("eth_subscription", None);
        let json = serde_json::to_string(&notif).unwrap();

        assert!(!json.contains("params"));
        assert!(!json.contains("\"id\""));
    }
}
