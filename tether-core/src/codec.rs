//! Codec for JSON-RPC frames and bodies
//!
//! Encoding failures are internal errors (-32603); anything that cannot be
//! decoded into a reply or notification is a parse error (-32700). Both come back
//! as normalized [`Error::Rpc`] values so transports can return them directly.
//!
//! # Frame Classification
//!
//! [`decode`] looks at the keys of an inbound object rather than trying serde
//! variants in order:
//!
//! - an `id` together with `result` or `error` is a reply,
//! - a `method` without an `id` is a notification,
//! - anything else (arrays, scalars, requests sent to us) is rejected.
//!
//! # Examples
//!
//! ```rust
//! use tether_core::{codec, Id, RpcRequest};
//!
//! let wire = RpcRequest::method("eth_chainId").to_wire(Id::Number(1));
//! let json = codec::encode_request(&wire).unwrap();
//! assert!(json.contains("eth_chainId"));
//!
//! let reply = codec::decode(r#"{"jsonrpc":"2.0","id":1,"result":"0x1"}"#).unwrap();
//! assert!(reply.is_response());
//! ```

use crate::error::{Error, RpcErrorData, Result};
use crate::types::{JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use serde::Serialize;
use serde_json::Value;

/// Encode any serializable message to a JSON string
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::Rpc(RpcErrorData::internal_error(e.to_string())))
}

/// Encode a JSON-RPC request to JSON
pub fn encode_request(req: &JsonRpcRequest) -> Result<String> {
    encode(req)
}

/// Decode an inbound frame into a reply or a notification
///
/// # Errors
///
/// Returns a -32700 parse error if the text is not JSON or is neither a reply
/// nor a notification.
pub fn decode(data: &str) -> Result<JsonRpcMessage> {
    let value: Value = serde_json::from_str(data).map_err(parse_error)?;

    let object = value
        .as_object()
        .ok_or_else(|| Error::Rpc(RpcErrorData::parse_error("frame is not a JSON object")))?;

    let has_id = object.get("id").is_some_and(|id| !id.is_null());
    let is_reply = object.contains_key("result") || object.contains_key("error");

    if is_reply {
        return serde_json::from_value::<JsonRpcResponse>(value)
            .map(JsonRpcMessage::Response)
            .map_err(parse_error);
    }

    if object.contains_key("method") && !has_id {
        return serde_json::from_value::<JsonRpcNotification>(value)
            .map(JsonRpcMessage::Notification)
            .map_err(parse_error);
    }

    Err(Error::Rpc(RpcErrorData::parse_error(
        "frame is neither a reply nor a notification",
    )))
}

/// Decode a JSON string that must be a single reply (an HTTP body)
pub fn decode_response(data: &str) -> Result<JsonRpcResponse> {
    serde_json::from_str(data).map_err(parse_error)
}

fn parse_error(e: serde_json::Error) -> Error {
    Error::Rpc(RpcErrorData::parse_error(e.to_string()))
}
