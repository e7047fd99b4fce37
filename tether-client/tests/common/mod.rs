//! Common test utilities for tether-client integration tests
//!
//! Mock servers for the HTTP and WebSocket transports and a mock EIP-1193
//! provider, so the client can be exercised without a real node or wallet.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tether_client::{Eip1193Provider, ListenerHandle, ListenerId, ACCOUNTS_CHANGED};
use tether_core::{ProviderError, RpcRequest};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use warp::Filter;

/// Outbound frames for one mock socket connection
pub type Outbox = mpsc::UnboundedSender<Message>;

type WsHandler = Arc<dyn Fn(Value, Outbox) + Send + Sync>;

struct LiveConnection {
    task: AbortHandle,
    outbox: Outbox,
}

/// Mock WebSocket JSON-RPC server
///
/// Every text frame is parsed as JSON and passed to the handler together with the
/// connection's outbox; the handler decides whether, when and what to answer.
pub struct MockWsServer {
    addr: SocketAddr,
    accept: AbortHandle,
    connections: Arc<Mutex<Vec<LiveConnection>>>,
    accepted: Arc<AtomicUsize>,
    message_rx: mpsc::UnboundedReceiver<Value>,
}

impl MockWsServer {
    /// A server that answers every request with its first param
    pub async fn echo() -> Self {
        Self::with_handler(|request, outbox| {
            let result = request["params"].get(0).cloned().unwrap_or(Value::Null);
            reply_now(&outbox, mock_response(&request["id"], result));
        })
        .await
    }

    /// Start a mock server with a custom handler
    pub async fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(Value, Outbox) + Send + Sync + 'static,
    {
        let handler: WsHandler = Arc::new(handler);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let connections = Arc::new(Mutex::new(Vec::<LiveConnection>::new()));
        let accepted = Arc::new(AtomicUsize::new(0));
        let (msg_tx, message_rx) = mpsc::unbounded_channel();

        let accept = {
            let connections = connections.clone();
            let accepted = accepted.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    accepted.fetch_add(1, Ordering::SeqCst);
                    let handler = handler.clone();
                    let msg_tx = msg_tx.clone();
                    let (outbox, mut outgoing) = mpsc::unbounded_channel::<Message>();
                    let handler_outbox = outbox.clone();

                    let task = tokio::spawn(async move {
                        let Ok(ws_stream) = accept_async(stream).await else {
                            return;
                        };
                        let (mut write, mut read) = ws_stream.split();

                        loop {
                            tokio::select! {
                                incoming = read.next() => match incoming {
                                    Some(Ok(Message::Text(text))) => {
                                        let Ok(request) = serde_json::from_str::<Value>(&text) else {
                                            continue;
                                        };
                                        let _ = msg_tx.send(request.clone());
                                        handler(request, handler_outbox.clone());
                                    }
                                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                                    Some(Ok(_)) => {}
                                },
                                Some(frame) = outgoing.recv() => {
                                    if write.send(frame).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    });

                    connections.lock().unwrap().push(LiveConnection {
                        task: task.abort_handle(),
                        outbox,
                    });
                }
            })
            .abort_handle()
        };

        Self {
            addr,
            accept,
            connections,
            accepted,
            message_rx,
        }
    }

    /// Get the WebSocket URL for connecting to this server
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Number of connections accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Wait for the next request received by the server
    pub async fn wait_for_message(&mut self) -> Option<Value> {
        tokio::time::timeout(Duration::from_secs(5), self.message_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Push a frame to every live connection
    pub fn broadcast(&self, frame: String) {
        for conn in self.connections.lock().unwrap().iter() {
            let _ = conn.outbox.send(Message::Text(frame.clone()));
        }
    }

    /// Abruptly drop every live connection without a close frame
    pub fn drop_connections(&self) {
        for conn in self.connections.lock().unwrap().drain(..) {
            conn.task.abort();
        }
    }

    /// Stop accepting and drop every connection
    pub fn shutdown(self) {
        self.accept.abort();
        self.drop_connections();
    }
}

/// Queue a frame on a mock connection
pub fn reply_now(outbox: &Outbox, frame: String) {
    let _ = outbox.send(Message::Text(frame));
}

/// Queue a frame on a mock connection after `delay`
pub fn reply_after(outbox: &Outbox, delay: Duration, frame: String) {
    let outbox = outbox.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = outbox.send(Message::Text(frame));
    });
}

/// Helper to create a mock JSON-RPC response
pub fn mock_response(id: &Value, result: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": id
    })
    .to_string()
}

/// Helper to create a mock JSON-RPC error response
pub fn mock_error_response(id: &Value, code: i32, message: &str) -> String {
    json!({
        "jsonrpc": "2.0",
        "error": {
            "code": code,
            "message": message
        },
        "id": id
    })
    .to_string()
}

/// Helper to create a mock JSON-RPC notification
pub fn mock_notification(method: &str, params: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params
    })
    .to_string()
}

/// What the mock HTTP server sends back for one request
pub struct HttpReply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl HttpReply {
    pub fn ok(body: String) -> Self {
        Self {
            status: 200,
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Mock HTTP JSON-RPC endpoint
pub struct MockHttpServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    server: AbortHandle,
}

impl MockHttpServer {
    /// Start a server; the handler sees each request body and its zero-based index
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(Value, usize) -> HttpReply + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let hits = Arc::new(AtomicUsize::new(0));

        let route = {
            let hits = hits.clone();
            warp::post()
                .and(warp::body::json())
                .and_then(move |request: Value| {
                    let handler = handler.clone();
                    let index = hits.fetch_add(1, Ordering::SeqCst);
                    async move {
                        let reply = handler(request, index);
                        if !reply.delay.is_zero() {
                            tokio::time::sleep(reply.delay).await;
                        }
                        let status = warp::http::StatusCode::from_u16(reply.status)
                            .unwrap_or(warp::http::StatusCode::INTERNAL_SERVER_ERROR);
                        Ok::<_, Infallible>(warp::reply::with_status(
                            warp::reply::with_header(reply.body, "content-type", "application/json"),
                            status,
                        ))
                    }
                })
        };

        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        let server = tokio::spawn(server).abort_handle();

        Self { addr, hits, server }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of requests served so far
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for MockHttpServer {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// First account of the development mnemonic
pub const ACCOUNT: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

/// Mock EIP-1193 provider behaving like a development wallet
#[derive(Default)]
pub struct MockProvider {
    listeners: Mutex<Vec<(String, ListenerHandle)>>,
    pub requests: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fire an event to every listener registered for it
    pub fn emit(&self, event: &str, payload: Value) -> usize {
        let listeners = self.listeners.lock().unwrap();
        listeners
            .iter()
            .filter(|(e, _)| e == event)
            .filter(|(_, handle)| handle.send(payload.clone()))
            .count()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| e == event)
            .count()
    }
}

#[async_trait]
impl Eip1193Provider for MockProvider {
    async fn request(&self, request: &RpcRequest) -> Result<Value, ProviderError> {
        self.requests.lock().unwrap().push(request.method.clone());
        let first = request.params.first().cloned().unwrap_or(Value::Null);

        match request.method.as_str() {
            "eth_requestAccounts" | "eth_accounts" => Ok(json!([ACCOUNT])),
            "eth_chainId" => Ok(json!("0x1")),
            "wallet_watchAsset" => {
                if first["type"] == "ERC721" {
                    Err(ProviderError::rpc(-32602, "Token type ERC721 not supported."))
                } else {
                    Ok(json!(true))
                }
            }
            "wallet_addEthereumChain" => Ok(Value::Null),
            "wallet_switchEthereumChain" => {
                if first["chainId"] == "0xfa" {
                    Err(ProviderError::rpc(-4902, "Unrecognized chain."))
                } else {
                    Ok(Value::Null)
                }
            }
            "wallet_getPermissions" | "wallet_requestPermissions" => Ok(json!([{
                "invoker": "https://example.org",
                "parentCapability": "eth_accounts",
                "caveats": [{ "type": "filterResponse", "value": [ACCOUNT] }]
            }])),
            "personal_sign" => Err(ProviderError::from_value(json!("User denied message signature."))),
            "eth_sendTransaction" => Err(ProviderError::from_value(Value::Null)),
            _ => Err(ProviderError::rpc(4200, "Unsupported method")),
        }
    }

    fn on(&self, event: &str, handle: ListenerHandle) {
        if event == ACCOUNTS_CHANGED {
            handle.send(json!([ACCOUNT]));
        }
        self.listeners.lock().unwrap().push((event.to_string(), handle));
    }

    fn remove_listener(&self, event: &str, id: ListenerId) {
        self.listeners
            .lock()
            .unwrap()
            .retain(|(e, handle)| !(e == event && handle.id() == id));
    }
}
