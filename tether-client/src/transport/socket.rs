//! JSON-RPC over a persistent WebSocket
//!
//! All concurrent calls share one connection. Replies may arrive in any order and
//! are matched to their callers by id, never by position.
//!
//! # Request Lifecycle
//!
//! 1. **Connect**: reuse the live connection, or open one if there is none
//! 2. **Register**: insert a oneshot slot for a fresh id in the connection's pending map
//! 3. **Send**: write the request as a text frame
//! 4. **Wait**: the caller awaits the slot
//! 5. **Complete**: the receive loop removes the slot matching the reply id and fills it
//!
//! A caller that stops waiting (its future is dropped, e.g. by a timeout) removes
//! its own slot, so abandoned calls do not accumulate.
//!
//! # Disconnects
//!
//! The pending map belongs to one connection. When that connection drops, the
//! receive loop fails every slot in it with [`Error::ConnectionClosed`] and the
//! map refuses new entries. There is no background reconnect loop: the next call
//! opens a new connection before sending. Opening a connection (TCP connect plus
//! handshake) is bounded by [`SocketConfig::connect_timeout`].
//!
//! After [`Transport::close`] the transport refuses every call. A connect still in
//! progress is abandoned and its caller fails with [`Error::ConnectionClosed`].
//!
//! # Notifications
//!
//! Frames without an id (e.g. `eth_subscription`) are published to the
//! transport's [`SubscriptionRegistry`] under their method name.

use super::{parse_url, SocketConfig, Transport, TransportKind};
use crate::connection_state::{ConnectionState, ConnectionStatus};
use crate::metrics::ClientMetrics;
use crate::subscription::{Subscription, SubscriptionRegistry};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tether_core::{
    codec, Error, Id, JsonRpcMessage, JsonRpcResponse, RawFailure, Result, RpcRequest,
};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tokio::task::AbortHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingSlot = oneshot::Sender<Result<JsonRpcResponse>>;

/// Outstanding calls on one connection
///
/// `None` once the connection is gone: the map is drained exactly once and
/// refuses registrations afterwards.
struct RequestManager {
    pending: Mutex<Option<HashMap<String, PendingSlot>>>,
}

impl RequestManager {
    fn new() -> Self {
        Self {
            pending: Mutex::new(Some(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<HashMap<String, PendingSlot>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a pending request
    fn register(&self, id: &Id) -> Result<oneshot::Receiver<Result<JsonRpcResponse>>> {
        let mut pending = self.lock();
        let map = pending.as_mut().ok_or(Error::ConnectionClosed)?;

        let (tx, rx) = oneshot::channel();
        map.insert(id_to_string(id), tx);
        Ok(rx)
    }

    /// Complete a pending request with its reply; `false` if nobody was waiting
    fn complete(&self, response: JsonRpcResponse) -> bool {
        let slot = self
            .lock()
            .as_mut()
            .and_then(|map| map.remove(&id_to_string(&response.id)));

        match slot {
            Some(tx) => tx.send(Ok(response)).is_ok(),
            None => false,
        }
    }

    /// Forget a pending request without completing it
    fn remove(&self, id: &Id) {
        if let Some(map) = self.lock().as_mut() {
            map.remove(&id_to_string(id));
        }
    }

    /// Fail all pending requests and refuse new ones; returns how many were failed
    fn fail_all(&self, error: Error) -> usize {
        let Some(map) = self.lock().take() else {
            return 0;
        };

        let count = map.len();
        for (_, tx) in map {
            let _ = tx.send(Err(error.clone()));
        }
        count
    }

    fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    fn pending_count(&self) -> usize {
        self.lock().as_ref().map_or(0, HashMap::len)
    }
}

/// Convert an ID to a string key for the hashmap
fn id_to_string(id: &Id) -> String {
    match id {
        Id::String(s) => s.clone(),
        Id::Number(n) => n.to_string(),
        Id::Null => "null".to_string(),
    }
}

/// One live WebSocket connection and the calls waiting on it
struct Connection {
    sink: tokio::sync::Mutex<SplitSink<WsStream, Message>>,
    requests: RequestManager,
    reader: Mutex<Option<AbortHandle>>,
}

impl Connection {
    fn is_alive(&self) -> bool {
        !self.requests.is_closed()
    }

    fn abort_reader(&self) {
        if let Some(handle) = self.reader.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
    }
}

/// Removes a pending slot if the caller stops waiting before the reply arrives
struct PendingGuard<'a> {
    connection: &'a Connection,
    id: Id,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.connection.requests.remove(&self.id);
    }
}

struct Shared {
    url: Url,
    connect_timeout: Duration,
    current: Mutex<Option<Arc<Connection>>>,
    /// Serializes connects so concurrent callers share one new connection
    dialing: tokio::sync::Mutex<()>,
    closed: watch::Sender<bool>,
    next_id: AtomicU64,
    ever_connected: AtomicBool,
    status: ConnectionStatus,
    registry: SubscriptionRegistry,
    metrics: Option<Arc<ClientMetrics>>,
}

impl Shared {
    fn current(&self) -> MutexGuard<'_, Option<Arc<Connection>>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// The live connection if there is one; fails once the transport is closed
    fn live(&self) -> Result<Option<Arc<Connection>>> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        Ok(self.current().as_ref().filter(|c| c.is_alive()).cloned())
    }

    fn set_state(&self, state: ConnectionState) {
        if self.status.transition(state) {
            if let Some(ref m) = self.metrics {
                m.update_connection_state(state);
            }
        }
    }
}

/// Persistent WebSocket transport
pub struct SocketTransport {
    shared: Arc<Shared>,
}

impl SocketTransport {
    /// Validate the URL and open the first connection
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] for a URL that is not `ws`/`wss`; a transport
    /// error (-32768) if the endpoint cannot be reached; [`Error::Timeout`] if the
    /// handshake does not finish within `config.connect_timeout`.
    #[tracing::instrument(skip(config, metrics), fields(url = %config.url))]
    pub async fn connect(config: SocketConfig, metrics: Option<Arc<ClientMetrics>>) -> Result<Self> {
        let url = parse_url(&config.url, &["ws", "wss"])?;

        let transport = Self {
            shared: Arc::new(Shared {
                url,
                connect_timeout: config.connect_timeout,
                current: Mutex::new(None),
                dialing: tokio::sync::Mutex::new(()),
                closed: watch::channel(false).0,
                next_id: AtomicU64::new(1),
                ever_connected: AtomicBool::new(false),
                status: ConnectionStatus::new(),
                registry: SubscriptionRegistry::new(),
                metrics,
            }),
        };

        transport.connection().await?;
        Ok(transport)
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.shared.status.get()
    }

    /// Registry that receives pushed notifications, keyed by method name
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.shared.registry
    }

    /// Subscribe to notifications with the given method name
    pub fn subscribe(&self, method: &str) -> Subscription {
        self.shared.registry.subscribe(method)
    }

    /// Stop delivering notifications to `subscription`
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.shared
            .registry
            .remove(subscription.event(), subscription.id())
    }

    /// Number of calls waiting for a reply on the live connection
    pub fn pending_count(&self) -> usize {
        self.shared
            .current()
            .as_ref()
            .map_or(0, |conn| conn.requests.pending_count())
    }

    /// The live connection, opening a new one if there is none
    ///
    /// The slot lock is never held across the connect, so [`Transport::close`]
    /// does not wait for a stuck handshake.
    async fn connection(&self) -> Result<Arc<Connection>> {
        let shared = &self.shared;
        if let Some(conn) = shared.live()? {
            return Ok(conn);
        }

        let _dialing = shared.dialing.lock().await;
        // Another caller may have connected while we waited
        if let Some(conn) = shared.live()? {
            return Ok(conn);
        }

        let reconnecting = shared.ever_connected.load(Ordering::SeqCst);
        shared.set_state(ConnectionState::Connecting);
        if reconnecting {
            tracing::info!(url = %shared.url, "Reconnecting");
        } else {
            tracing::info!(url = %shared.url, "Connecting");
        }

        let mut closing = shared.closed.subscribe();
        let dial = tokio::time::timeout(shared.connect_timeout, connect_async(shared.url.as_str()));
        let outcome = tokio::select! {
            outcome = dial => outcome,
            _ = closing.wait_for(|closed| *closed) => {
                tracing::debug!(url = %shared.url, "Connect abandoned, transport closed");
                return Err(Error::ConnectionClosed);
            }
        };

        let ws_stream = match outcome {
            Ok(Ok((ws_stream, _))) => ws_stream,
            Ok(Err(e)) => {
                tracing::warn!(url = %shared.url, error = %e, "Connection failed");
                shared.set_state(ConnectionState::Disconnected);
                return Err(RawFailure::Network(e.to_string()).into());
            }
            Err(_) => {
                let timeout_ms =
                    u64::try_from(shared.connect_timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(url = %shared.url, timeout_ms, "Connection timed out");
                shared.set_state(ConnectionState::Disconnected);
                return Err(Error::Timeout { timeout_ms });
            }
        };

        let (sink, stream) = ws_stream.split();
        let conn = Arc::new(Connection {
            sink: tokio::sync::Mutex::new(sink),
            requests: RequestManager::new(),
            reader: Mutex::new(None),
        });

        {
            let mut current = shared.current();
            // close() flips the flag before emptying the slot, so checking under the
            // slot lock means a connection is never stored after close
            if shared.is_closed() {
                return Err(Error::ConnectionClosed);
            }

            let reader = tokio::spawn(receive_loop(
                Arc::clone(shared),
                Arc::clone(&conn),
                stream,
            ));
            *conn.reader.lock().unwrap_or_else(|e| e.into_inner()) = Some(reader.abort_handle());
            *current = Some(Arc::clone(&conn));
        }
        shared.ever_connected.store(true, Ordering::SeqCst);
        shared.set_state(ConnectionState::Connected);

        if reconnecting {
            if let Some(ref m) = shared.metrics {
                m.record_reconnect();
            }
        }
        tracing::info!("Connected successfully");

        Ok(conn)
    }
}

#[async_trait]
impl Transport for SocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Socket
    }

    async fn request(&self, request: &RpcRequest) -> Result<Value> {
        let conn = self.connection().await?;

        let id = Id::from(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let text = codec::encode_request(&request.to_wire(id.clone()))?;

        // Register the pending request before sending
        let rx = conn.requests.register(&id)?;
        let _guard = PendingGuard {
            connection: &conn,
            id: id.clone(),
        };

        conn.sink
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|e| Error::from(RawFailure::Socket(e.to_string())))?;

        tracing::trace!(method = %request.method, id = %id, "Request sent, waiting for response");

        match rx.await {
            Ok(reply) => reply?.into_result(),
            Err(_) => Err(Error::ConnectionClosed),
        }
    }

    async fn close(&self) -> Result<()> {
        let shared = &self.shared;
        if shared.closed.send_replace(true) {
            return Ok(());
        }

        shared.status.close();
        let conn = shared.current().take();
        if let Some(ref m) = shared.metrics {
            m.update_connection_state(ConnectionState::Closed);
        }

        if let Some(conn) = conn {
            let failed = conn.requests.fail_all(Error::ConnectionClosed);
            if let Err(e) = conn.sink.lock().await.close().await {
                tracing::debug!(error = %e, "Error while closing socket");
            }
            conn.abort_reader();
            tracing::info!(failed_requests = failed, "Socket transport closed");
        }

        Ok(())
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        // The receive loop holds the shared state; stop it so the socket is released
        self.shared.closed.send_replace(true);
        if let Some(conn) = self.shared.current().take() {
            conn.requests.fail_all(Error::ConnectionClosed);
            conn.abort_reader();
        }
    }
}

/// Route inbound frames until the connection ends, then fail what is still pending
async fn receive_loop(shared: Arc<Shared>, conn: Arc<Connection>, mut stream: SplitStream<WsStream>) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => handle_frame(&shared, &conn, &text),
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => handle_frame(&shared, &conn, text),
                Err(_) => tracing::warn!("Ignoring non-UTF-8 binary frame"),
            },
            Ok(Message::Close(_)) => {
                tracing::info!("Connection closed by server");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "WebSocket error");
                break;
            }
        }
    }

    let failed = conn.requests.fail_all(Error::ConnectionClosed);
    if failed > 0 {
        tracing::warn!(failed_requests = failed, "Connection lost with requests in flight");
    }

    let mut current = shared.current();
    if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, &conn)) {
        *current = None;
        shared.set_state(ConnectionState::Disconnected);
    }
}

fn handle_frame(shared: &Shared, conn: &Connection, text: &str) {
    match codec::decode(text) {
        Ok(JsonRpcMessage::Response(response)) => {
            let id = response.id.clone();
            if !conn.requests.complete(response) {
                tracing::debug!(id = %id, "Reply for a request nobody is waiting on");
            }
        }
        Ok(JsonRpcMessage::Notification(notification)) => {
            if let Some(ref m) = shared.metrics {
                m.record_notification(&notification.method);
            }
            tracing::debug!(method = %notification.method, "Notification received");
            let payload = notification.params.unwrap_or(Value::Null);
            shared.registry.emit(&notification.method, payload);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Error handling message");
        }
    }
}
