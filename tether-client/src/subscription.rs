//! Event subscriptions delivered over channels
//!
//! Both push-capable transports produce events the caller did not ask for in a
//! particular call: a WebSocket peer pushes `eth_subscription` notifications, an
//! injected provider fires `accountsChanged`. Instead of storing callbacks, the
//! registry hands each listener the sending half of an unbounded channel and
//! keeps only that.
//!
//! - Listeners for one event are kept in registration order.
//! - [`SubscriptionRegistry::emit`] clones the listener list and releases the lock
//!   before sending, so a listener may subscribe or unsubscribe while events flow.
//! - A listener whose [`Subscription`] was dropped is pruned on the next emit.
//!
//! # Examples
//!
//! ```rust
//! use tether_client::SubscriptionRegistry;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let registry = SubscriptionRegistry::new();
//! let mut sub = registry.subscribe("eth_subscription");
//!
//! registry.emit("eth_subscription", json!({"subscription": "0x1", "result": "0x10"}));
//!
//! let event = sub.recv().await.unwrap();
//! assert_eq!(event["result"], "0x10");
//! # }
//! ```

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique listener identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// The sending side of one listener
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    id: ListenerId,
    tx: mpsc::UnboundedSender<Value>,
}

impl ListenerHandle {
    /// Create a handle and the subscription that receives from it
    pub fn channel(event: impl Into<String>) -> (Self, Subscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ListenerId::next();
        (
            Self { id, tx },
            Subscription {
                id,
                event: event.into(),
                rx,
            },
        )
    }

    /// This listener's id
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Deliver a payload; `false` if the receiving side is gone
    pub fn send(&self, payload: Value) -> bool {
        self.tx.send(payload).is_ok()
    }

    /// Whether the receiving side has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The receiving side of one listener
#[derive(Debug)]
pub struct Subscription {
    id: ListenerId,
    event: String,
    rx: mpsc::UnboundedReceiver<Value>,
}

impl Subscription {
    /// The listener id, used to unsubscribe
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// The event this subscription listens to
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Wait for the next payload; `None` once the source is gone
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    /// Take a payload if one is already queued
    pub fn try_recv(&mut self) -> Option<Value> {
        self.rx.try_recv().ok()
    }
}

/// Event name → ordered listeners
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    listeners: Arc<Mutex<HashMap<String, Vec<ListenerHandle>>>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<ListenerHandle>>> {
        // The map stays consistent even if a holder panicked
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new listener for `event` and return its subscription
    pub fn subscribe(&self, event: impl Into<String>) -> Subscription {
        let event = event.into();
        let (handle, subscription) = ListenerHandle::channel(event.clone());
        self.add(event, handle);
        subscription
    }

    /// Register an existing handle for `event`
    pub fn add(&self, event: impl Into<String>, handle: ListenerHandle) {
        self.lock().entry(event.into()).or_default().push(handle);
    }

    /// Remove a listener; `true` if it was registered
    pub fn remove(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let Some(handles) = listeners.get_mut(event) else {
            return false;
        };

        let before = handles.len();
        handles.retain(|h| h.id != id);
        let removed = handles.len() != before;

        if handles.is_empty() {
            listeners.remove(event);
        }
        removed
    }

    /// Deliver `payload` to every listener of `event`, returning how many received it
    pub fn emit(&self, event: &str, payload: Value) -> usize {
        let handles = match self.lock().get(event) {
            Some(handles) => handles.clone(),
            None => return 0,
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for handle in &handles {
            if handle.send(payload.clone()) {
                delivered += 1;
            } else {
                closed.push(handle.id);
            }
        }

        for id in closed {
            tracing::debug!(event = %event, listener = id.as_u64(), "Pruning closed listener");
            self.remove(event, id);
        }

        delivered
    }

    /// Events that currently have listeners
    pub fn events(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Number of listeners registered for `event`
    pub fn listener_count(&self, event: &str) -> usize {
        self.lock().get(event).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_emit_reaches_listeners_in_order() {
        let registry = SubscriptionRegistry::new();
        let mut first = registry.subscribe("accountsChanged");
        let mut second = registry.subscribe("accountsChanged");

        let delivered = registry.emit("accountsChanged", json!(["0xf39f"]));

        assert_eq!(delivered, 2);
        assert_eq!(first.recv().await, Some(json!(["0xf39f"])));
        assert_eq!(second.recv().await, Some(json!(["0xf39f"])));
    }

    #[test]
    fn test_emit_without_listeners() {
        let registry = SubscriptionRegistry::new();
        assert_eq!(registry.emit("chainChanged", json!("0x1")), 0);
    }

    #[test]
    fn test_remove_listener() {
        let registry = SubscriptionRegistry::new();
        let keep = registry.subscribe("eth_subscription");
        let drop_me = registry.subscribe("eth_subscription");

        assert!(registry.remove("eth_subscription", drop_me.id()));
        assert!(!registry.remove("eth_subscription", drop_me.id()));
        assert_eq!(registry.listener_count("eth_subscription"), 1);

        assert!(registry.remove("eth_subscription", keep.id()));
        assert!(registry.events().is_empty());
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let registry = SubscriptionRegistry::new();
        let mut live = registry.subscribe("eth_subscription");
        let dead = registry.subscribe("eth_subscription");
        drop(dead);

        assert_eq!(registry.emit("eth_subscription", json!(1)), 1);
        assert_eq!(registry.listener_count("eth_subscription"), 1);
        assert_eq!(live.try_recv(), Some(json!(1)));
    }

    #[test]
    fn test_listener_ids_unique() {
        let registry = SubscriptionRegistry::new();
        let a = registry.subscribe("a");
        let b = registry.subscribe("b");

        assert_ne!(a.id(), b.id());
        assert_eq!(a.event(), "a");

        let mut events = registry.events();
        events.sort();
        assert_eq!(events, vec!["a".to_string(), "b".to_string()]);
    }
}
