//! Socket connection lifecycle
//!
//! The socket transport does not run a reconnect loop. A dropped connection
//! moves it to `Disconnected`; the next call reconnects before sending.
//!
//! ```text
//! Disconnected → Connecting → Connected
//!      ↑              │           │
//!      └──────────────┴───────────┘   (connect failed / connection dropped)
//!
//! any state ── close() ──→ Closed      (terminal)
//! ```

use std::sync::RwLock;

/// Connection state of a socket transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live connection; the next call connects
    Disconnected,
    /// A connect is in progress
    Connecting,
    /// A live connection is available
    Connected,
    /// Explicitly closed; every later call fails
    Closed,
}

impl ConnectionState {
    /// Gauge value recorded in metrics
    pub fn as_metric(&self) -> i64 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Closed => 3,
        }
    }
}

/// Shared, synchronously readable connection state
#[derive(Debug)]
pub(crate) struct ConnectionStatus {
    state: RwLock<ConnectionState>,
}

impl ConnectionStatus {
    pub(crate) fn new() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
        }
    }

    pub(crate) fn get(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Move to `next` unless already `Closed`; returns whether the state changed
    pub(crate) fn transition(&self, next: ConnectionState) -> bool {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if *state == ConnectionState::Closed || *state == next {
            return false;
        }
        *state = next;
        true
    }

    /// Move to `Closed` unconditionally
    pub(crate) fn close(&self) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = ConnectionState::Closed;
    }
}
