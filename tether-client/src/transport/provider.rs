//! Forwarding to an injected EIP-1193 provider
//!
//! The host application (a wallet, a browser bridge, a test double) supplies an
//! [`Eip1193Provider`]. Calls are forwarded as `{method, params}` and whatever the
//! provider raises is run through the error mapper, so callers see the same
//! [`Error`] taxonomy as with the network transports.

use super::{Transport, TransportKind};
use crate::subscription::{ListenerHandle, ListenerId, Subscription};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tether_core::{Error, ProviderError, RawFailure, Result, RpcRequest};

/// Event fired by a provider when the exposed accounts change
pub const ACCOUNTS_CHANGED: &str = "accountsChanged";

/// Wallet methods that change or reveal user state
///
/// These are tagged in logs; they are forwarded like any other method.
pub const ADMIN_METHODS: &[&str] = &[
    "eth_requestAccounts",
    "eth_accounts",
    "wallet_switchEthereumChain",
    "wallet_addEthereumChain",
    "wallet_watchAsset",
    "wallet_getPermissions",
    "wallet_requestPermissions",
    "personal_sign",
];

/// A host-supplied EIP-1193 provider
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    /// Perform a request; the error is whatever the provider raised
    async fn request(&self, request: &RpcRequest) -> std::result::Result<Value, ProviderError>;

    /// Deliver payloads of `event` to `handle` until it is removed or closed
    fn on(&self, event: &str, handle: ListenerHandle);

    /// Stop delivering `event` to the listener with `id`
    fn remove_listener(&self, event: &str, id: ListenerId);
}

/// Transport backed by an injected provider
pub struct ProviderTransport {
    provider: Arc<dyn Eip1193Provider>,
}

impl ProviderTransport {
    /// Wrap a host provider; nothing is called until the first request
    pub fn new(provider: Arc<dyn Eip1193Provider>) -> Self {
        Self { provider }
    }

    /// Whether `method` is one of [`ADMIN_METHODS`]
    pub fn is_admin_method(method: &str) -> bool {
        ADMIN_METHODS.contains(&method)
    }

    /// Subscribe to a provider event
    pub async fn subscribe(&self, event: &str) -> Result<Subscription> {
        let (handle, subscription) = ListenerHandle::channel(event);
        self.provider.on(event, handle);
        tracing::debug!(event, listener = subscription.id().as_u64(), "Listener registered");
        Ok(subscription)
    }

    /// Subscribe to [`ACCOUNTS_CHANGED`]
    pub async fn on_accounts_changed(&self) -> Result<Subscription> {
        self.subscribe(ACCOUNTS_CHANGED).await
    }

    /// Remove the provider listener behind `subscription`
    pub async fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.provider
            .remove_listener(subscription.event(), subscription.id());
        true
    }
}

impl fmt::Debug for ProviderTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for ProviderTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Provider
    }

    async fn request(&self, request: &RpcRequest) -> Result<Value> {
        let admin = Self::is_admin_method(&request.method);
        tracing::debug!(method = %request.method, admin, "Forwarding to provider");

        match self.provider.request(request).await {
            Ok(value) => Ok(value),
            Err(raised) => {
                let error = Error::from(RawFailure::Provider(raised));
                tracing::debug!(method = %request.method, admin, error = %error, "Provider request failed");
                Err(error)
            }
        }
    }
}
