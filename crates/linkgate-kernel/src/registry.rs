//! Integration registry.
//!
//! Adapters hand the host a value implementing the authorization contract,
//! the callback contract, or both; the host keeps them here keyed by adapter
//! id. Nothing is installed globally: whoever holds the registry can reach an
//! integration, nobody else can.
//!
//! Internally the registry is backed by [`DashMap`], so it can be shared
//! across tasks without a global `RwLock`.
//!
//! # Example
//!
//! ```rust
//! # use std::sync::Arc;
//! # use linkgate_bridge::{CallbackRegistration, EventBridge};
//! # use linkgate_kernel::registry::IntegrationRegistry;
//! let registry = IntegrationRegistry::new();
//! let source = CallbackRegistration::builder("echo")
//!     .handle(|_event| async { Ok(None) })
//!     .build()
//!     .unwrap();
//! registry.register_callbacks("echo", EventBridge::new(Arc::new(source)));
//!
//! assert!(registry.bridge("echo").is_ok());
//! assert!(registry.authorization("echo").is_err());
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use linkgate_auth_engine::AuthorizationProvider;
use linkgate_bridge::EventBridge;
use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Snapshot of what an adapter registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationInfo {
    pub id: String,
    /// When the adapter first registered anything.
    pub registered_at: DateTime<Utc>,
    pub authorization: bool,
    pub refresh: bool,
    pub callbacks: bool,
    pub install: bool,
    pub poll: bool,
}

#[derive(Clone)]
struct Entry {
    registered_at: DateTime<Utc>,
    authorization: Option<Arc<dyn AuthorizationProvider>>,
    bridge: Option<EventBridge>,
}

impl Entry {
    fn new() -> Self {
        Self {
            registered_at: Utc::now(),
            authorization: None,
            bridge: None,
        }
    }

    fn info(&self, id: &str) -> IntegrationInfo {
        IntegrationInfo {
            id: id.to_string(),
            registered_at: self.registered_at,
            authorization: self.authorization.is_some(),
            refresh: self
                .authorization
                .as_ref()
                .is_some_and(|p| p.supports_refresh()),
            callbacks: self.bridge.is_some(),
            install: self.bridge.as_ref().is_some_and(EventBridge::supports_install),
            poll: self.bridge.as_ref().is_some_and(EventBridge::supports_poll),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Concurrent integration registry backed by [`DashMap`].
///
/// Cheaply cloneable (`Arc`-backed) and `Send + Sync`.
#[derive(Clone, Default)]
pub struct IntegrationRegistry {
    inner: Arc<DashMap<String, Entry>>,
}

impl IntegrationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the authorization side of an adapter, replacing any earlier
    /// provider under the same id.
    pub fn register_authorization(
        &self,
        id: impl Into<String>,
        provider: Arc<dyn AuthorizationProvider>,
    ) {
        let id = id.into();
        tracing::info!(
            adapter_id = %id,
            provider = %provider.id(),
            refresh = provider.supports_refresh(),
            "authorization provider registered"
        );
        self.inner
            .entry(id)
            .or_insert_with(Entry::new)
            .authorization = Some(provider);
    }

    /// Register the callback side of an adapter, replacing any earlier
    /// bridge under the same id.
    pub fn register_callbacks(&self, id: impl Into<String>, bridge: EventBridge) {
        let id = id.into();
        tracing::info!(
            adapter_id = %id,
            source = %bridge.source_id(),
            install = bridge.supports_install(),
            poll = bridge.supports_poll(),
            "callbacks registered"
        );
        self.inner.entry(id).or_insert_with(Entry::new).bridge = Some(bridge);
    }

    pub fn authorization(&self, id: &str) -> Result<Arc<dyn AuthorizationProvider>> {
        let entry = self.entry(id)?;
        entry
            .authorization
            .clone()
            .ok_or_else(|| KernelError::NotRegistered {
                adapter_id: id.to_string(),
                capability: "authorization provider",
            })
    }

    pub fn bridge(&self, id: &str) -> Result<EventBridge> {
        let entry = self.entry(id)?;
        entry.bridge.clone().ok_or_else(|| KernelError::NotRegistered {
            adapter_id: id.to_string(),
            capability: "callbacks",
        })
    }

    pub fn get(&self, id: &str) -> Result<IntegrationInfo> {
        Ok(self.entry(id)?.info(id))
    }

    /// Snapshot of every registered adapter, sorted by id.
    pub fn list(&self) -> Vec<IntegrationInfo> {
        let mut all: Vec<IntegrationInfo> = self
            .inner
            .iter()
            .map(|e| e.value().info(e.key()))
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Remove an adapter entirely. Returns its last snapshot if it existed.
    pub fn unregister(&self, id: &str) -> Option<IntegrationInfo> {
        let removed = self.inner.remove(id).map(|(key, entry)| entry.info(&key));
        if removed.is_some() {
            tracing::info!(adapter_id = %id, "adapter unregistered");
        }
        removed
    }

    pub fn count(&self) -> usize {
        self.inner.len()
    }

    fn entry(&self, id: &str) -> Result<Entry> {
        self.inner
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| KernelError::AdapterNotFound {
                adapter_id: id.to_string(),
            })
    }
}

impl std::fmt::Debug for IntegrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationRegistry")
            .field("count", &self.inner.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
