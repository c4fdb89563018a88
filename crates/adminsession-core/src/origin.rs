//! Origins and tabs.
//!
//! An `Origin` is the shared environment several tabs of the dashboard run
//! in: one persistent store plus two broadcast channels, one carrying
//! storage change events and one carrying custom signals such as
//! `auth:logout`. Each `Tab` owns its own transient store and visibility
//! flag. Events published by a tab are delivered to every other tab of the
//! same origin, never back to the publisher.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::storage::{KeyValueStore, MemoryStore};

/// Capacity of the origin's broadcast channels.
/// Storage writes come in bursts of three keys at most; 64 leaves headroom
/// for slow tabs before they start lagging.
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(u64);

impl TabId {
    fn random() -> Self {
        Self(rand::random())
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A change to the persistent store made by some tab.
#[derive(Clone)]
pub struct StorageEvent {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub source: TabId,
}

impl StorageEvent {
    /// True when the key was deleted without a replacement value
    pub fn is_removal(&self) -> bool {
        self.new_value.is_none()
    }
}

// Values may hold credentials, so they stay out of Debug output
impl fmt::Debug for StorageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageEvent")
            .field("key", &self.key)
            .field("removal", &self.is_removal())
            .field("source", &self.source)
            .finish()
    }
}

/// Same-origin custom signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Logout,
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Logout => "auth:logout",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SignalEnvelope {
    pub signal: Signal,
    pub source: TabId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

struct OriginInner {
    persistent: Arc<dyn KeyValueStore>,
    storage_events: broadcast::Sender<StorageEvent>,
    signals: broadcast::Sender<SignalEnvelope>,
}

/// Shared environment for tabs. Clone is cheap.
#[derive(Clone)]
pub struct Origin {
    inner: Arc<OriginInner>,
}

impl Origin {
    pub fn new(persistent: Arc<dyn KeyValueStore>) -> Self {
        let (storage_events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (signals, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(OriginInner {
                persistent,
                storage_events,
                signals,
            }),
        }
    }

    /// Origin backed by an in-memory persistent store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Open a new tab with an empty transient store, initially visible
    pub fn open_tab(&self) -> Tab {
        let id = TabId::random();
        debug!(tab = %id, "Opening tab");
        let (visibility, _) = watch::channel(Visibility::Visible);
        Tab {
            id,
            origin: self.clone(),
            transient: Arc::new(MemoryStore::new()),
            visibility: Arc::new(visibility),
        }
    }
}

/// One page instance. Clone shares the same tab.
#[derive(Clone)]
pub struct Tab {
    id: TabId,
    origin: Origin,
    transient: Arc<MemoryStore>,
    visibility: Arc<watch::Sender<Visibility>>,
}

impl Tab {
    pub fn id(&self) -> TabId {
        self.id
    }

    /// The origin's persistent store as seen from this tab. Changes made
    /// through it are announced to the other tabs.
    pub fn persistent(&self) -> Arc<dyn KeyValueStore> {
        Arc::new(ObservedStore {
            source: self.id,
            origin: self.origin.clone(),
        })
    }

    /// This tab's own transient store
    pub fn transient(&self) -> Arc<dyn KeyValueStore> {
        self.transient.clone()
    }

    /// Subscribe to persistent-store changes made by other tabs
    pub fn storage_events(&self) -> TabReceiver<StorageEvent> {
        TabReceiver {
            own: self.id,
            rx: self.origin.inner.storage_events.subscribe(),
        }
    }

    /// Subscribe to signals broadcast by other tabs
    pub fn signals(&self) -> TabReceiver<SignalEnvelope> {
        TabReceiver {
            own: self.id,
            rx: self.origin.inner.signals.subscribe(),
        }
    }

    /// Broadcast a signal to every other tab of the origin
    pub fn broadcast(&self, signal: Signal) {
        let envelope = SignalEnvelope {
            signal,
            source: self.id,
        };
        // No subscribers is fine
        let delivered = self.origin.inner.signals.send(envelope).unwrap_or(0);
        debug!(tab = %self.id, signal = signal.name(), delivered, "Broadcast signal");
    }

    pub fn set_visibility(&self, visibility: Visibility) {
        self.visibility.send_replace(visibility);
    }

    pub fn visibility(&self) -> watch::Receiver<Visibility> {
        self.visibility.subscribe()
    }
}

/// Anything published with a source tab
pub trait Sourced {
    fn source(&self) -> TabId;
}

impl Sourced for StorageEvent {
    fn source(&self) -> TabId {
        self.source
    }
}

impl Sourced for SignalEnvelope {
    fn source(&self) -> TabId {
        self.source
    }
}

/// Broadcast receiver that skips messages the owning tab published itself.
pub struct TabReceiver<T> {
    own: TabId,
    rx: broadcast::Receiver<T>,
}

impl<T: Clone + Sourced> TabReceiver<T> {
    /// Next message from another tab. `Err(Lagged)` reports skipped
    /// messages; `Err(Closed)` means the origin is gone.
    pub async fn recv(&mut self) -> Result<T, broadcast::error::RecvError> {
        loop {
            let message = self.rx.recv().await?;
            if message.source() != self.own {
                return Ok(message);
            }
        }
    }
}

/// Persistent store wrapper that publishes storage events on change.
struct ObservedStore {
    source: TabId,
    origin: Origin,
}

impl ObservedStore {
    fn publish(&self, key: &str, old_value: Option<String>, new_value: Option<String>) {
        let event = StorageEvent {
            key: key.to_string(),
            old_value,
            new_value,
            source: self.source,
        };
        let _ = self.origin.inner.storage_events.send(event);
    }
}

impl KeyValueStore for ObservedStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.origin.inner.persistent.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let store = &self.origin.inner.persistent;
        let old_value = store.get(key).ok().flatten();
        store.set(key, value)?;
        // Storage events only fire on an actual change
        if old_value.as_deref() != Some(value) {
            self.publish(key, old_value, Some(value.to_string()));
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let store = &self.origin.inner.persistent;
        let old_value = store.get(key).ok().flatten();
        let existed = store.remove(key)?;
        if existed {
            self.publish(key, old_value, None);
        }
        Ok(existed)
    }
}

// ============================================================================
// Tests
// ============================================================================
