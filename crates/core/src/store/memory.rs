//! In-memory key-value backend.
//!
//! Serves as the session-scoped backup mirror (its contents die with the
//! process) and as the primary store in tests. Sibling handles share one map
//! and one change feed, so a write through one handle is reported to
//! subscribers as coming from another origin.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use uuid::Uuid;

use super::backend::{ChangeHub, KeyValueBackend, StoreEvent};
use crate::errors::{Error, Result};

#[derive(Debug)]
struct MemoryShared {
    entries: RwLock<BTreeMap<String, String>>,
    hub: ChangeHub,
    available: AtomicBool,
    emits_events: bool,
}

#[derive(Debug, Clone)]
pub struct MemoryBackend {
    origin: Uuid,
    shared: Arc<MemoryShared>,
}

impl MemoryBackend {
    /// Empty store with a change feed.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Empty store that reports no change feed, forcing poll-based watchers.
    pub fn without_change_feed() -> Self {
        Self::build(false)
    }

    fn build(emits_events: bool) -> Self {
        Self {
            origin: Uuid::new_v4(),
            shared: Arc::new(MemoryShared {
                entries: RwLock::new(BTreeMap::new()),
                hub: ChangeHub::new(),
                available: AtomicBool::new(true),
                emits_events,
            }),
        }
    }

    /// Another handle onto the same contents with its own origin.
    pub fn open_sibling(&self) -> Self {
        Self {
            origin: Uuid::new_v4(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Simulate the store disappearing (quota exhausted, private mode, ...).
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.shared.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::store_unavailable("memory store is disabled"))
        }
    }

    fn publish(&self, event: StoreEvent) {
        if self.shared.emits_events {
            self.shared.hub.publish(event);
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> Error {
    Error::store_unavailable("memory store lock poisoned")
}

impl KeyValueBackend for MemoryBackend {
    fn origin(&self) -> Uuid {
        self.origin
    }

    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.ensure_available()?;
        let entries = self.shared.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_available()?;
        let old_value = {
            let mut entries = self.shared.entries.write().map_err(|_| poisoned())?;
            entries.insert(key.to_string(), value.to_string())
        };
        self.publish(StoreEvent::key_changed(
            self.origin,
            key,
            old_value,
            Some(value.to_string()),
        ));
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.ensure_available()?;
        let old_value = {
            let mut entries = self.shared.entries.write().map_err(|_| poisoned())?;
            entries.remove(key)
        };
        if old_value.is_some() {
            self.publish(StoreEvent::key_changed(self.origin, key, old_value, None));
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.ensure_available()?;
        self.shared.entries.write().map_err(|_| poisoned())?.clear();
        self.publish(StoreEvent::cleared(self.origin));
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.ensure_available()?;
        let entries = self.shared.entries.read().map_err(|_| poisoned())?;
        Ok(entries.keys().cloned().collect())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<StoreEvent>> {
        self.shared.emits_events.then(|| self.shared.hub.subscribe())
    }
}
