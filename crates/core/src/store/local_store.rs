//! Typed, fail-soft access to the primary key-value store.

use std::sync::Arc;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::backend::KeyValueBackend;
use super::keys::PROBE_KEY;
use crate::errors::{Error, Result};

/// JSON view over a [`KeyValueBackend`].
///
/// Public accessors never fail: reads fall back to the caller's default and
/// writes report `false`. Every public call probes the backend first; the
/// result of a probe is never cached.
#[derive(Clone)]
pub struct LocalStore {
    backend: Arc<dyn KeyValueBackend>,
}

impl LocalStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> Arc<dyn KeyValueBackend> {
        Arc::clone(&self.backend)
    }

    /// Write and delete a throwaway key. Any error marks the store unavailable
    /// for the current call only.
    pub fn is_available(&self) -> bool {
        self.probe().is_ok()
    }

    fn probe(&self) -> Result<()> {
        self.backend.set_item(PROBE_KEY, PROBE_KEY)?;
        self.backend.remove_item(PROBE_KEY)
    }

    /// Parsed value for `key`, or `default` when absent, unreadable or
    /// unparsable.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.try_get(key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(err) => {
                warn!("[Store] get '{}' fell back to default: {}", key, err);
                default
            }
        }
    }

    /// Serialize, write, read back and compare. `true` only on an exact match.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        match self.try_set(key, value) {
            Ok(()) => true,
            Err(err) => {
                warn!("[Store] set '{}' failed: {}", key, err);
                false
            }
        }
    }

    /// Delete `key`. `true` unless the store is unavailable.
    pub fn remove(&self, key: &str) -> bool {
        let result = self.probe().and_then(|_| self.backend.remove_item(key));
        match result {
            Ok(()) => true,
            Err(err) => {
                warn!("[Store] remove '{}' failed: {}", key, err);
                false
            }
        }
    }

    /// Serialized string stored under `key`.
    pub fn get_raw(&self, key: &str) -> Option<String> {
        match self.probe().and_then(|_| self.backend.get_item(key)) {
            Ok(value) => value,
            Err(err) => {
                warn!("[Store] raw read of '{}' failed: {}", key, err);
                None
            }
        }
    }

    /// Write an already-serialized value verbatim, with the same write-verify
    /// rule as [`LocalStore::set`].
    pub fn set_raw(&self, key: &str, raw: &str) -> bool {
        match self.probe().and_then(|_| self.write_verified(key, raw)) {
            Ok(()) => true,
            Err(err) => {
                warn!("[Store] raw write of '{}' failed: {}", key, err);
                false
            }
        }
    }

    /// Keys currently present, empty when the store is unavailable.
    pub fn keys(&self) -> Vec<String> {
        match self.probe().and_then(|_| self.backend.keys()) {
            Ok(keys) => keys,
            Err(err) => {
                warn!("[Store] listing keys failed: {}", err);
                Vec::new()
            }
        }
    }

    /// Error-surfacing read used by layers that need to tell "absent" from
    /// "broken".
    pub fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.probe()?;
        match self.backend.get_item(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Error-surfacing write with read-back verification.
    pub fn try_set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.probe()?;
        let raw = serde_json::to_string(value)?;
        self.write_verified(key, &raw)
    }

    fn write_verified(&self, key: &str, raw: &str) -> Result<()> {
        self.backend.set_item(key, raw)?;
        match self.backend.get_item(key)? {
            Some(stored) if stored == raw => {
                debug!("[Store] wrote '{}' ({} bytes)", key, raw.len());
                Ok(())
            }
            _ => Err(Error::WriteVerification(key.to_string())),
        }
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("origin", &self.backend.origin())
            .finish()
    }
}
