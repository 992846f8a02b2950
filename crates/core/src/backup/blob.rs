//! Point-in-time copy of the important keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::store::LocalStore;

/// Important key → serialized value, exactly as found in the primary store.
///
/// Persisted as a flat JSON object so any reader of the backup slot sees
/// `{"dueDate": "\"2024-09-01\"", ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackupBlob(BTreeMap<String, String>);

impl BackupBlob {
    /// Copy every listed key that currently holds a value. Absent keys are
    /// left out of the blob.
    pub fn capture<K: AsRef<str>>(store: &LocalStore, keys: &[K]) -> Self {
        let entries = keys
            .iter()
            .filter_map(|key| {
                let key = key.as_ref();
                store.get_raw(key).map(|value| (key.to_string(), value))
            })
            .collect();
        Self(entries)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Backed-up keys that no longer have a value in `store`.
    pub fn missing_from(&self, store: &LocalStore) -> Vec<String> {
        self.0
            .keys()
            .filter(|key| store.get_raw(key).is_none())
            .cloned()
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
