//! Document stores that live inside the process.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::document::{merge_fields, DocumentStore, ListQuery, RemoteDocument};
use crate::errors::{Error, Result};

#[derive(Debug, Clone)]
struct StoredDocument {
    fields: Value,
    create_time: DateTime<Utc>,
    sequence: u64,
}

/// Document store backed by a map, with an online switch to simulate
/// outages.
#[derive(Debug)]
pub struct InMemoryDocumentStore {
    documents: Mutex<BTreeMap<String, StoredDocument>>,
    online: AtomicBool,
    next_sequence: AtomicU64,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(BTreeMap::new()),
            online: AtomicBool::new(true),
            next_sequence: AtomicU64::new(0),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.documents.lock().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_online(&self) -> Result<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::remote_unavailable("in-memory remote is offline"))
        }
    }

    fn documents(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, StoredDocument>>> {
        self.documents
            .lock()
            .map_err(|_| Error::remote_unavailable("in-memory remote lock poisoned"))
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn document_id(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

fn to_remote(path: &str, stored: &StoredDocument) -> RemoteDocument {
    RemoteDocument {
        id: document_id(path).to_string(),
        fields: stored.fields.clone(),
        create_time: stored.create_time,
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn merge_document(&self, path: &str, fields: Value) -> Result<()> {
        self.ensure_online()?;
        let mut documents = self.documents()?;
        match documents.get_mut(path) {
            Some(existing) => merge_fields(&mut existing.fields, fields),
            None => {
                let mut created = Value::Object(serde_json::Map::new());
                merge_fields(&mut created, fields);
                documents.insert(
                    path.to_string(),
                    StoredDocument {
                        fields: created,
                        create_time: Utc::now(),
                        sequence: self.next_sequence.fetch_add(1, Ordering::SeqCst),
                    },
                );
            }
        }
        Ok(())
    }

    async fn delete_document(&self, path: &str) -> Result<()> {
        self.ensure_online()?;
        self.documents()?.remove(path);
        Ok(())
    }

    async fn get_document(&self, path: &str) -> Result<Option<RemoteDocument>> {
        self.ensure_online()?;
        Ok(self.documents()?.get(path).map(|doc| to_remote(path, doc)))
    }

    async fn list_documents(
        &self,
        collection_path: &str,
        query: ListQuery,
    ) -> Result<Vec<RemoteDocument>> {
        self.ensure_online()?;
        let documents = self.documents()?;
        let mut matching: Vec<_> = documents
            .iter()
            .filter(|(path, _)| parent_of(path) == collection_path)
            .collect();
        matching.sort_by_key(|(_, doc)| (doc.create_time, doc.sequence));
        if query.newest_first {
            matching.reverse();
        }
        Ok(matching
            .into_iter()
            .take(query.limit)
            .map(|(path, doc)| to_remote(path, doc))
            .collect())
    }
}

/// Stand-in used when no remote endpoint is configured. Every call fails
/// with `RemoteUnavailable`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredDocumentStore;

impl UnconfiguredDocumentStore {
    fn fail<T>() -> Result<T> {
        Err(Error::remote_unavailable("remote sync is not configured"))
    }
}

#[async_trait]
impl DocumentStore for UnconfiguredDocumentStore {
    async fn merge_document(&self, _path: &str, _fields: Value) -> Result<()> {
        Self::fail()
    }

    async fn delete_document(&self, _path: &str) -> Result<()> {
        Self::fail()
    }

    async fn get_document(&self, _path: &str) -> Result<Option<RemoteDocument>> {
        Self::fail()
    }

    async fn list_documents(
        &self,
        _collection_path: &str,
        _query: ListQuery,
    ) -> Result<Vec<RemoteDocument>> {
        Self::fail()
    }
}
