//! Remote document sync for per-user record lists.

mod client;
mod document;
mod listener;
mod memory;
mod service;

pub use client::{RecordSyncClient, DEFAULT_FETCH_LIMIT};
pub use document::{
    merge_fields, record_document_path, user_collection_path, user_document_path, DocumentStore,
    ListQuery, RemoteDocument, USERS_COLLECTION,
};
pub use listener::spawn_initial_fetch;
pub use memory::{InMemoryDocumentStore, UnconfiguredDocumentStore};
pub use service::{RecordSyncService, SyncOutcome};
