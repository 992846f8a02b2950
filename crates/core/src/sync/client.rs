//! Per-user record synchronization against a [`DocumentStore`].

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::{json, Value};

use super::document::{
    record_document_path, user_collection_path, user_document_path, DocumentStore, ListQuery,
    RemoteDocument,
};
use crate::errors::Result;
use crate::records::{
    dedupe_by_id, load_records, merge_remote_records, store_records, TrackedRecord,
};
use crate::store::LocalStore;

/// Documents fetched per kind and refresh.
pub const DEFAULT_FETCH_LIMIT: usize = 50;

/// Pushes and pulls record lists between the local store and the user's
/// remote collections.
///
/// Every record lives twice remotely: as `<collection>.<id>` inside
/// `users/{uid}` and as its own document `users/{uid}/<collection>/<id>`.
/// Fetches read the sub-collection only.
#[derive(Clone)]
pub struct RecordSyncClient {
    remote: Arc<dyn DocumentStore>,
    store: LocalStore,
    fetch_limit: usize,
}

impl RecordSyncClient {
    pub fn new(remote: Arc<dyn DocumentStore>, store: LocalStore) -> Self {
        Self {
            remote,
            store,
            fetch_limit: DEFAULT_FETCH_LIMIT,
        }
    }

    pub fn with_fetch_limit(mut self, limit: usize) -> Self {
        self.fetch_limit = limit.max(1);
        self
    }

    pub fn fetch_limit(&self) -> usize {
        self.fetch_limit
    }

    /// Merge the newest remote records into the local list and return it.
    /// Remote copies win on id conflicts; records that only exist locally
    /// (unsynced writes) are kept. On any remote failure the local list is
    /// left alone and returned.
    pub async fn fetch_for_user<R: TrackedRecord>(&self, uid: &str) -> Vec<R> {
        match self.try_fetch::<R>(uid).await {
            Ok(fetched) => {
                let fetched_count = fetched.len();
                let records = merge_remote_records(fetched, load_records(&self.store));
                if !store_records(&self.store, &records) {
                    warn!(
                        "[RecordSync] fetched {} {} records but the local write failed",
                        fetched_count,
                        R::KIND
                    );
                }
                info!(
                    "[RecordSync] fetched {} {} records for {}, {} held locally",
                    fetched_count,
                    R::KIND,
                    uid,
                    records.len()
                );
                records
            }
            Err(err) => {
                warn!("[RecordSync] fetch of {} records failed: {}", R::KIND, err);
                load_records(&self.store)
            }
        }
    }

    /// Write `record` to both remote locations. `true` only if both succeed.
    pub async fn save<R: TrackedRecord>(&self, uid: &str, record: &R) -> bool {
        match self.try_save(uid, record).await {
            Ok(()) => {
                debug!("[RecordSync] saved {} record {}", R::KIND, record.id());
                true
            }
            Err(err) => {
                warn!(
                    "[RecordSync] save of {} record {} failed: {}",
                    R::KIND,
                    record.id(),
                    err
                );
                false
            }
        }
    }

    /// Null the embedded copy and delete the standalone document.
    pub async fn delete<R: TrackedRecord>(&self, uid: &str, id: &str) -> bool {
        match self.try_delete::<R>(uid, id).await {
            Ok(()) => {
                debug!("[RecordSync] deleted {} record {}", R::KIND, id);
                true
            }
            Err(err) => {
                warn!(
                    "[RecordSync] delete of {} record {} failed: {}",
                    R::KIND,
                    id,
                    err
                );
                false
            }
        }
    }

    async fn try_fetch<R: TrackedRecord>(&self, uid: &str) -> Result<Vec<R>> {
        let collection = user_collection_path(uid, R::KIND.remote_collection())?;
        let documents = self
            .remote
            .list_documents(&collection, ListQuery::newest(self.fetch_limit))
            .await?;
        let records = documents
            .into_iter()
            .filter_map(|doc| decode_document::<R>(doc))
            .collect();
        Ok(dedupe_by_id(records))
    }

    async fn try_save<R: TrackedRecord>(&self, uid: &str, record: &R) -> Result<()> {
        let collection = R::KIND.remote_collection();
        let user_doc = user_document_path(uid)?;
        let record_doc = record_document_path(uid, collection, record.id())?;
        let value = serde_json::to_value(record)?;

        let embedded = json!({ collection: { record.id(): value.clone() } });
        let (by_field, by_document) = tokio::join!(
            self.remote.merge_document(&user_doc, embedded),
            self.remote.merge_document(&record_doc, value),
        );
        by_field.and(by_document)
    }

    async fn try_delete<R: TrackedRecord>(&self, uid: &str, id: &str) -> Result<()> {
        let collection = R::KIND.remote_collection();
        let user_doc = user_document_path(uid)?;
        let record_doc = record_document_path(uid, collection, id)?;

        let nulled = json!({ collection: { id: Value::Null } });
        let (by_field, by_document) = tokio::join!(
            self.remote.merge_document(&user_doc, nulled),
            self.remote.delete_document(&record_doc),
        );
        by_field.and(by_document)
    }
}

/// Parse a remote document, filling `id` from the document name when the
/// fields lack it.
fn decode_document<R: TrackedRecord>(doc: RemoteDocument) -> Option<R> {
    let RemoteDocument { id, mut fields, .. } = doc;
    if let Value::Object(map) = &mut fields {
        map.entry("id").or_insert_with(|| Value::String(id.clone()));
    }
    match serde_json::from_value(fields) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!(
                "[RecordSync] skipping unreadable {} document {}: {}",
                R::KIND,
                id,
                err
            );
            None
        }
    }
}
