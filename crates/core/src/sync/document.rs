//! Remote document store contract and per-user path layout.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Error, Result};

/// Top-level collection holding one document per user.
pub const USERS_COLLECTION: &str = "users";

/// A document as returned by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    pub id: String,
    pub fields: Value,
    pub create_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub limit: usize,
    /// Order by document creation time, newest first. Oldest first otherwise.
    pub newest_first: bool,
}

impl ListQuery {
    pub fn newest(limit: usize) -> Self {
        Self {
            limit,
            newest_first: true,
        }
    }
}

/// Hierarchical JSON document store (`collection/doc/collection/doc`).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Deep-merge `fields` into the document, creating it if needed. A `null`
    /// leaf overwrites the existing value.
    async fn merge_document(&self, path: &str, fields: Value) -> Result<()>;

    /// Delete the document. Deleting a missing document succeeds.
    async fn delete_document(&self, path: &str) -> Result<()>;

    async fn get_document(&self, path: &str) -> Result<Option<RemoteDocument>>;

    /// Documents directly inside `collection_path`.
    async fn list_documents(
        &self,
        collection_path: &str,
        query: ListQuery,
    ) -> Result<Vec<RemoteDocument>>;
}

fn segment(value: &str, what: &str) -> Result<()> {
    if value.is_empty() || value.contains('/') {
        return Err(Error::invalid_request(format!(
            "invalid {} '{}' for a document path",
            what, value
        )));
    }
    Ok(())
}

/// `users/{uid}`
pub fn user_document_path(uid: &str) -> Result<String> {
    segment(uid, "user id")?;
    Ok(format!("{}/{}", USERS_COLLECTION, uid))
}

/// `users/{uid}/{collection}`
pub fn user_collection_path(uid: &str, collection: &str) -> Result<String> {
    segment(collection, "collection")?;
    Ok(format!("{}/{}", user_document_path(uid)?, collection))
}

/// `users/{uid}/{collection}/{id}`
pub fn record_document_path(uid: &str, collection: &str, id: &str) -> Result<String> {
    segment(id, "record id")?;
    Ok(format!("{}/{}", user_collection_path(uid, collection)?, id))
}

/// Merge `patch` into `target` the way [`DocumentStore::merge_document`]
/// specifies: objects merge key by key, everything else replaces.
pub fn merge_fields(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) if slot.is_object() && value.is_object() => {
                        merge_fields(slot, value)
                    }
                    _ => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn paths_follow_user_layout() {
        assert_eq!(user_document_path("u1").unwrap(), "users/u1");
        assert_eq!(
            record_document_path("u1", "weightRecords", "171").unwrap(),
            "users/u1/weightRecords/171"
        );
        assert!(user_document_path("").is_err());
        assert!(record_document_path("u1", "weightRecords", "a/b").is_err());
    }

    #[test]
    fn merge_is_deep_and_null_overwrites() {
        let mut doc = json!({"weightRecords": {"1": {"weight": 60}}, "name": "Ada"});
        merge_fields(&mut doc, json!({"weightRecords": {"2": {"weight": 61}}}));
        assert_eq!(doc["weightRecords"]["1"]["weight"], 60);
        assert_eq!(doc["weightRecords"]["2"]["weight"], 61);

        merge_fields(&mut doc, json!({"weightRecords": {"1": null}}));
        assert_eq!(doc["weightRecords"]["1"], Value::Null);
        assert_eq!(doc["name"], "Ada");
    }
}
