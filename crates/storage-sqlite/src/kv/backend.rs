//! Durable primary store: one row per key in `kv_entries`.

use std::sync::Arc;

use chrono::Utc;
use diesel::prelude::*;
use log::debug;
use tokio::sync::broadcast;
use uuid::Uuid;

use bloomtrack_core::store::{ChangeHub, KeyValueBackend, StoreEvent};
use bloomtrack_core::Result;

use super::model::KvEntryDB;
use crate::db::{create_pool, get_connection, init, run_migrations, DbPool};
use crate::errors::StorageError;
use crate::schema::kv_entries;
use crate::schema::kv_entries::dsl::*;

/// An opened database. Handles created from one `SqliteStore` share its
/// change feed; writes from other processes are not observed.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Arc<DbPool>,
    hub: ChangeHub,
}

impl SqliteStore {
    /// Create the data directory if needed, migrate and open a pool.
    pub fn open(app_data_dir: &str) -> Result<Self> {
        let db_path = init(app_data_dir)?;
        run_migrations(&db_path)?;
        let pool = create_pool(&db_path)?;
        debug!("[Store] opened {}", db_path);
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: Arc<DbPool>) -> Self {
        Self {
            pool,
            hub: ChangeHub::new(),
        }
    }

    /// A new handle with its own origin.
    pub fn open_handle(&self) -> SqliteKeyValueBackend {
        SqliteKeyValueBackend {
            origin: Uuid::new_v4(),
            pool: Arc::clone(&self.pool),
            hub: self.hub.clone(),
        }
    }
}

pub struct SqliteKeyValueBackend {
    origin: Uuid,
    pool: Arc<DbPool>,
    hub: ChangeHub,
}

fn current_value(conn: &mut SqliteConnection, key: &str) -> QueryResult<Option<String>> {
    kv_entries
        .find(key)
        .select(entry_value)
        .first::<String>(conn)
        .optional()
}

impl KeyValueBackend for SqliteKeyValueBackend {
    fn origin(&self) -> Uuid {
        self.origin
    }

    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let mut conn = get_connection(&self.pool)?;
        Ok(current_value(&mut conn, key).map_err(StorageError::from)?)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;
        let now = Utc::now().to_rfc3339();
        let row = KvEntryDB {
            entry_key: key.to_string(),
            entry_value: value.to_string(),
            updated_at: now.clone(),
        };
        let old_value = conn
            .transaction::<_, StorageError, _>(|conn| {
                let old_value = current_value(conn, key)?;
                diesel::insert_into(kv_entries::table)
                    .values(&row)
                    .on_conflict(entry_key)
                    .do_update()
                    .set((entry_value.eq(value), updated_at.eq(now)))
                    .execute(conn)?;
                Ok(old_value)
            })?;
        self.hub.publish(StoreEvent::key_changed(
            self.origin,
            key,
            old_value,
            Some(value.to_string()),
        ));
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;
        let old_value = conn.transaction::<_, StorageError, _>(|conn| {
            let old_value = current_value(conn, key)?;
            diesel::delete(kv_entries.find(key)).execute(conn)?;
            Ok(old_value)
        })?;
        if old_value.is_some() {
            self.hub
                .publish(StoreEvent::key_changed(self.origin, key, old_value, None));
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;
        let removed = diesel::delete(kv_entries::table)
            .execute(&mut conn)
            .map_err(StorageError::from)?;
        debug!("[Store] cleared {} entries", removed);
        self.hub.publish(StoreEvent::cleared(self.origin));
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut conn = get_connection(&self.pool)?;
        Ok(kv_entries
            .select(entry_key)
            .order(entry_key.asc())
            .load::<String>(&mut conn)
            .map_err(StorageError::from)?)
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<StoreEvent>> {
        Some(self.hub.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloomtrack_core::backup::{BackupWatcher, WatcherConfig};
    use bloomtrack_core::records::{load_records, upsert_record, WeightRecord};
    use bloomtrack_core::store::{LocalStore, MemoryBackend, StoreChange, BACKUP_SLOT_KEY};
    use chrono::NaiveDate;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::tempdir;

    fn open_store(dir: &tempfile::TempDir) -> SqliteStore {
        SqliteStore::open(&dir.path().to_string_lossy()).expect("open store")
    }

    #[test]
    fn values_survive_reopening() {
        let dir = tempdir().expect("tempdir");
        {
            let store = LocalStore::new(Arc::new(open_store(&dir).open_handle()));
            assert!(store.set("dueDate", "2024-09-01"));
            assert!(store.set("userSettings", &json!({"units": "metric"})));
        }
        let store = LocalStore::new(Arc::new(open_store(&dir).open_handle()));
        assert_eq!(store.get("dueDate", String::new()), "2024-09-01");
        assert_eq!(store.get("userSettings", json!(null))["units"], "metric");
        assert_eq!(store.keys(), vec!["dueDate".to_string(), "userSettings".to_string()]);
    }

    #[test]
    fn overwrite_and_remove() {
        let dir = tempdir().expect("tempdir");
        let store = LocalStore::new(Arc::new(open_store(&dir).open_handle()));
        assert!(store.set("cycleLength", &28));
        assert!(store.set("cycleLength", &30));
        assert_eq!(store.get("cycleLength", 0u32), 30);
        assert!(store.remove("cycleLength"));
        assert!(store.remove("cycleLength"));
        assert_eq!(store.get_raw("cycleLength"), None);
        assert!(store.is_available());
    }

    #[test]
    fn handles_share_one_feed_with_distinct_origins() {
        let dir = tempdir().expect("tempdir");
        let sqlite = open_store(&dir);
        let first = sqlite.open_handle();
        let second = sqlite.open_handle();
        let mut rx = first.subscribe().expect("feed");

        second.set_item("dueDate", "\"2024-09-01\"").unwrap();
        second.clear().unwrap();

        let write = rx.try_recv().unwrap();
        assert_eq!(write.origin, second.origin());
        assert_ne!(write.origin, first.origin());
        assert_eq!(rx.try_recv().unwrap().change, StoreChange::Cleared);
        assert_eq!(first.get_item("dueDate").unwrap(), None);
    }

    #[test]
    fn record_lists_round_trip() {
        let dir = tempdir().expect("tempdir");
        let store = LocalStore::new(Arc::new(open_store(&dir).open_handle()));
        let record = WeightRecord {
            id: "1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            weight: 60.0,
            note: String::new(),
        };
        assert!(upsert_record(&store, record.clone()));
        assert_eq!(load_records::<WeightRecord>(&store), vec![record]);
    }

    #[tokio::test]
    async fn watcher_restores_a_clear_from_another_handle() {
        let dir = tempdir().expect("tempdir");
        let sqlite = open_store(&dir);
        let primary = LocalStore::new(Arc::new(sqlite.open_handle()));
        let other_tab = sqlite.open_handle();
        let session = LocalStore::new(Arc::new(MemoryBackend::new()));

        let records = json!([{"id": "1", "date": "2024-01-01", "weight": 60, "note": ""}]);
        assert!(primary.set("weightRecords", &records));

        let watcher = BackupWatcher::new(primary.clone(), session, WatcherConfig::default());
        assert!(watcher.start());
        assert!(primary.get_raw(BACKUP_SLOT_KEY).is_some());

        other_tab.clear().unwrap();

        let mut restored = None;
        for _ in 0..200 {
            restored = primary.get_raw("weightRecords");
            if restored.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(restored.is_some());
        assert_eq!(primary.get("weightRecords", json!(null)), records);
        watcher.stop();
    }
}
