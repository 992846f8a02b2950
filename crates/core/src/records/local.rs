//! Record lists in the local store. Lists are kept newest first.

use std::collections::HashSet;

use log::debug;

use super::kind::TrackedRecord;
use crate::store::LocalStore;

/// Current local list for `R`, empty when absent or unreadable.
pub fn load_records<R: TrackedRecord>(store: &LocalStore) -> Vec<R> {
    store.get(R::KIND.storage_key(), Vec::new())
}

pub fn store_records<R: TrackedRecord>(store: &LocalStore, records: &[R]) -> bool {
    store.set(R::KIND.storage_key(), records)
}

/// Replace the record with the same id in place, or prepend it.
pub fn upsert_record<R: TrackedRecord>(store: &LocalStore, record: R) -> bool {
    let mut records = load_records::<R>(store);
    match records.iter_mut().find(|r| r.id() == record.id()) {
        Some(existing) => *existing = record,
        None => records.insert(0, record),
    }
    store_records(store, &records)
}

/// Drop the record with `id`. Removing an unknown id leaves the list as is
/// and still reports the write outcome.
pub fn remove_record<R: TrackedRecord>(store: &LocalStore, id: &str) -> bool {
    let mut records = load_records::<R>(store);
    let before = records.len();
    records.retain(|r| r.id() != id);
    if records.len() == before {
        debug!("[Records] no {} record with id '{}'", R::KIND, id);
    }
    store_records(store, &records)
}

/// Keep the first occurrence of every id, preserving order.
pub fn dedupe_by_id<R: TrackedRecord>(records: Vec<R>) -> Vec<R> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.id().to_string()))
        .collect()
}

/// Lay `remote` over `local` by id: remote copies win, local-only records
/// stay. The result is ordered newest first; ties keep remote before local.
pub fn merge_remote_records<R: TrackedRecord>(remote: Vec<R>, local: Vec<R>) -> Vec<R> {
    let remote = dedupe_by_id(remote);
    let remote_ids: HashSet<String> = remote.iter().map(|r| r.id().to_string()).collect();
    let mut merged = remote;
    merged.extend(
        dedupe_by_id(local)
            .into_iter()
            .filter(|r| !remote_ids.contains(r.id())),
    );
    merged.sort_by(|a, b| b.occurred_at().cmp(&a.occurred_at()));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::WeightRecord;
    use crate::store::MemoryBackend;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn weight(id: &str, kg: f64) -> WeightRecord {
        WeightRecord {
            id: id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            weight: kg,
            note: String::new(),
        }
    }

    fn store() -> LocalStore {
        LocalStore::new(Arc::new(MemoryBackend::new()))
    }

    #[test]
    fn upsert_prepends_then_replaces() {
        let store = store();
        assert!(upsert_record(&store, weight("1", 60.0)));
        assert!(upsert_record(&store, weight("2", 61.0)));
        assert!(upsert_record(&store, weight("1", 59.5)));

        let records = load_records::<WeightRecord>(&store);
        assert_eq!(records, vec![weight("2", 61.0), weight("1", 59.5)]);
    }

    #[test]
    fn remove_drops_only_the_matching_id() {
        let store = store();
        assert!(store_records(&store, &[weight("1", 60.0), weight("2", 61.0)]));
        assert!(remove_record::<WeightRecord>(&store, "1"));
        assert!(remove_record::<WeightRecord>(&store, "missing"));
        assert_eq!(load_records::<WeightRecord>(&store), vec![weight("2", 61.0)]);
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let records = vec![weight("1", 60.0), weight("2", 61.0), weight("1", 58.0)];
        assert_eq!(
            dedupe_by_id(records),
            vec![weight("1", 60.0), weight("2", 61.0)]
        );
    }

    #[test]
    fn merge_keeps_local_only_records_and_prefers_remote_copies() {
        let mut newer = weight("new", 62.0);
        newer.date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let local = vec![newer.clone(), weight("1", 60.0), weight("2", 61.0)];
        let remote = vec![weight("1", 59.0)];

        assert_eq!(
            merge_remote_records(remote, local),
            vec![newer, weight("1", 59.0), weight("2", 61.0)]
        );
    }

    #[test]
    fn writes_fail_when_store_is_gone() {
        let backend = MemoryBackend::new();
        let store = LocalStore::new(Arc::new(backend.clone()));
        backend.set_available(false);
        assert!(!upsert_record(&store, weight("1", 60.0)));
        assert!(load_records::<WeightRecord>(&store).is_empty());
    }
}
