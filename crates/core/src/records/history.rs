use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::kind::{RecordKind, TrackedRecord};
use super::local::load_records;
use super::model::{
    BmiRecord, ContractionSession, ExerciseRecord, KickSession, MoodEntry, WeightRecord,
};
use crate::store::LocalStore;

/// One item of the combined history timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum HistoryEntry {
    Weight(WeightRecord),
    Bmi(BmiRecord),
    Exercise(ExerciseRecord),
    Kick(KickSession),
    Contraction(ContractionSession),
    Mood(MoodEntry),
}

impl HistoryEntry {
    pub fn kind(&self) -> RecordKind {
        match self {
            HistoryEntry::Weight(_) => RecordKind::Weight,
            HistoryEntry::Bmi(_) => RecordKind::Bmi,
            HistoryEntry::Exercise(_) => RecordKind::Exercise,
            HistoryEntry::Kick(_) => RecordKind::Kick,
            HistoryEntry::Contraction(_) => RecordKind::Contraction,
            HistoryEntry::Mood(_) => RecordKind::Mood,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            HistoryEntry::Weight(r) => r.id(),
            HistoryEntry::Bmi(r) => r.id(),
            HistoryEntry::Exercise(r) => r.id(),
            HistoryEntry::Kick(r) => r.id(),
            HistoryEntry::Contraction(r) => r.id(),
            HistoryEntry::Mood(r) => r.id(),
        }
    }

    pub fn occurred_at(&self) -> NaiveDateTime {
        match self {
            HistoryEntry::Weight(r) => r.occurred_at(),
            HistoryEntry::Bmi(r) => r.occurred_at(),
            HistoryEntry::Exercise(r) => r.occurred_at(),
            HistoryEntry::Kick(r) => r.occurred_at(),
            HistoryEntry::Contraction(r) => r.occurred_at(),
            HistoryEntry::Mood(r) => r.occurred_at(),
        }
    }
}

fn entries_of<R: TrackedRecord>(store: &LocalStore, feed: &mut Vec<HistoryEntry>) {
    feed.extend(
        load_records::<R>(store)
            .into_iter()
            .map(TrackedRecord::into_history),
    );
}

/// Every locally stored record of every kind, newest first.
pub fn history_feed(store: &LocalStore) -> Vec<HistoryEntry> {
    let mut feed = Vec::new();
    entries_of::<WeightRecord>(store, &mut feed);
    entries_of::<BmiRecord>(store, &mut feed);
    entries_of::<ExerciseRecord>(store, &mut feed);
    entries_of::<KickSession>(store, &mut feed);
    entries_of::<ContractionSession>(store, &mut feed);
    entries_of::<MoodEntry>(store, &mut feed);
    feed.sort_by(|a, b| b.occurred_at().cmp(&a.occurred_at()));
    feed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::model::{Intensity, Mood};
    use crate::store::MemoryBackend;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::sync::Arc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn feed_merges_kinds_newest_first() {
        let store = LocalStore::new(Arc::new(MemoryBackend::new()));
        assert!(store.set(
            "weightRecords",
            &vec![WeightRecord {
                id: "w1".to_string(),
                date: day(1),
                weight: 61.5,
                note: String::new(),
            }]
        ));
        assert!(store.set(
            "exerciseRecords",
            &vec![ExerciseRecord {
                id: "e1".to_string(),
                date: day(3),
                activity: "walk".to_string(),
                duration_minutes: 30,
                intensity: Intensity::Low,
                note: String::new(),
            }]
        ));
        assert!(store.set(
            "kickSessions",
            &vec![KickSession {
                id: "k1".to_string(),
                started_at: Utc.with_ymd_and_hms(2024, 5, 2, 21, 0, 0).unwrap(),
                ended_at: None,
                kick_count: 4,
            }]
        ));
        assert!(store.set(
            "pregnancyMoodTracking",
            &vec![MoodEntry {
                id: "m1".to_string(),
                date: day(4),
                mood: Mood::Calm,
                energy: 3,
                note: String::new(),
            }]
        ));

        let feed = history_feed(&store);
        let ids: Vec<_> = feed.iter().map(HistoryEntry::id).collect();
        assert_eq!(ids, vec!["m1", "e1", "k1", "w1"]);
        assert_eq!(feed[2].kind(), RecordKind::Kick);
    }

    #[test]
    fn empty_store_has_empty_feed() {
        let store = LocalStore::new(Arc::new(MemoryBackend::new()));
        assert!(history_feed(&store).is_empty());
    }

    #[test]
    fn entry_is_tagged_by_kind() {
        let entry = HistoryEntry::Mood(MoodEntry {
            id: "m1".to_string(),
            date: day(4),
            mood: Mood::Happy,
            energy: 5,
            note: String::new(),
        });
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["kind"], "mood");
        assert_eq!(value["record"]["id"], "m1");
    }
}
