//! Tracked record kinds and their local lists.

mod history;
mod kind;
mod local;
mod model;

pub use history::{history_feed, HistoryEntry};
pub use kind::{RecordKind, TrackedRecord};
pub use local::{
    dedupe_by_id, load_records, merge_remote_records, remove_record, store_records, upsert_record,
};
pub use model::{
    BmiCategory, BmiRecord, Contraction, ContractionSession, ExerciseRecord, Intensity,
    KickSession, Mood, MoodEntry, WeightRecord,
};
