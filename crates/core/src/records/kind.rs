use std::fmt;

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::history::HistoryEntry;
use crate::store::{
    BMI_RECORDS_KEY, CONTRACTION_SESSIONS_KEY, EXERCISE_RECORDS_KEY, KICK_SESSIONS_KEY,
    MOOD_TRACKING_KEY, WEIGHT_RECORDS_KEY,
};

/// Kinds of per-user record lists kept locally and mirrored remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Weight,
    Bmi,
    Exercise,
    Kick,
    Contraction,
    Mood,
}

impl RecordKind {
    pub const ALL: [RecordKind; 6] = [
        RecordKind::Weight,
        RecordKind::Bmi,
        RecordKind::Exercise,
        RecordKind::Kick,
        RecordKind::Contraction,
        RecordKind::Mood,
    ];

    /// Local store key holding the list.
    pub fn storage_key(self) -> &'static str {
        match self {
            RecordKind::Weight => WEIGHT_RECORDS_KEY,
            RecordKind::Bmi => BMI_RECORDS_KEY,
            RecordKind::Exercise => EXERCISE_RECORDS_KEY,
            RecordKind::Kick => KICK_SESSIONS_KEY,
            RecordKind::Contraction => CONTRACTION_SESSIONS_KEY,
            RecordKind::Mood => MOOD_TRACKING_KEY,
        }
    }

    /// Sub-collection name under `users/{uid}` and field name in the user
    /// document.
    pub fn remote_collection(self) -> &'static str {
        match self {
            RecordKind::Weight => "weightRecords",
            RecordKind::Bmi => "bmiRecords",
            RecordKind::Exercise => "exerciseRecords",
            RecordKind::Kick => "kickSessions",
            RecordKind::Contraction => "contractionSessions",
            RecordKind::Mood => "moodEntries",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Weight => "weight",
            RecordKind::Bmi => "bmi",
            RecordKind::Exercise => "exercise",
            RecordKind::Kick => "kick",
            RecordKind::Contraction => "contraction",
            RecordKind::Mood => "mood",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record type stored as a JSON list under [`RecordKind::storage_key`].
pub trait TrackedRecord:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    const KIND: RecordKind;

    /// Caller-generated identifier, unique within the kind.
    fn id(&self) -> &str;

    /// Moment the record describes; history is ordered by it.
    fn occurred_at(&self) -> NaiveDateTime;

    fn into_history(self) -> HistoryEntry;
}
