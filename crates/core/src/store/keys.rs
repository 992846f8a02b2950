//! Well-known local store keys.

pub const USER_KEY: &str = "user";
pub const LAST_PERIOD_DATE_KEY: &str = "lastPeriodDate";
pub const DUE_DATE_KEY: &str = "dueDate";
pub const PREGNANCY_START_DATE_KEY: &str = "pregnancyStartDate";
pub const CYCLE_LENGTH_KEY: &str = "cycleLength";
pub const PERIOD_LENGTH_KEY: &str = "periodLength";
pub const PERIOD_HISTORY_KEY: &str = "periodHistory";
pub const USER_SETTINGS_KEY: &str = "userSettings";
pub const WEIGHT_RECORDS_KEY: &str = "weightRecords";
pub const BMI_RECORDS_KEY: &str = "pregnancyBMIRecords";
pub const EXERCISE_RECORDS_KEY: &str = "exerciseRecords";
pub const KICK_SESSIONS_KEY: &str = "kickSessions";
pub const CONTRACTION_SESSIONS_KEY: &str = "contractionSessions";
pub const MOOD_TRACKING_KEY: &str = "pregnancyMoodTracking";

/// Slot holding the serialized backup blob, in both the primary and the
/// session store.
pub const BACKUP_SLOT_KEY: &str = "localStorage_backup";

/// Key used by the availability probe. Never holds user data.
pub const PROBE_KEY: &str = "__storage_probe__";

/// Keys the backup watcher snapshots and restores.
pub const IMPORTANT_KEYS: [&str; 14] = [
    USER_KEY,
    LAST_PERIOD_DATE_KEY,
    DUE_DATE_KEY,
    PREGNANCY_START_DATE_KEY,
    CYCLE_LENGTH_KEY,
    PERIOD_LENGTH_KEY,
    PERIOD_HISTORY_KEY,
    USER_SETTINGS_KEY,
    WEIGHT_RECORDS_KEY,
    BMI_RECORDS_KEY,
    EXERCISE_RECORDS_KEY,
    KICK_SESSIONS_KEY,
    CONTRACTION_SESSIONS_KEY,
    MOOD_TRACKING_KEY,
];

pub fn is_important_key(key: &str) -> bool {
    IMPORTANT_KEYS.contains(&key)
}
