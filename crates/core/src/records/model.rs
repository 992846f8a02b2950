//! Record structs for each tracked kind.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::history::HistoryEntry;
use super::kind::{RecordKind, TrackedRecord};
use crate::errors::{Error, Result};

fn start_of(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Body weight entry (kilograms).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightRecord {
    pub id: String,
    pub date: NaiveDate,
    pub weight: f64,
    #[serde(default)]
    pub note: String,
}

impl TrackedRecord for WeightRecord {
    const KIND: RecordKind = RecordKind::Weight;

    fn id(&self) -> &str {
        &self.id
    }

    fn occurred_at(&self) -> NaiveDateTime {
        start_of(self.date)
    }

    fn into_history(self) -> HistoryEntry {
        HistoryEntry::Weight(self)
    }
}

/// WHO adult BMI classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl BmiCategory {
    pub fn from_bmi(bmi: f64) -> Self {
        if bmi < 18.5 {
            BmiCategory::Underweight
        } else if bmi < 25.0 {
            BmiCategory::Normal
        } else if bmi < 30.0 {
            BmiCategory::Overweight
        } else {
            BmiCategory::Obese
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BmiRecord {
    pub id: String,
    pub date: NaiveDate,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub bmi: f64,
    pub category: BmiCategory,
}

impl BmiRecord {
    /// Build a record from raw measurements. BMI is kg / m², rounded to one
    /// decimal.
    pub fn compute(
        id: impl Into<String>,
        date: NaiveDate,
        weight_kg: f64,
        height_cm: f64,
    ) -> Result<Self> {
        if !(weight_kg > 0.0 && height_cm > 0.0) {
            return Err(Error::invalid_request(format!(
                "weight and height must be positive (got {} kg, {} cm)",
                weight_kg, height_cm
            )));
        }
        let meters = height_cm / 100.0;
        let bmi = (weight_kg / (meters * meters) * 10.0).round() / 10.0;
        Ok(Self {
            id: id.into(),
            date,
            weight_kg,
            height_cm,
            bmi,
            category: BmiCategory::from_bmi(bmi),
        })
    }
}

impl TrackedRecord for BmiRecord {
    const KIND: RecordKind = RecordKind::Bmi;

    fn id(&self) -> &str {
        &self.id
    }

    fn occurred_at(&self) -> NaiveDateTime {
        start_of(self.date)
    }

    fn into_history(self) -> HistoryEntry {
        HistoryEntry::Bmi(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseRecord {
    pub id: String,
    pub date: NaiveDate,
    pub activity: String,
    pub duration_minutes: u32,
    pub intensity: Intensity,
    #[serde(default)]
    pub note: String,
}

impl TrackedRecord for ExerciseRecord {
    const KIND: RecordKind = RecordKind::Exercise;

    fn id(&self) -> &str {
        &self.id
    }

    fn occurred_at(&self) -> NaiveDateTime {
        start_of(self.date)
    }

    fn into_history(self) -> HistoryEntry {
        HistoryEntry::Exercise(self)
    }
}

/// Fetal movement counting session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KickSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    pub kick_count: u32,
}

impl KickSession {
    /// Elapsed time of a finished session.
    pub fn duration(&self) -> Option<Duration> {
        self.ended_at
            .map(|ended| ended - self.started_at)
            .filter(|elapsed| *elapsed >= Duration::zero())
    }
}

impl TrackedRecord for KickSession {
    const KIND: RecordKind = RecordKind::Kick;

    fn id(&self) -> &str {
        &self.id
    }

    fn occurred_at(&self) -> NaiveDateTime {
        self.started_at.naive_utc()
    }

    fn into_history(self) -> HistoryEntry {
        HistoryEntry::Kick(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contraction {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl Contraction {
    pub fn duration(&self) -> Duration {
        self.ended_at - self.started_at
    }
}

/// Timed series of contractions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractionSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub contractions: Vec<Contraction>,
}

impl ContractionSession {
    pub fn average_duration(&self) -> Option<Duration> {
        let count = i32::try_from(self.contractions.len()).ok().filter(|n| *n > 0)?;
        let total = self
            .contractions
            .iter()
            .fold(Duration::zero(), |acc, c| acc + c.duration());
        Some(total / count)
    }

    /// Mean start-to-start gap between consecutive contractions.
    pub fn average_interval(&self) -> Option<Duration> {
        let mut starts: Vec<_> = self.contractions.iter().map(|c| c.started_at).collect();
        starts.sort();
        let gaps = i32::try_from(starts.len().checked_sub(1)?)
            .ok()
            .filter(|n| *n > 0)?;
        let total = starts
            .windows(2)
            .fold(Duration::zero(), |acc, pair| acc + (pair[1] - pair[0]));
        Some(total / gaps)
    }
}

impl TrackedRecord for ContractionSession {
    const KIND: RecordKind = RecordKind::Contraction;

    fn id(&self) -> &str {
        &self.id
    }

    fn occurred_at(&self) -> NaiveDateTime {
        self.started_at.naive_utc()
    }

    fn into_history(self) -> HistoryEntry {
        HistoryEntry::Contraction(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Happy,
    Calm,
    Tired,
    Anxious,
    Sad,
    Irritable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodEntry {
    pub id: String,
    pub date: NaiveDate,
    pub mood: Mood,
    /// 1 (exhausted) to 5 (energetic).
    pub energy: u8,
    #[serde(default)]
    pub note: String,
}

impl TrackedRecord for MoodEntry {
    const KIND: RecordKind = RecordKind::Mood;

    fn id(&self) -> &str {
        &self.id
    }

    fn occurred_at(&self) -> NaiveDateTime {
        start_of(self.date)
    }

    fn into_history(self) -> HistoryEntry {
        HistoryEntry::Mood(self)
    }
}
