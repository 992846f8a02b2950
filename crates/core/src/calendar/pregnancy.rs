//! Gestational age arithmetic on a 280-day term.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Days from the first day of the last menstrual period to the due date.
pub const PREGNANCY_TERM_DAYS: i64 = 280;

/// Ages past this many weeks are treated as stale input.
pub const MAX_GESTATION_WEEKS: u32 = 44;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GestationalAge {
    pub weeks: u32,
    pub days: u32,
}

impl GestationalAge {
    pub fn total_days(&self) -> u32 {
        self.weeks * 7 + self.days
    }
}

impl std::fmt::Display for GestationalAge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}w{}d", self.weeks, self.days)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trimester {
    First,
    Second,
    Third,
}

pub fn due_date_from_last_period(last_period: NaiveDate) -> NaiveDate {
    last_period + Duration::days(PREGNANCY_TERM_DAYS)
}

pub fn last_period_from_due_date(due_date: NaiveDate) -> NaiveDate {
    due_date - Duration::days(PREGNANCY_TERM_DAYS)
}

/// Completed weeks and days since `last_period`. `None` before the period
/// started or beyond [`MAX_GESTATION_WEEKS`].
pub fn gestational_age(last_period: NaiveDate, today: NaiveDate) -> Option<GestationalAge> {
    let elapsed = u32::try_from((today - last_period).num_days()).ok()?;
    let age = GestationalAge {
        weeks: elapsed / 7,
        days: elapsed % 7,
    };
    (age.weeks <= MAX_GESTATION_WEEKS).then_some(age)
}

pub fn gestational_age_from_due_date(
    due_date: NaiveDate,
    today: NaiveDate,
) -> Option<GestationalAge> {
    gestational_age(last_period_from_due_date(due_date), today)
}

/// Weeks 0-13 first, 14-27 second, 28 onward third.
pub fn trimester(weeks: u32) -> Trimester {
    match weeks {
        0..=13 => Trimester::First,
        14..=27 => Trimester::Second,
        _ => Trimester::Third,
    }
}

/// Negative once the due date has passed.
pub fn days_until_due(due_date: NaiveDate, today: NaiveDate) -> i64 {
    (due_date - today).num_days()
}
