//! One-line status reports built from what the primary store holds.

use bloomtrack_core::calendar::{
    cycle_day, days_until_due, due_date_from_last_period, fertile_window, fetal_size_for_week,
    gestational_age, gestational_age_from_due_date, predict_next_period, trimester,
    DEFAULT_CYCLE_LENGTH,
};
use bloomtrack_core::store::{LocalStore, CYCLE_LENGTH_KEY, DUE_DATE_KEY, LAST_PERIOD_DATE_KEY};
use chrono::NaiveDate;

fn stored_date(store: &LocalStore, key: &str) -> Option<NaiveDate> {
    store.get::<Option<NaiveDate>>(key, None)
}

/// Progress toward the due date, preferring a stored `dueDate` over one
/// derived from `lastPeriodDate`.
pub fn pregnancy_summary(store: &LocalStore, today: NaiveDate) -> Option<String> {
    let (age, due) = match stored_date(store, DUE_DATE_KEY) {
        Some(due) => (gestational_age_from_due_date(due, today)?, due),
        None => {
            let last_period = stored_date(store, LAST_PERIOD_DATE_KEY)?;
            let due = due_date_from_last_period(last_period);
            (gestational_age(last_period, today)?, due)
        }
    };

    let mut line = format!(
        "{} ({:?} trimester), {} days until {}",
        age,
        trimester(age.weeks),
        days_until_due(due, today),
        due
    );
    if let Some(size) = fetal_size_for_week(age.weeks) {
        line.push_str(&format!(", about the size of a {}", size.comparison));
    }
    Some(line)
}

pub fn cycle_summary(store: &LocalStore, today: NaiveDate) -> Option<String> {
    let last_period = stored_date(store, LAST_PERIOD_DATE_KEY)?;
    let cycle_length = store.get(CYCLE_LENGTH_KEY, DEFAULT_CYCLE_LENGTH);
    let day = cycle_day(last_period, today)?;
    let next = predict_next_period(last_period, cycle_length).ok()?;
    let window = fertile_window(last_period, cycle_length).ok()?;
    Some(format!(
        "cycle day {} of {}, next period {}, fertile {} to {}",
        day,
        cycle_length,
        next,
        window.start(),
        window.end()
    ))
}
