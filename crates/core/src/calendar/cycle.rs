//! Menstrual cycle predictions.

use std::ops::RangeInclusive;

use chrono::{Duration, NaiveDate};

use crate::errors::{Error, Result};

pub const DEFAULT_CYCLE_LENGTH: u32 = 28;
pub const DEFAULT_PERIOD_LENGTH: u32 = 5;
pub const CYCLE_LENGTH_RANGE: RangeInclusive<u32> = 21..=45;

/// Days between ovulation and the following period.
const LUTEAL_PHASE_DAYS: i64 = 14;

fn checked_cycle_length(cycle_length: u32) -> Result<i64> {
    if CYCLE_LENGTH_RANGE.contains(&cycle_length) {
        Ok(i64::from(cycle_length))
    } else {
        Err(Error::invalid_request(format!(
            "cycle length {} is outside {:?} days",
            cycle_length, CYCLE_LENGTH_RANGE
        )))
    }
}

pub fn predict_next_period(last_period: NaiveDate, cycle_length: u32) -> Result<NaiveDate> {
    Ok(last_period + Duration::days(checked_cycle_length(cycle_length)?))
}

pub fn ovulation_date(last_period: NaiveDate, cycle_length: u32) -> Result<NaiveDate> {
    Ok(predict_next_period(last_period, cycle_length)? - Duration::days(LUTEAL_PHASE_DAYS))
}

/// Five days before ovulation through the day after.
pub fn fertile_window(
    last_period: NaiveDate,
    cycle_length: u32,
) -> Result<RangeInclusive<NaiveDate>> {
    let ovulation = ovulation_date(last_period, cycle_length)?;
    Ok((ovulation - Duration::days(5))..=(ovulation + Duration::days(1)))
}

/// 1-based day of the current cycle; `None` before `last_period`.
pub fn cycle_day(last_period: NaiveDate, today: NaiveDate) -> Option<u32> {
    let elapsed = u32::try_from((today - last_period).num_days()).ok()?;
    Some(elapsed + 1)
}

/// Mean gap between consecutive period starts, ignoring gaps outside the
/// accepted cycle range. `None` without at least one usable gap.
pub fn average_cycle_length(period_starts: &[NaiveDate]) -> Option<u32> {
    let mut starts = period_starts.to_vec();
    starts.sort();
    starts.dedup();
    let gaps: Vec<u32> = starts
        .windows(2)
        .filter_map(|pair| u32::try_from((pair[1] - pair[0]).num_days()).ok())
        .filter(|gap| CYCLE_LENGTH_RANGE.contains(gap))
        .collect();
    if gaps.is_empty() {
        return None;
    }
    let total: u32 = gaps.iter().sum();
    let count = gaps.len() as u32;
    Some((total + count / 2) / count)
}
