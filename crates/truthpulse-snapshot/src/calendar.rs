//! IST (UTC+05:30) calendar helpers.
//!
//! Every date handled by the generator is an IST calendar date. IST has no
//! daylight saving, so the offset is applied as plain arithmetic on naive values.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use thiserror::Error;

pub const IST_OFFSET_MINUTES: i64 = 330;

/// Day zero for rotation, 2025-11-14.
pub const DEFAULT_EPOCH_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2025, 11, 14) {
    Some(date) => date,
    None => panic!("default epoch is a valid date"),
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("invalid date format: {0} (expected YYYY-MM-DD)")]
    InvalidFormat(String),
    #[error("invalid calendar date: {0}")]
    InvalidDate(String),
}

/// Inclusive UTC window covering one IST calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBounds {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DayBounds {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from <= instant && instant <= self.to
    }
}

fn ist_offset() -> Duration {
    Duration::minutes(IST_OFFSET_MINUTES)
}

fn matches_date_pattern(input: &str) -> bool {
    let bytes = input.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

/// Parse a strict `YYYY-MM-DD` date.
pub fn parse_ist_date(input: &str) -> Result<NaiveDate, DateError> {
    if !matches_date_pattern(input) {
        return Err(DateError::InvalidFormat(input.to_string()));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|_| DateError::InvalidDate(input.to_string()))
}

/// IST calendar date of `now`.
pub fn ist_date_at(now: DateTime<Utc>) -> NaiveDate {
    (now.naive_utc() + ist_offset()).date()
}

pub fn current_ist_date() -> NaiveDate {
    ist_date_at(Utc::now())
}

/// Interpret a wall-clock time as IST and return the matching UTC instant.
pub fn ist_to_utc(local: NaiveDateTime) -> DateTime<Utc> {
    (local - ist_offset()).and_utc()
}

/// `{date}T00:00:00.000+05:30` through `{date}T23:59:59.999+05:30`.
pub fn ist_day_boundaries(date: NaiveDate) -> DayBounds {
    let from = ist_to_utc(date.and_time(NaiveTime::MIN));
    let to = from + Duration::days(1) - Duration::milliseconds(1);
    DayBounds { from, to }
}

/// Whole IST days from `epoch` to `date`; negative before the epoch.
pub fn day_index(date: NaiveDate, epoch: NaiveDate) -> i64 {
    date.signed_duration_since(epoch).num_days()
}
