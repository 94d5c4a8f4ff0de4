//! Conversions between service-day offsets and absolute instants.
//!
//! Schedules are stored as seconds since local midnight. Offsets past 24h
//! belong to the previous service day and roll into the next calendar date;
//! negative offsets fall on the day before.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike};
use chrono_tz::Tz;

use crate::models::types::{Result, TransitError};

pub const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

/// Seconds since local midnight of `at`
pub fn offset_since_midnight(at: &DateTime<Tz>) -> u32 {
    at.num_seconds_from_midnight()
}

/// Absolute instant for `offset` seconds after midnight of `date` in `tz`.
///
/// Offsets are wall-clock times, so a DST change on `date` does not shift
/// them. Wall times inside a spring-forward gap resolve to the first valid
/// instant after the gap.
pub fn instant_at_offset(date: NaiveDate, offset: i64, tz: Tz) -> DateTime<Tz> {
    let naive = date.and_time(chrono::NaiveTime::MIN) + Duration::seconds(offset);
    resolve_local(naive, tz)
}

fn resolve_local(naive: NaiveDateTime, tz: Tz) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(instant) => instant,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .unwrap_or_else(|| tz.from_utc_datetime(&naive)),
    }
}

/// Parse a feed time of day (`H:MM:SS`, hours may exceed 23).
///
/// Blank strings are unknown times and yield `None`.
pub fn parse_time_of_day(value: &str) -> Result<Option<u32>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    let malformed = || TransitError::InvalidData(format!("malformed time of day {value:?}"));

    let mut parts = value.splitn(3, ':');
    let mut next = || -> Result<u32> {
        parts
            .next()
            .and_then(|part| part.trim().parse::<u32>().ok())
            .ok_or_else(malformed)
    };

    let (hours, minutes, seconds) = (next()?, next()?, next()?);
    if minutes >= 60 || seconds >= 60 {
        return Err(malformed());
    }

    hours
        .checked_mul(3600)
        .and_then(|total| total.checked_add(minutes * 60 + seconds))
        .map(Some)
        .ok_or_else(malformed)
}
