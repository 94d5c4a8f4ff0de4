//! Service calendar for determining when trips run.
//!
//! Implements the regular-week part of GTFS calendar.txt. Service-date
//! exceptions (calendar_dates.txt) are not modeled.

use chrono::{NaiveDate, Weekday};

use crate::identifiers::ServiceIdentifier;

/// Determines which days a transit service operates
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceCalendar {
    pub service_id: ServiceIdentifier,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub weekdays: WeekdayFlags,
}

/// Compact representation of which weekdays a service runs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeekdayFlags {
    pub(crate) flags: u8,
}

const ALL_WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

impl WeekdayFlags {
    pub fn new() -> Self {
        Self { flags: 0 }
    }

    pub fn every_day() -> Self {
        Self { flags: 0b0111_1111 }
    }

    pub fn set(&mut self, weekday: Weekday) {
        self.flags |= 1 << weekday.num_days_from_monday();
    }

    pub fn unset(&mut self, weekday: Weekday) {
        self.flags &= !(1 << weekday.num_days_from_monday());
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        (self.flags & (1 << weekday.num_days_from_monday())) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.flags == 0
    }

    /// Days in Monday..Sunday order
    pub fn days(&self) -> impl Iterator<Item = Weekday> + '_ {
        ALL_WEEKDAYS.into_iter().filter(|day| self.contains(*day))
    }

    pub fn from_bools(mon: bool, tue: bool, wed: bool, thu: bool, fri: bool, sat: bool, sun: bool) -> Self {
        let mut flags = Self::new();
        if mon { flags.set(Weekday::Mon); }
        if tue { flags.set(Weekday::Tue); }
        if wed { flags.set(Weekday::Wed); }
        if thu { flags.set(Weekday::Thu); }
        if fri { flags.set(Weekday::Fri); }
        if sat { flags.set(Weekday::Sat); }
        if sun { flags.set(Weekday::Sun); }
        flags
    }
}

impl ServiceCalendar {
    /// Widen a validity window so it also covers this calendar
    pub fn widen(&self, window: Option<(NaiveDate, NaiveDate)>) -> (NaiveDate, NaiveDate) {
        match window {
            Some((start, end)) => (start.min(self.start_date), end.max(self.end_date)),
            None => (self.start_date, self.end_date),
        }
    }
}
