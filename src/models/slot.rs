//! Slot and week model.
//!
//! A slot is a (day, period) coordinate inside a school week. Weeks are
//! identified by the date of their Monday in the school's local calendar.
//!
//! # Ordering
//! Slots order by day (Monday → Friday), then by period (1 → N). The
//! generator walks slots in this order, which keeps its output stable.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A teaching day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Day {
    /// All teaching days, Monday first.
    pub const ALL: [Day; 5] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
    ];

    /// Zero-based offset from Monday.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Converts a chrono weekday. Weekend days have no teaching day.
    pub fn from_weekday(weekday: Weekday) -> Option<Self> {
        match weekday {
            Weekday::Mon => Some(Day::Monday),
            Weekday::Tue => Some(Day::Tuesday),
            Weekday::Wed => Some(Day::Wednesday),
            Weekday::Thu => Some(Day::Thursday),
            Weekday::Fri => Some(Day::Friday),
            Weekday::Sat | Weekday::Sun => None,
        }
    }

    /// The calendar date of this day within the week starting at `week_start`.
    pub fn date_in_week(self, week_start: NaiveDate) -> NaiveDate {
        week_start + Duration::days(self.index() as i64)
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Day::Monday => "monday",
            Day::Tuesday => "tuesday",
            Day::Wednesday => "wednesday",
            Day::Thursday => "thursday",
            Day::Friday => "friday",
        };
        f.write_str(name)
    }
}

/// A (day, period) coordinate. Periods are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot {
    /// Teaching day.
    pub day: Day,
    /// Period within the day, starting at 1.
    pub period: u8,
}

impl Slot {
    /// Creates a slot.
    pub fn new(day: Day, period: u8) -> Self {
        Self { day, period }
    }

    /// Every slot of a week with `periods_per_day` periods, in generation order.
    pub fn week(periods_per_day: u8) -> impl Iterator<Item = Slot> {
        Day::ALL
            .into_iter()
            .flat_map(move |day| (1..=periods_per_day).map(move |p| Slot::new(day, p)))
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.day, self.period)
    }
}

/// The Monday of the week containing `date`.
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Parses an ISO `yyyy-MM-dd` date and normalizes it to its week's Monday.
pub fn parse_week_start(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(week_start_of)
}
