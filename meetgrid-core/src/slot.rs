//! Addressable time slots and the literal formats that cross the store
//! boundary.
//!
//! A slot is identified by its calendar date and its time of day. Both halves
//! have a canonical string form that doubles as the merge key:
//! - dates as `MM/DD/YYYY`
//! - times as 24-hour `HH:mm`
//!
//! Human-facing labels (`9:00 AM`) are derived from the same value but are
//! never used as keys.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{MeetGridError, MeetGridResult};

pub const DATE_KEY_FORMAT: &str = "%m/%d/%Y";
pub const TIME_KEY_FORMAT: &str = "%H:%M";
const LABEL_FORMAT: &str = "%-I:%M %p";
const SHORT_LABEL_FORMAT: &str = "%-I %p";
const LABEL_PARSE_FORMAT: &str = "%I:%M %p";
const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// One cell of the availability grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeSlot {
    #[serde(with = "date_key")]
    pub date: NaiveDate,
    #[serde(with = "time_key")]
    pub time: NaiveTime,
}

impl TimeSlot {
    /// Times are kept at minute precision; seconds are dropped.
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        TimeSlot {
            date,
            time: truncate_to_minute(time),
        }
    }

    /// Parse a slot from its date key and a time in either `HH:mm` or
    /// `h:mm AM` form.
    pub fn parse(date: &str, time: &str) -> MeetGridResult<Self> {
        Ok(TimeSlot::new(parse_date_key(date)?, parse_time_key(time)?))
    }

    pub fn date_key(&self) -> String {
        format_date_key(&self.date)
    }

    pub fn time_key(&self) -> String {
        format_time_key(&self.time)
    }

    /// `9:00 AM`
    pub fn label(&self) -> String {
        self.time.format(LABEL_FORMAT).to_string()
    }

    /// `9 AM` on the hour, `9:30 AM` otherwise.
    pub fn short_label(&self) -> String {
        if self.time.minute() == 0 {
            self.time.format(SHORT_LABEL_FORMAT).to_string()
        } else {
            self.label()
        }
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date_key(), self.time_key())
    }
}

impl FromStr for TimeSlot {
    type Err = MeetGridError;

    /// Parses `MM/DD/YYYY HH:mm` (or `MM/DD/YYYY h:mm AM`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (date, time) = s.trim().split_once(char::is_whitespace).ok_or_else(|| {
            MeetGridError::Serialization(format!(
                "Invalid slot '{}'. Expected MM/DD/YYYY HH:mm",
                s
            ))
        })?;
        TimeSlot::parse(date, time.trim())
    }
}

pub fn format_date_key(date: &NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

pub fn format_time_key(time: &NaiveTime) -> String {
    time.format(TIME_KEY_FORMAT).to_string()
}

/// Parse `MM/DD/YYYY`; ISO `YYYY-MM-DD` is accepted as input too.
pub fn parse_date_key(s: &str) -> MeetGridResult<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, DATE_KEY_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(s, ISO_DATE_FORMAT))
        .map_err(|_| {
            MeetGridError::Serialization(format!("Invalid date '{}'. Expected MM/DD/YYYY", s))
        })
}

/// Parse `HH:mm`, or a 12-hour label such as `9:30 PM`.
pub fn parse_time_key(s: &str) -> MeetGridResult<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, TIME_KEY_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(&s.to_uppercase(), LABEL_PARSE_FORMAT))
        .map(truncate_to_minute)
        .map_err(|_| MeetGridError::Serialization(format!("Invalid time '{}'. Expected HH:mm", s)))
}

pub fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}

pub fn minutes_since_midnight(time: &NaiveTime) -> u32 {
    time.num_seconds_from_midnight() / 60
}

pub fn time_from_minutes(minutes: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
}

/// serde adapter for `MM/DD/YYYY` dates.
pub mod date_key {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date_key(date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_date_key(&s).map_err(serde::de::Error::custom)
    }
}

/// serde adapter for `HH:mm` times.
pub mod time_key {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_time_key(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_time_key(&s).map_err(serde::de::Error::custom)
    }
}
