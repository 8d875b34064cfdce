//! Event definitions: the candidate dates and per-date time windows an
//! organizer proposes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{MeetGridError, MeetGridResult, ValidationError};
use crate::slot::{self, truncate_to_minute};

/// Opaque event identifier, assigned by the store on creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        EventId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive window of the day in which slots are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(with = "slot::time_key")]
    pub start: NaiveTime,
    #[serde(with = "slot::time_key")]
    pub end: NaiveTime,
}

impl TimeRange {
    /// Returns `None` when `end` precedes `start`.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Option<Self> {
        let start = truncate_to_minute(start);
        let end = truncate_to_minute(end);
        (end >= start).then_some(TimeRange { start, end })
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time <= self.end
    }

    pub fn is_inverted(&self) -> bool {
        self.end < self.start
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            slot::format_time_key(&self.start),
            slot::format_time_key(&self.end)
        )
    }
}

impl FromStr for TimeRange {
    type Err = MeetGridError;

    /// Parses `HH:mm-HH:mm`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s.split_once('-').ok_or_else(|| {
            MeetGridError::Serialization(format!("Invalid time range '{}'. Expected HH:mm-HH:mm", s))
        })?;
        let start = slot::parse_time_key(start)?;
        let end = slot::parse_time_key(end)?;
        TimeRange::new(start, end).ok_or_else(|| {
            MeetGridError::Serialization(format!("Time range '{}' ends before it starts", s))
        })
    }
}

/// What the organizer proposes. Immutable once the event is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub title: String,
    pub description: Option<String>,
    /// IANA zone name shared by every participant.
    pub timezone: String,
    /// Candidate dates in the organizer's order, without duplicates.
    pub dates: Vec<NaiveDate>,
    pub time_ranges: BTreeMap<NaiveDate, TimeRange>,
}

impl EventDefinition {
    pub fn new(title: &str, description: Option<&str>, timezone: &str) -> Self {
        EventDefinition {
            title: title.trim().to_string(),
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from),
            timezone: timezone.trim().to_string(),
            dates: Vec::new(),
            time_ranges: BTreeMap::new(),
        }
    }

    /// Add a candidate date. Returns false if it was already present.
    pub fn add_date(&mut self, date: NaiveDate) -> bool {
        if self.dates.contains(&date) {
            return false;
        }
        self.dates.push(date);
        true
    }

    /// Set the range for a date, adding the date if it is not a candidate yet.
    pub fn set_time_range(&mut self, date: NaiveDate, range: TimeRange) {
        self.add_date(date);
        self.time_ranges.insert(date, range);
    }

    pub fn with_range(mut self, date: NaiveDate, range: TimeRange) -> Self {
        self.set_time_range(date, range);
        self
    }

    pub fn time_range(&self, date: &NaiveDate) -> Option<&TimeRange> {
        self.time_ranges.get(date)
    }

    /// Nothing configured at all (e.g. no payload was supplied).
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.dates.is_empty() && self.time_ranges.is_empty()
    }

    pub fn tz(&self) -> Option<Tz> {
        Tz::from_str(&self.timezone).ok()
    }

    /// Check the definition in the order a form would report problems:
    /// title, dates, per-date ranges, timezone.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        if self.dates.is_empty() {
            return Err(ValidationError::NoDates);
        }
        for date in &self.dates {
            match self.time_ranges.get(date) {
                None => return Err(ValidationError::MissingTimeRange(*date)),
                Some(range) if range.is_inverted() => {
                    return Err(ValidationError::InvertedTimeRange(*date));
                }
                Some(_) => {}
            }
        }
        if self.tz().is_none() {
            return Err(ValidationError::UnknownTimezone(self.timezone.clone()));
        }
        Ok(())
    }

    pub fn validated(self) -> MeetGridResult<Self> {
        self.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, d).unwrap()
    }

    fn range(s: &str) -> TimeRange {
        s.parse().unwrap()
    }

    #[test]
    fn test_add_date_collapses_duplicates() {
        let mut def = EventDefinition::new("Standup", None, "UTC");
        assert!(def.add_date(date(2)));
        assert!(def.add_date(date(1)));
        assert!(!def.add_date(date(2)));
        assert_eq!(def.dates, vec![date(2), date(1)]);
    }

    #[test]
    fn test_validate_reports_in_form_order() {
        let def = EventDefinition::new("  ", None, "UTC");
        assert_eq!(def.validate(), Err(ValidationError::MissingTitle));

        let mut def = EventDefinition::new("Offsite", None, "UTC");
        assert_eq!(def.validate(), Err(ValidationError::NoDates));

        def.add_date(date(1));
        assert_eq!(def.validate(), Err(ValidationError::MissingTimeRange(date(1))));

        def.set_time_range(date(1), range("09:00-17:00"));
        assert_eq!(def.validate(), Ok(()));

        def.timezone = "Mars/Olympus".to_string();
        assert_eq!(
            def.validate(),
            Err(ValidationError::UnknownTimezone("Mars/Olympus".to_string()))
        );
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        assert!("17:00-09:00".parse::<TimeRange>().is_err());

        let mut def = EventDefinition::new("Offsite", None, "Europe/Berlin");
        def.add_date(date(1));
        def.time_ranges.insert(
            date(1),
            TimeRange {
                start: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            },
        );
        assert_eq!(def.validate(), Err(ValidationError::InvertedTimeRange(date(1))));
    }

    #[test]
    fn test_missing_range_message_uses_date_key() {
        let err = ValidationError::MissingTimeRange(date(1));
        assert_eq!(err.to_string(), "Please set a time range for 11/01/2024.");
    }

    #[test]
    fn test_range_contains_is_inclusive() {
        let r = range("09:00-10:00");
        assert!(r.contains(NaiveTime::from_hms_opt(9, 0, 0).unwrap()));
        assert!(r.contains(NaiveTime::from_hms_opt(10, 0, 0).unwrap()));
        assert!(!r.contains(NaiveTime::from_hms_opt(10, 1, 0).unwrap()));
        assert_eq!(r.to_string(), "09:00-10:00");
    }

    #[test]
    fn test_blank_description_is_none() {
        let def = EventDefinition::new("Lunch", Some("   "), "UTC");
        assert_eq!(def.description, None);
        assert!(EventDefinition::default().is_empty());
        assert!(!def.is_empty());
    }
}
