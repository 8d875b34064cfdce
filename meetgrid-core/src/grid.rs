//! Slot grid derivation.
//!
//! The grid is the universe of addressable slots for one event. It is a pure
//! function of the event definition and the granularity, so two sessions that
//! see the same definition always agree on slot keys.
//!
//! Ranges are closed on both ends: a 09:00-17:00 range at hourly granularity
//! yields 9:00 AM through 5:00 PM. Stepping starts at the range start, so a
//! range that does not begin on a step boundary keeps its own offset.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{DEFAULT_GRANULARITY_MINUTES, MINUTES_PER_DAY};
use crate::error::{MeetGridError, MeetGridResult};
use crate::event::EventDefinition;
use crate::slot::{TimeSlot, minutes_since_midnight, time_from_minutes};

/// Fixed step between consecutive slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Granularity(u32);

impl Granularity {
    pub const HALF_HOUR: Granularity = Granularity(30);
    pub const HOUR: Granularity = Granularity(60);

    /// Accepts steps between 5 minutes and 12 hours that divide a day evenly.
    pub fn from_minutes(minutes: u32) -> MeetGridResult<Self> {
        if !(5..=720).contains(&minutes) || MINUTES_PER_DAY % minutes != 0 {
            return Err(MeetGridError::Config(format!(
                "Invalid granularity {}m: must be 5-720 minutes and divide a day evenly",
                minutes
            )));
        }
        Ok(Granularity(minutes))
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }
}

impl Default for Granularity {
    fn default() -> Self {
        Granularity(DEFAULT_GRANULARITY_MINUTES)
    }
}

impl TryFrom<u32> for Granularity {
    type Error = MeetGridError;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        Granularity::from_minutes(minutes)
    }
}

impl From<Granularity> for u32 {
    fn from(g: Granularity) -> Self {
        g.0
    }
}

/// The slots of one candidate date, ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridDay {
    pub date: NaiveDate,
    pub slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    /// Dates in the definition's order. Dates with a missing range are absent.
    pub days: Vec<GridDay>,
    /// Candidate dates that had no usable time range.
    pub missing_ranges: Vec<NaiveDate>,
    index: HashSet<TimeSlot>,
}

impl Grid {
    pub fn contains(&self, slot: &TimeSlot) -> bool {
        self.index.contains(slot)
    }

    /// Every slot, dates in definition order, times ascending.
    pub fn slots(&self) -> impl Iterator<Item = &TimeSlot> {
        self.days.iter().flat_map(|d| d.slots.iter())
    }

    pub fn day(&self, date: &NaiveDate) -> Option<&GridDay> {
        self.days.iter().find(|d| d.date == *date)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn is_partial(&self) -> bool {
        !self.missing_ranges.is_empty()
    }

    /// One error per missing date, for callers that surface them.
    pub fn missing_range_errors(&self) -> Vec<MeetGridError> {
        self.missing_ranges
            .iter()
            .map(|d| MeetGridError::MissingRange(crate::slot::format_date_key(d)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GridBuilder {
    granularity: Granularity,
}

impl GridBuilder {
    pub fn new(granularity: Granularity) -> Self {
        GridBuilder { granularity }
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn build(&self, definition: &EventDefinition) -> Grid {
        let step = self.granularity.minutes();
        let mut grid = Grid::default();

        for date in &definition.dates {
            let Some(range) = definition.time_range(date).filter(|r| !r.is_inverted()) else {
                warn!(date = %crate::slot::format_date_key(date), "missing time range, skipping date");
                grid.missing_ranges.push(*date);
                continue;
            };

            let end = minutes_since_midnight(&range.end);
            let slots: Vec<TimeSlot> = (minutes_since_midnight(&range.start)..=end)
                .step_by(step as usize)
                .filter_map(time_from_minutes)
                .map(|time| TimeSlot::new(*date, time))
                .collect();

            grid.index.extend(slots.iter().copied());
            grid.days.push(GridDay { date: *date, slots });
        }

        grid
    }
}
