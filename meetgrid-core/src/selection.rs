//! One participant's in-progress selection.
//!
//! The store only ever holds slots that exist in the grid it was built
//! against. It has no side effects beyond its own set; publishing changes is
//! the caller's job.

use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use crate::error::{MeetGridError, MeetGridResult};
use crate::event::EventId;
use crate::grid::Grid;
use crate::record::AvailabilityRecord;
use crate::slot::TimeSlot;

#[derive(Debug, Clone)]
pub struct SelectionStore {
    participant: String,
    universe: HashSet<TimeSlot>,
    selected: BTreeSet<TimeSlot>,
}

impl SelectionStore {
    pub fn new(participant: &str, grid: &Grid) -> Self {
        SelectionStore {
            participant: participant.trim().to_string(),
            universe: grid.slots().copied().collect(),
            selected: BTreeSet::new(),
        }
    }

    pub fn participant(&self) -> &str {
        &self.participant
    }

    fn check(&self, slot: &TimeSlot) -> MeetGridResult<()> {
        if self.universe.contains(slot) {
            Ok(())
        } else {
            Err(MeetGridError::SlotNotInGrid(slot.to_string()))
        }
    }

    /// Flip a slot. Returns the new membership.
    pub fn toggle(&mut self, slot: TimeSlot) -> MeetGridResult<bool> {
        self.check(&slot)?;
        if self.selected.remove(&slot) {
            Ok(false)
        } else {
            self.selected.insert(slot);
            Ok(true)
        }
    }

    /// Force a slot's membership. Returns whether anything changed.
    pub fn set(&mut self, slot: TimeSlot, available: bool) -> MeetGridResult<bool> {
        self.check(&slot)?;
        Ok(if available {
            self.selected.insert(slot)
        } else {
            self.selected.remove(&slot)
        })
    }

    /// Seed from a saved snapshot. Slots outside the grid are dropped;
    /// returns how many.
    pub fn replace_all(&mut self, slots: impl IntoIterator<Item = TimeSlot>) -> usize {
        let mut dropped = 0;
        self.selected.clear();
        for slot in slots {
            if self.universe.contains(&slot) {
                self.selected.insert(slot);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!(participant = %self.participant, dropped, "ignored saved slots outside the grid");
        }
        dropped
    }

    /// Switch to a new grid, dropping selections it no longer contains.
    pub fn retain_grid(&mut self, grid: &Grid) -> usize {
        self.universe = grid.slots().copied().collect();
        let before = self.selected.len();
        let universe = &self.universe;
        self.selected.retain(|s| universe.contains(s));
        before - self.selected.len()
    }

    pub fn contains(&self, slot: &TimeSlot) -> bool {
        self.selected.contains(slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeSlot> {
        self.selected.iter()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn record_for(&self, event_id: &EventId, slot: TimeSlot) -> AvailabilityRecord {
        AvailabilityRecord::new(event_id, &self.participant, slot, self.contains(&slot))
    }

    /// A record for every slot in the grid, true where selected. Re-publishing
    /// this batch brings the store in line with the local selection.
    pub fn snapshot_records(&self, event_id: &EventId) -> Vec<AvailabilityRecord> {
        let mut slots: Vec<_> = self.universe.iter().copied().collect();
        slots.sort();
        slots
            .into_iter()
            .map(|slot| self.record_for(event_id, slot))
            .collect()
    }
}
