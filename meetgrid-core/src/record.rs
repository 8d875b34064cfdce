//! Availability records: the only shared mutable state.
//!
//! Conflict resolution is last-write-wins per [`RecordKey`]. Records are never
//! deleted; a participant un-marking a slot writes `available = false`, so the
//! removal propagates like any other write.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::event::EventId;
use crate::slot::TimeSlot;

/// Composite identity of a record: (event, participant, date, time).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub event_id: EventId,
    pub participant: String,
    pub slot: TimeSlot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    pub event_id: EventId,
    pub participant: String,
    #[serde(flatten)]
    pub slot: TimeSlot,
    pub available: bool,
    /// Store-assigned rank of the key's first write within its event. Records
    /// built locally carry `None` until a store has accepted them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

impl AvailabilityRecord {
    pub fn new(event_id: &EventId, participant: &str, slot: TimeSlot, available: bool) -> Self {
        AvailabilityRecord {
            event_id: event_id.clone(),
            participant: participant.trim().to_string(),
            slot,
            available,
            sequence: None,
        }
    }

    pub fn with_sequence(self, sequence: u64) -> Self {
        AvailabilityRecord { sequence: Some(sequence), ..self }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            event_id: self.event_id.clone(),
            participant: self.participant.clone(),
            slot: self.slot,
        }
    }
}

/// Collapse a batch so each key appears once, carrying its last value at the
/// position where the key was first seen.
pub fn dedupe_last_write(records: &[AvailabilityRecord]) -> Vec<AvailabilityRecord> {
    let mut positions: HashMap<RecordKey, usize> = HashMap::new();
    let mut out: Vec<AvailabilityRecord> = Vec::with_capacity(records.len());

    for record in records {
        match positions.get(&record.key()) {
            Some(&i) => out[i].available = record.available,
            None => {
                positions.insert(record.key(), out.len());
                out.push(record.clone());
            }
        }
    }

    out
}
