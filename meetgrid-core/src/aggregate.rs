//! Group availability: per-slot counts and member lists.
//!
//! The engine keeps, for every slot, each participant's latest vote. Members
//! are listed by the store's first-write sequence, so every session that holds
//! the same record set lists them the same way; records the store has not
//! ranked yet follow in the order they were first seen. Cells are never stored;
//! they are folded from the votes on demand, so a cell always equals the
//! aggregate of the current record set.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::record::AvailabilityRecord;
use crate::slot::TimeSlot;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateCell {
    pub count: usize,
    pub members: Vec<String>,
}

impl AggregateCell {
    pub fn contains(&self, participant: &str) -> bool {
        self.members.iter().any(|m| m == participant)
    }
}

#[derive(Debug, Clone)]
struct Vote {
    participant: String,
    available: bool,
    sequence: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct AggregationEngine {
    votes: BTreeMap<TimeSlot, Vec<Vote>>,
}

impl AggregationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a AvailabilityRecord>) -> Self {
        let mut engine = Self::new();
        engine.extend(records);
        engine
    }

    /// Fold one record in, overwriting any earlier vote for the same key.
    /// Returns whether the slot's cell changed.
    pub fn apply(&mut self, record: &AvailabilityRecord) -> bool {
        let votes = self.votes.entry(record.slot).or_default();

        match votes.iter().position(|v| v.participant == record.participant) {
            Some(i) => {
                let vote = &mut votes[i];
                let ranked = record.sequence.is_some() && vote.sequence != record.sequence;
                if ranked {
                    vote.sequence = record.sequence;
                }
                let flipped = vote.available != record.available;
                vote.available = record.available;
                flipped || (ranked && vote.available)
            }
            None => {
                votes.push(Vote {
                    participant: record.participant.clone(),
                    available: record.available,
                    sequence: record.sequence,
                });
                record.available
            }
        }
    }

    pub fn extend<'a>(&mut self, records: impl IntoIterator<Item = &'a AvailabilityRecord>) {
        for record in records {
            self.apply(record);
        }
    }

    pub fn reset(&mut self) {
        self.votes.clear();
    }

    /// Replace all state with a freshly fetched record set.
    pub fn rebuild<'a>(&mut self, records: impl IntoIterator<Item = &'a AvailabilityRecord>) {
        self.reset();
        self.extend(records);
    }

    pub fn cell(&self, slot: &TimeSlot) -> AggregateCell {
        self.votes
            .get(slot)
            .map(|votes| fold(votes))
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Aggregate {
        let cells = self
            .votes
            .iter()
            .map(|(slot, votes)| (*slot, fold(votes)))
            .filter(|(_, cell)| cell.count > 0)
            .collect();
        Aggregate { cells }
    }
}

fn fold(votes: &[Vote]) -> AggregateCell {
    let mut available: Vec<&Vote> = votes.iter().filter(|v| v.available).collect();
    // Stable: unranked votes keep first-seen order behind the ranked ones.
    available.sort_by_key(|v| v.sequence.unwrap_or(u64::MAX));
    let members: Vec<String> = available.iter().map(|v| v.participant.clone()).collect();
    AggregateCell {
        count: members.len(),
        members,
    }
}

/// Aggregate a record set in one pass. Later records win over earlier ones
/// with the same key.
pub fn aggregate<'a>(records: impl IntoIterator<Item = &'a AvailabilityRecord>) -> Aggregate {
    AggregationEngine::from_records(records).snapshot()
}

/// Read-only view of the group's availability. Slots nobody marked are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    cells: BTreeMap<TimeSlot, AggregateCell>,
}

impl Aggregate {
    /// The cell for a slot; empty if nobody is available.
    pub fn cell(&self, slot: &TimeSlot) -> AggregateCell {
        self.cells.get(slot).cloned().unwrap_or_default()
    }

    pub fn count(&self, slot: &TimeSlot) -> usize {
        self.cells.get(slot).map_or(0, |c| c.count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TimeSlot, &AggregateCell)> {
        self.cells.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn max_count(&self) -> usize {
        self.cells.values().map(|c| c.count).max().unwrap_or(0)
    }

    /// Slots with the highest count, in slot order.
    pub fn best_slots(&self) -> Vec<TimeSlot> {
        let max = self.max_count();
        if max == 0 {
            return Vec::new();
        }
        self.cells
            .iter()
            .filter(|(_, c)| c.count == max)
            .map(|(s, _)| *s)
            .collect()
    }

    /// Everyone available for at least one slot, in slot order of first
    /// appearance.
    pub fn participants(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for cell in self.cells.values() {
            for member in &cell.members {
                if !seen.contains(member) {
                    seen.push(member.clone());
                }
            }
        }
        seen
    }

    /// The slots a participant is currently available for.
    pub fn selection_of(&self, participant: &str) -> Vec<TimeSlot> {
        self.cells
            .iter()
            .filter(|(_, c)| c.contains(participant))
            .map(|(s, _)| *s)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventId;
    use chrono::{NaiveDate, NaiveTime};

    fn slot(h: u32) -> TimeSlot {
        TimeSlot::new(
            NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
            NaiveTime::from_hms_opt(h, 0, 0).unwrap(),
        )
    }

    fn rec(name: &str, h: u32, available: bool) -> AvailabilityRecord {
        AvailabilityRecord::new(&EventId::new("evt"), name, slot(h), available)
    }

    #[test]
    fn test_last_write_wins_per_key() {
        let records = [rec("A", 9, true), rec("B", 9, true), rec("A", 9, false)];
        let agg = aggregate(&records);
        assert_eq!(
            agg.cell(&slot(9)),
            AggregateCell {
                count: 1,
                members: vec!["B".to_string()],
            }
        );
    }

    #[test]
    fn test_toggle_off_then_on_counts_once() {
        let records = [rec("A", 9, true), rec("A", 9, false), rec("A", 9, true)];
        let agg = aggregate(&records);
        assert_eq!(agg.count(&slot(9)), 1);
        assert_eq!(agg.cell(&slot(9)).members, vec!["A"]);
    }

    #[test]
    fn test_explicit_false_equals_absence() {
        let agg = aggregate(&[rec("A", 9, false)]);
        assert!(agg.is_empty());
        assert_eq!(agg.cell(&slot(9)), AggregateCell::default());
    }

    #[test]
    fn test_member_order_is_batch_insertion_order() {
        let records = [rec("Zoe", 9, true), rec("Adam", 9, true), rec("Mia", 9, true)];
        assert_eq!(aggregate(&records).cell(&slot(9)).members, vec!["Zoe", "Adam", "Mia"]);
    }

    #[test]
    fn test_member_order_follows_store_sequence() {
        let records = [
            rec("Alice", 9, true).with_sequence(2),
            rec("Bob", 9, true).with_sequence(1),
            rec("Carol", 9, true),
        ];
        assert_eq!(aggregate(&records).cell(&slot(9)).members, vec!["Bob", "Alice", "Carol"]);
    }

    #[test]
    fn test_arrival_order_does_not_change_members() {
        let bob = rec("Bob", 9, true).with_sequence(1);
        let alice = rec("Alice", 9, true).with_sequence(2);

        let mut seen_local_first = AggregationEngine::new();
        seen_local_first.apply(&rec("Alice", 9, true));
        seen_local_first.apply(&bob);
        seen_local_first.apply(&alice);

        assert_eq!(seen_local_first.snapshot(), aggregate(&[bob, alice]));
        assert_eq!(seen_local_first.cell(&slot(9)).members, vec!["Bob", "Alice"]);
    }

    #[test]
    fn test_ranking_an_available_vote_is_a_change() {
        let mut engine = AggregationEngine::new();
        engine.apply(&rec("A", 9, true));
        assert!(engine.apply(&rec("A", 9, true).with_sequence(1)));
        assert!(!engine.apply(&rec("A", 9, true).with_sequence(1)));
    }

    #[test]
    fn test_reapplying_same_batch_is_idempotent() {
        let records = [rec("A", 9, true), rec("B", 10, true), rec("A", 10, true)];
        let mut engine = AggregationEngine::from_records(&records);
        let once = engine.snapshot();
        engine.extend(&records);
        assert_eq!(engine.snapshot(), once);
    }

    #[test]
    fn test_apply_reports_cell_changes() {
        let mut engine = AggregationEngine::new();
        assert!(engine.apply(&rec("A", 9, true)));
        assert!(!engine.apply(&rec("A", 9, true)));
        assert!(engine.apply(&rec("A", 9, false)));
        assert!(!engine.apply(&rec("B", 9, false)));
    }

    #[test]
    fn test_incremental_matches_full_fold() {
        let records = [
            rec("A", 9, true),
            rec("B", 9, true),
            rec("A", 10, true),
            rec("A", 9, false),
            rec("C", 10, true),
            rec("A", 9, true),
        ];
        let mut engine = AggregationEngine::new();
        for r in &records {
            engine.apply(r);
        }
        assert_eq!(engine.snapshot(), aggregate(&records));
    }

    #[test]
    fn test_summary_helpers() {
        let records = [
            rec("A", 9, true),
            rec("B", 10, true),
            rec("A", 10, true),
            rec("C", 11, true),
            rec("B", 11, true),
        ];
        let agg = aggregate(&records);
        assert_eq!(agg.max_count(), 2);
        assert_eq!(agg.best_slots(), vec![slot(10), slot(11)]);
        assert_eq!(agg.participants(), vec!["A", "B", "C"]);
        assert_eq!(agg.selection_of("A"), vec![slot(9), slot(10)]);
        assert!(agg.selection_of("Nobody").is_empty());
    }
}
