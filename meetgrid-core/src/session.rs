//! One participant's session on one event.
//!
//! The session ties the pieces together: it builds the grid, restores the
//! participant's earlier selection from the group aggregate, and publishes
//! every change through its [`SyncChannel`]. The local selection is the
//! user-visible truth; a failed publish leaves it alone and queues the records
//! for [`ParticipantSession::retry_pending`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::aggregate::Aggregate;
use crate::error::{MeetGridError, MeetGridResult, ValidationError};
use crate::event::{EventDefinition, EventId};
use crate::grid::{Granularity, Grid, GridBuilder};
use crate::record::{AvailabilityRecord, dedupe_last_write};
use crate::selection::SelectionStore;
use crate::slot::TimeSlot;
use crate::store::AvailabilityStore;
use crate::sync::{SyncChannel, SyncMode, SyncOptions};

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    pub granularity: Granularity,
    pub sync: SyncOptions,
}

pub struct ParticipantSession {
    event_id: EventId,
    definition: EventDefinition,
    grid: Grid,
    selection: SelectionStore,
    channel: SyncChannel,
    pending: Vec<AvailabilityRecord>,
}

impl ParticipantSession {
    /// Enter an event under a display name. A returning participant gets the
    /// selection they saved earlier.
    pub async fn join(
        store: Arc<dyn AvailabilityStore>,
        event_id: EventId,
        definition: EventDefinition,
        participant: &str,
        options: SessionOptions,
    ) -> MeetGridResult<Self> {
        let participant = participant.trim();
        if participant.is_empty() {
            return Err(ValidationError::EmptyParticipantName.into());
        }

        let grid = GridBuilder::new(options.granularity).build(&definition);
        let channel = SyncChannel::open(store, event_id.clone(), options.sync).await?;

        let mut selection = SelectionStore::new(participant, &grid);
        selection.replace_all(channel.aggregate().selection_of(participant));
        info!(
            event_id = %event_id,
            participant,
            slots = grid.len(),
            restored = selection.len(),
            "joined event"
        );

        Ok(ParticipantSession {
            event_id,
            definition,
            grid,
            selection,
            channel,
            pending: Vec::new(),
        })
    }

    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    pub fn participant(&self) -> &str {
        self.selection.participant()
    }

    pub fn definition(&self) -> &EventDefinition {
        &self.definition
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn selection(&self) -> &SelectionStore {
        &self.selection
    }

    pub fn aggregate(&self) -> &Aggregate {
        self.channel.aggregate()
    }

    pub fn mode(&self) -> SyncMode {
        self.channel.mode()
    }

    /// Records that have not reached the store yet.
    pub fn pending(&self) -> &[AvailabilityRecord] {
        &self.pending
    }

    /// Flip one slot and publish it. Returns the new membership, which
    /// stands even if publishing fails.
    pub async fn toggle(&mut self, slot: TimeSlot) -> MeetGridResult<bool> {
        let available = self.selection.toggle(slot)?;
        let record = self.selection.record_for(&self.event_id, slot);
        self.publish(vec![record]).await?;
        Ok(available)
    }

    /// Mark (or unmark) several slots at once, as a drag selection does.
    /// Nothing changes if any slot is outside the grid.
    pub async fn select(&mut self, slots: &[TimeSlot], available: bool) -> MeetGridResult<()> {
        if let Some(unknown) = slots.iter().find(|s| !self.grid.contains(s)) {
            return Err(MeetGridError::SlotNotInGrid(unknown.to_string()));
        }

        let mut records = Vec::with_capacity(slots.len());
        for slot in slots {
            self.selection.set(*slot, available)?;
            records.push(self.selection.record_for(&self.event_id, *slot));
        }
        self.publish(records).await
    }

    /// Re-send whatever failed to publish earlier.
    pub async fn retry_pending(&mut self) -> MeetGridResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.publish(Vec::new()).await
    }

    /// Publish the whole local selection, true and false alike, so the store
    /// matches it exactly.
    pub async fn resync(&mut self) -> MeetGridResult<()> {
        let records = self.selection.snapshot_records(&self.event_id);
        self.publish(records).await
    }

    /// Rebuild the grid at a new step. Selected slots that no longer exist
    /// are dropped locally.
    pub fn set_granularity(&mut self, granularity: Granularity) -> usize {
        self.grid = GridBuilder::new(granularity).build(&self.definition);
        let dropped = self.selection.retain_grid(&self.grid);
        if dropped > 0 {
            debug!(participant = %self.participant(), dropped, "dropped slots after grid change");
        }
        dropped
    }

    async fn publish(&mut self, records: Vec<AvailabilityRecord>) -> MeetGridResult<()> {
        let mut batch = std::mem::take(&mut self.pending);
        batch.extend(records);
        let batch = dedupe_last_write(&batch);

        match self.channel.push(&batch).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(
                    participant = %self.participant(),
                    pending = batch.len(),
                    error = %e,
                    "keeping changes for retry"
                );
                self.pending = batch;
                Err(e)
            }
        }
    }

    /// Wait for the group view to change.
    pub async fn next_update(&mut self) -> MeetGridResult<&Aggregate> {
        self.channel.next_update().await
    }

    pub async fn refresh(&mut self) -> MeetGridResult<&Aggregate> {
        self.channel.refresh().await
    }

    /// End the session, releasing the live subscription. Unsent changes are
    /// reported in the log and dropped with the session.
    pub fn close(self) {
        if !self.pending.is_empty() {
            warn!(
                participant = %self.participant(),
                pending = self.pending.len(),
                "closing with unsent changes"
            );
        }
        self.channel.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TimeRange;
    use crate::store::{MemoryStore, Subscription};
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime};
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct OfflineSwitch {
        inner: MemoryStore,
        offline: AtomicBool,
    }

    #[async_trait]
    impl AvailabilityStore for OfflineSwitch {
        async fn create_event(&self, definition: &EventDefinition) -> MeetGridResult<EventId> {
            self.inner.create_event(definition).await
        }

        async fn load_event(&self, event_id: &EventId) -> MeetGridResult<EventDefinition> {
            self.inner.load_event(event_id).await
        }

        async fn upsert_availability(&self, record: &AvailabilityRecord) -> MeetGridResult<()> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(MeetGridError::Transport("offline".into()));
            }
            self.inner.upsert_availability(record).await
        }

        async fn fetch_availability(
            &self,
            event_id: &EventId,
        ) -> MeetGridResult<Vec<AvailabilityRecord>> {
            self.inner.fetch_availability(event_id).await
        }

        async fn subscribe(&self, event_id: &EventId) -> MeetGridResult<Subscription> {
            self.inner.subscribe(event_id).await
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 1).unwrap()
    }

    fn slot(h: u32, m: u32) -> TimeSlot {
        TimeSlot::new(date(), NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn definition() -> EventDefinition {
        EventDefinition::new("Workshop", None, "UTC")
            .with_range(date(), "09:00-11:00".parse::<TimeRange>().unwrap())
    }

    fn options() -> SessionOptions {
        SessionOptions {
            granularity: Granularity::HALF_HOUR,
            sync: SyncOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let id = store.create_event(&definition()).await.unwrap();
        let result = ParticipantSession::join(store, id, definition(), "   ", options()).await;
        assert!(matches!(
            result,
            Err(MeetGridError::Validation(ValidationError::EmptyParticipantName))
        ));
    }

    #[tokio::test]
    async fn test_returning_participant_gets_selection_back() {
        let store = Arc::new(MemoryStore::new());
        let id = store.create_event(&definition()).await.unwrap();

        let mut first = ParticipantSession::join(store.clone(), id.clone(), definition(), "Alice", options())
            .await
            .unwrap();
        first.select(&[slot(9, 0), slot(9, 30)], true).await.unwrap();
        first.toggle(slot(9, 0)).await.unwrap();
        first.close();

        let again = ParticipantSession::join(store.clone(), id, definition(), "Alice", options())
            .await
            .unwrap();
        let restored: Vec<_> = again.selection().iter().copied().collect();
        assert_eq!(restored, vec![slot(9, 30)]);
    }

    #[tokio::test]
    async fn test_failed_toggle_keeps_local_state_and_retries() {
        let store = Arc::new(OfflineSwitch::default());
        let id = store.create_event(&definition()).await.unwrap();
        let mut session = ParticipantSession::join(store.clone(), id.clone(), definition(), "Alice", options())
            .await
            .unwrap();

        store.offline.store(true, Ordering::SeqCst);
        let err = session.toggle(slot(10, 0)).await.unwrap_err();
        assert!(err.is_recoverable());
        assert!(session.selection().contains(&slot(10, 0)));
        assert_eq!(session.pending().len(), 1);

        store.offline.store(false, Ordering::SeqCst);
        session.retry_pending().await.unwrap();
        assert!(session.pending().is_empty());
        assert_eq!(session.aggregate().cell(&slot(10, 0)).members, vec!["Alice"]);
        assert_eq!(store.fetch_availability(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_select_outside_grid_changes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let id = store.create_event(&definition()).await.unwrap();
        let mut session = ParticipantSession::join(store.clone(), id.clone(), definition(), "Alice", options())
            .await
            .unwrap();

        let err = session.select(&[slot(9, 0), slot(12, 0)], true).await.unwrap_err();
        assert!(matches!(err, MeetGridError::SlotNotInGrid(_)));
        assert!(session.selection().is_empty());
        assert!(store.fetch_availability(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_coarser_grid_drops_half_hour_selections() {
        let store = Arc::new(MemoryStore::new());
        let id = store.create_event(&definition()).await.unwrap();
        let mut session = ParticipantSession::join(store, id, definition(), "Alice", options())
            .await
            .unwrap();
        session.select(&[slot(9, 0), slot(9, 30)], true).await.unwrap();

        assert_eq!(session.set_granularity(Granularity::HOUR), 1);
        assert!(session.selection().contains(&slot(9, 0)));
        assert!(!session.selection().contains(&slot(9, 30)));
    }

    #[tokio::test]
    async fn test_resync_publishes_unmarked_slots_too() {
        let store = Arc::new(MemoryStore::new());
        let id = store.create_event(&definition()).await.unwrap();
        let mut session = ParticipantSession::join(store.clone(), id.clone(), definition(), "Alice", options())
            .await
            .unwrap();
        session.toggle(slot(9, 0)).await.unwrap();
        session.resync().await.unwrap();

        let records = store.fetch_availability(&id).await.unwrap();
        assert_eq!(records.len(), session.grid().len());
        assert_eq!(records.iter().filter(|r| r.available).count(), 1);
    }
}
