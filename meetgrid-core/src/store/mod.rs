//! The persistence collaborator.
//!
//! Engines never reach a backend directly; they are handed an
//! [`AvailabilityStore`] and talk to it through this narrow interface. The
//! store is the single point of mutual exclusion: it must serialize upserts
//! per [`RecordKey`](crate::record::RecordKey), and the last write for a key
//! wins.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::MeetGridResult;
use crate::event::{EventDefinition, EventId};
use crate::record::AvailabilityRecord;

pub type SubscriptionId = u64;

/// Notification that a record of an event was created or updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub event_id: EventId,
    /// The written record, when the store delivers deltas.
    pub record: Option<AvailabilityRecord>,
}

#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    /// Persist a new event and return its store-assigned id.
    async fn create_event(&self, definition: &EventDefinition) -> MeetGridResult<EventId>;

    async fn load_event(&self, event_id: &EventId) -> MeetGridResult<EventDefinition>;

    /// Insert or overwrite the record with the same composite key.
    async fn upsert_availability(&self, record: &AvailabilityRecord) -> MeetGridResult<()>;

    async fn upsert_many(&self, records: &[AvailabilityRecord]) -> MeetGridResult<()> {
        for record in records {
            self.upsert_availability(record).await?;
        }
        Ok(())
    }

    /// All records of an event. Records come back in store order; an upsert
    /// overwrites in place rather than moving the record.
    async fn fetch_availability(&self, event_id: &EventId)
    -> MeetGridResult<Vec<AvailabilityRecord>>;

    /// Register for change notifications on one event.
    async fn subscribe(&self, event_id: &EventId) -> MeetGridResult<Subscription>;

    /// Whether notifications for a key arrive in the order of that key's
    /// writes. Without this guarantee, deltas must not be trusted.
    fn ordered_delivery(&self) -> bool {
        false
    }
}

/// A live registration with a store. Released exactly once, either through
/// [`Subscription::unsubscribe`] or on drop.
pub struct Subscription {
    id: SubscriptionId,
    event_id: EventId,
    changes: mpsc::UnboundedReceiver<Change>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        id: SubscriptionId,
        event_id: EventId,
        changes: mpsc::UnboundedReceiver<Change>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Subscription {
            id,
            event_id,
            changes,
            release: Some(Box::new(release)),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    /// Wait for the next change. `None` once the store has dropped the feed.
    pub async fn recv(&mut self) -> Option<Change> {
        self.changes.recv().await
    }

    /// Take every change that has already arrived.
    pub fn drain(&mut self) -> Vec<Change> {
        let mut pending = Vec::new();
        while let Ok(change) = self.changes.try_recv() {
            pending.push(change);
        }
        pending
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event_id", &self.event_id)
            .finish()
    }
}
