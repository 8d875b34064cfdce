//! In-process store with live change notifications.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{MeetGridError, MeetGridResult};
use crate::event::{EventDefinition, EventId};
use crate::record::{AvailabilityRecord, RecordKey};
use crate::store::{AvailabilityStore, Change, Subscription, SubscriptionId};

#[derive(Default)]
struct Inner {
    events: HashMap<EventId, EventDefinition>,
    records: HashMap<EventId, Vec<AvailabilityRecord>>,
    /// Position of each key inside its event's record list.
    index: HashMap<RecordKey, usize>,
    subscribers: HashMap<EventId, Vec<(SubscriptionId, mpsc::UnboundedSender<Change>)>>,
    next_subscription: SubscriptionId,
}

impl Inner {
    fn upsert(&mut self, record: &AvailabilityRecord) -> MeetGridResult<()> {
        if !self.events.contains_key(&record.event_id) {
            return Err(MeetGridError::EventNotFound(record.event_id.to_string()));
        }

        let records = self.records.entry(record.event_id.clone()).or_default();
        let key = record.key();
        // A key keeps the sequence of its first write.
        let stored = match self.index.get(&key) {
            Some(&i) => {
                records[i].available = record.available;
                records[i].clone()
            }
            None => {
                let stored = record.clone().with_sequence(records.len() as u64 + 1);
                self.index.insert(key, records.len());
                records.push(stored.clone());
                stored
            }
        };

        self.notify(&stored);
        Ok(())
    }

    /// Fan the write out to every live subscriber, pruning closed feeds.
    fn notify(&mut self, record: &AvailabilityRecord) {
        if let Some(subscribers) = self.subscribers.get_mut(&record.event_id) {
            subscribers.retain(|(_, tx)| {
                tx.send(Change {
                    event_id: record.event_id.clone(),
                    record: Some(record.clone()),
                })
                .is_ok()
            });
        }
    }

    fn remove_subscriber(&mut self, event_id: &EventId, id: SubscriptionId) {
        if let Some(subscribers) = self.subscribers.get_mut(event_id) {
            subscribers.retain(|(sid, _)| *sid != id);
        }
    }
}

/// Shared, cloneable in-memory store. Clones see the same data, so several
/// sessions in one process can collaborate through it.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MeetGridResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| MeetGridError::Transport("memory store lock poisoned".into()))
    }

    /// Number of live subscriptions on an event.
    pub fn subscriber_count(&self, event_id: &EventId) -> usize {
        self.lock()
            .map(|inner| inner.subscribers.get(event_id).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl AvailabilityStore for MemoryStore {
    async fn create_event(&self, definition: &EventDefinition) -> MeetGridResult<EventId> {
        let id = EventId::new(Uuid::new_v4().simple().to_string());
        self.lock()?.events.insert(id.clone(), definition.clone());
        debug!(event_id = %id, title = %definition.title, "created event");
        Ok(id)
    }

    async fn load_event(&self, event_id: &EventId) -> MeetGridResult<EventDefinition> {
        self.lock()?
            .events
            .get(event_id)
            .cloned()
            .ok_or_else(|| MeetGridError::EventNotFound(event_id.to_string()))
    }

    async fn upsert_availability(&self, record: &AvailabilityRecord) -> MeetGridResult<()> {
        self.lock()?.upsert(record)
    }

    async fn upsert_many(&self, records: &[AvailabilityRecord]) -> MeetGridResult<()> {
        let mut inner = self.lock()?;
        for record in records {
            inner.upsert(record)?;
        }
        Ok(())
    }

    async fn fetch_availability(
        &self,
        event_id: &EventId,
    ) -> MeetGridResult<Vec<AvailabilityRecord>> {
        let inner = self.lock()?;
        if !inner.events.contains_key(event_id) {
            return Err(MeetGridError::EventNotFound(event_id.to_string()));
        }
        Ok(inner.records.get(event_id).cloned().unwrap_or_default())
    }

    async fn subscribe(&self, event_id: &EventId) -> MeetGridResult<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock()?;
        if !inner.events.contains_key(event_id) {
            return Err(MeetGridError::EventNotFound(event_id.to_string()));
        }

        inner.next_subscription += 1;
        let id = inner.next_subscription;
        inner
            .subscribers
            .entry(event_id.clone())
            .or_default()
            .push((id, tx));

        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        let release_event = event_id.clone();
        Ok(Subscription::new(id, event_id.clone(), rx, move || {
            if let Some(shared) = weak.upgrade()
                && let Ok(mut inner) = shared.lock()
            {
                inner.remove_subscriber(&release_event, id);
            }
        }))
    }

    fn ordered_delivery(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::TimeSlot;
    use chrono::{NaiveDate, NaiveTime};

    fn slot(h: u32) -> TimeSlot {
        TimeSlot::new(
            NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
            NaiveTime::from_hms_opt(h, 0, 0).unwrap(),
        )
    }

    async fn store_with_event() -> (MemoryStore, EventId) {
        let store = MemoryStore::new();
        let id = store
            .create_event(&EventDefinition::new("Retro", None, "UTC"))
            .await
            .unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn test_upsert_overwrites_in_place() {
        let (store, id) = store_with_event().await;
        store
            .upsert_availability(&AvailabilityRecord::new(&id, "Alice", slot(9), true))
            .await
            .unwrap();
        store
            .upsert_availability(&AvailabilityRecord::new(&id, "Bob", slot(9), true))
            .await
            .unwrap();
        store
            .upsert_availability(&AvailabilityRecord::new(&id, "Alice", slot(9), false))
            .await
            .unwrap();

        let records = store.fetch_availability(&id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].participant, "Alice");
        assert!(!records[0].available);
        assert_eq!(records[1].participant, "Bob");
        assert_eq!(records[0].sequence, Some(1));
        assert_eq!(records[1].sequence, Some(2));
    }

    #[tokio::test]
    async fn test_unknown_event_is_rejected() {
        let store = MemoryStore::new();
        let missing = EventId::new("missing");
        let err = store
            .upsert_availability(&AvailabilityRecord::new(&missing, "Alice", slot(9), true))
            .await
            .unwrap_err();
        assert!(matches!(err, MeetGridError::EventNotFound(_)));
        assert!(store.fetch_availability(&missing).await.is_err());
    }

    #[tokio::test]
    async fn test_subscribers_receive_writes_and_release_on_drop() {
        let (store, id) = store_with_event().await;
        let mut sub = store.subscribe(&id).await.unwrap();
        assert_eq!(store.subscriber_count(&id), 1);

        let record = AvailabilityRecord::new(&id, "Alice", slot(9), true);
        store.upsert_availability(&record).await.unwrap();
        let change = sub.recv().await.unwrap();
        assert_eq!(change.record, Some(record.clone().with_sequence(1)));

        store
            .upsert_availability(&AvailabilityRecord::new(&id, "Alice", slot(9), false))
            .await
            .unwrap();
        let overwrite = sub.recv().await.unwrap().record.unwrap();
        assert!(!overwrite.available);
        assert_eq!(overwrite.sequence, Some(1));

        drop(sub);
        assert_eq!(store.subscriber_count(&id), 0);
    }

    #[tokio::test]
    async fn test_load_event_returns_definition() {
        let (store, id) = store_with_event().await;
        assert_eq!(store.load_event(&id).await.unwrap().title, "Retro");
    }
}
