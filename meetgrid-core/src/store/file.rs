//! JSON document store shared between processes.
//!
//! Every operation is a read (or read-modify-write) of one JSON file under an
//! `fs2` advisory lock on a sibling `.lock` file, so concurrent CLI invocations
//! serialize their upserts. Writes go to a temp file and are renamed into
//! place. There is no change feed; sessions on this store poll.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{MeetGridError, MeetGridResult};
use crate::event::{EventDefinition, EventId};
use crate::record::{AvailabilityRecord, RecordKey};
use crate::store::{AvailabilityStore, Subscription};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    events: BTreeMap<EventId, EventDefinition>,
    #[serde(default)]
    availability: Vec<AvailabilityRecord>,
}

impl StoreDocument {
    /// Apply a batch in order. The key index and per-event sequence counters
    /// are built once per batch; a new key gets the next sequence of its
    /// event, an existing key keeps its own.
    fn upsert_all(&mut self, records: &[AvailabilityRecord]) -> MeetGridResult<()> {
        let mut index: HashMap<RecordKey, usize> = HashMap::with_capacity(self.availability.len());
        let mut sequences: HashMap<EventId, u64> = HashMap::new();
        for (i, existing) in self.availability.iter().enumerate() {
            index.insert(existing.key(), i);
            let next = sequences.entry(existing.event_id.clone()).or_insert(0);
            *next = (*next + 1).max(existing.sequence.unwrap_or(0));
        }

        for record in records {
            if !self.events.contains_key(&record.event_id) {
                return Err(MeetGridError::EventNotFound(record.event_id.to_string()));
            }
            let key = record.key();
            match index.get(&key) {
                Some(&i) => self.availability[i].available = record.available,
                None => {
                    let next = sequences.entry(record.event_id.clone()).or_insert(0);
                    *next += 1;
                    index.insert(key, self.availability.len());
                    self.availability.push(record.clone().with_sequence(*next));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn open_lock(&self) -> MeetGridResult<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?)
    }

    fn read_document(&self) -> MeetGridResult<StoreDocument> {
        if !self.path.exists() {
            return Ok(StoreDocument::default());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(StoreDocument::default());
        }
        serde_json::from_str(&content).map_err(|e| {
            MeetGridError::Serialization(format!("{}: {}", self.path.display(), e))
        })
    }

    fn write_document(&self, doc: &StoreDocument) -> MeetGridResult<()> {
        let content = serde_json::to_string_pretty(doc)
            .map_err(|e| MeetGridError::Serialization(e.to_string()))?;
        let mut temp = self.path.as_os_str().to_owned();
        temp.push(".tmp");
        fs::write(&temp, content)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&StoreDocument) -> MeetGridResult<T>) -> MeetGridResult<T> {
        let lock = self.open_lock()?;
        FileExt::lock_shared(&lock)?;
        let result = self.read_document().and_then(|doc| f(&doc));
        FileExt::unlock(&lock)?;
        result
    }

    fn modify<T>(
        &self,
        f: impl FnOnce(&mut StoreDocument) -> MeetGridResult<T>,
    ) -> MeetGridResult<T> {
        let lock = self.open_lock()?;
        FileExt::lock_exclusive(&lock)?;
        let result = self.read_document().and_then(|mut doc| {
            let value = f(&mut doc)?;
            self.write_document(&doc)?;
            Ok(value)
        });
        FileExt::unlock(&lock)?;
        result
    }

    /// Run blocking file work off the async scheduler.
    async fn blocking<T, F>(&self, f: F) -> MeetGridResult<T>
    where
        T: Send + 'static,
        F: FnOnce(FileStore) -> MeetGridResult<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(store))
            .await
            .map_err(|e| MeetGridError::Transport(format!("store task failed: {e}")))?
    }
}

#[async_trait]
impl AvailabilityStore for FileStore {
    async fn create_event(&self, definition: &EventDefinition) -> MeetGridResult<EventId> {
        let definition = definition.clone();
        let id = self
            .blocking(move |store| {
                store.modify(|doc| {
                    let id = EventId::new(Uuid::new_v4().simple().to_string());
                    doc.events.insert(id.clone(), definition);
                    Ok(id)
                })
            })
            .await?;
        debug!(event_id = %id, path = %self.path.display(), "created event");
        Ok(id)
    }

    async fn load_event(&self, event_id: &EventId) -> MeetGridResult<EventDefinition> {
        let event_id = event_id.clone();
        self.blocking(move |store| {
            store.read(|doc| {
                doc.events
                    .get(&event_id)
                    .cloned()
                    .ok_or_else(|| MeetGridError::EventNotFound(event_id.to_string()))
            })
        })
        .await
    }

    async fn upsert_availability(&self, record: &AvailabilityRecord) -> MeetGridResult<()> {
        self.upsert_many(std::slice::from_ref(record)).await
    }

    async fn upsert_many(&self, records: &[AvailabilityRecord]) -> MeetGridResult<()> {
        let records = records.to_vec();
        self.blocking(move |store| {
            store.modify(|doc| doc.upsert_all(&records))
        })
        .await
    }

    async fn fetch_availability(
        &self,
        event_id: &EventId,
    ) -> MeetGridResult<Vec<AvailabilityRecord>> {
        let event_id = event_id.clone();
        self.blocking(move |store| {
            store.read(|doc| {
                if !doc.events.contains_key(&event_id) {
                    return Err(MeetGridError::EventNotFound(event_id.to_string()));
                }
                Ok(doc
                    .availability
                    .iter()
                    .filter(|r| r.event_id == event_id)
                    .cloned()
                    .collect())
            })
        })
        .await
    }

    async fn subscribe(&self, _event_id: &EventId) -> MeetGridResult<Subscription> {
        Err(MeetGridError::SubscriptionUnavailable(format!(
            "{} has no change feed",
            self.path.display()
        )))
    }
}
