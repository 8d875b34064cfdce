pub mod create;
pub mod decode;
pub mod grid;
pub mod mark;
pub mod show;
pub mod watch;

use std::sync::Arc;

use anyhow::Result;
use meetgrid_core::{AvailabilityStore, EventDefinition, EventId, FileStore, MeetGridConfig};

/// The shared store every command works against.
pub fn open_store(config: &MeetGridConfig) -> Arc<FileStore> {
    Arc::new(FileStore::new(config.store_path()))
}

pub async fn load_event(store: &FileStore, event_id: &str) -> Result<(EventId, EventDefinition)> {
    let event_id = EventId::new(event_id.trim());
    let definition = store.load_event(&event_id).await?;
    Ok((event_id, definition))
}
