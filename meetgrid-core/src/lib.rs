//! Core engine for meetgrid group scheduling.
//!
//! An organizer proposes dates with a time window each; participants mark the
//! slots they can make, and everyone sees how many people (and who) are
//! available for each slot:
//! - `grid` turns an `EventDefinition` into the ordered slot grid
//! - `selection` holds one participant's marks
//! - `aggregate` folds everyone's records into counts and member lists
//! - `sync` keeps a session's aggregate current against an `AvailabilityStore`
//! - `codec` moves event definitions through URLs

pub mod aggregate;
pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod grid;
pub mod record;
pub mod selection;
pub mod session;
pub mod slot;
pub mod store;
pub mod sync;

pub use crate::config::MeetGridConfig;
pub use aggregate::{Aggregate, AggregateCell, AggregationEngine};
pub use error::{MeetGridError, MeetGridResult, ValidationError};
pub use event::{EventDefinition, EventId, TimeRange};
pub use grid::{Granularity, Grid, GridBuilder, GridDay};
pub use record::{AvailabilityRecord, RecordKey};
pub use selection::SelectionStore;
pub use session::{ParticipantSession, SessionOptions};
pub use slot::TimeSlot;
pub use store::{AvailabilityStore, FileStore, MemoryStore, Subscription};
pub use sync::{SyncChannel, SyncMode, SyncOptions, SyncStrategy};
