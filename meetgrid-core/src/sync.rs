//! Keeps a session's view of the group aggregate in step with the store.
//!
//! A [`SyncChannel`] owns the session's subscription. Local writes go out
//! through [`SyncChannel::push`]; remote writes come back as notifications
//! and are folded in by [`SyncChannel::next_update`]. Because every method
//! takes `&mut self`, notification handling for one session never overlaps.
//!
//! Reconciliation rules:
//! - `Refetch` (default): every wake-up refetches the event's full record set
//!   and rebuilds the aggregate.
//! - `Incremental`: deltas carried by notifications are merged into the
//!   running engine, but only when the store guarantees per-key delivery
//!   order. Otherwise this falls back to a refetch.
//!
//! If the store cannot subscribe, or the feed closes, the channel polls.
//! The channel subscribes before its first fetch, so a write landing between
//! the two is seen at least once; seeing it twice is harmless.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::aggregate::{Aggregate, AggregationEngine};
use crate::constants::DEFAULT_POLL_INTERVAL_SECS;
use crate::error::MeetGridResult;
use crate::event::EventId;
use crate::record::{AvailabilityRecord, dedupe_last_write};
use crate::store::{AvailabilityStore, Change, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    #[default]
    Refetch,
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Live,
    Polling,
}

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub strategy: SyncStrategy,
    pub poll_interval: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            strategy: SyncStrategy::default(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

enum Feed {
    Live(Subscription),
    Polling(Interval),
}

impl Feed {
    fn polling(period: Duration) -> Self {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Feed::Polling(interval)
    }
}

enum Wake {
    Changes(Vec<Change>),
    FeedClosed,
    Tick,
}

pub struct SyncChannel {
    store: Arc<dyn AvailabilityStore>,
    event_id: EventId,
    options: SyncOptions,
    engine: AggregationEngine,
    aggregate: Aggregate,
    feed: Feed,
}

impl SyncChannel {
    /// Start listening for changes, then fetch the current records. A failed
    /// fetch is returned; a failed subscribe degrades to polling.
    pub async fn open(
        store: Arc<dyn AvailabilityStore>,
        event_id: EventId,
        options: SyncOptions,
    ) -> MeetGridResult<Self> {
        let feed = match store.subscribe(&event_id).await {
            Ok(subscription) => Feed::Live(subscription),
            Err(e) => {
                warn!(event_id = %event_id, error = %e, "live updates unavailable, polling instead");
                Feed::polling(options.poll_interval)
            }
        };

        let records = store.fetch_availability(&event_id).await?;
        let engine = AggregationEngine::from_records(&records);
        debug!(event_id = %event_id, records = records.len(), "initial fetch");

        Ok(SyncChannel {
            aggregate: engine.snapshot(),
            store,
            event_id,
            options,
            engine,
            feed,
        })
    }

    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    pub fn aggregate(&self) -> &Aggregate {
        &self.aggregate
    }

    pub fn mode(&self) -> SyncMode {
        match self.feed {
            Feed::Live(_) => SyncMode::Live,
            Feed::Polling(_) => SyncMode::Polling,
        }
    }

    /// Upsert a batch. Duplicate keys in the batch collapse to their last
    /// value, and re-sending a batch that already landed changes nothing. On
    /// failure the error is returned and the aggregate is left as it was.
    pub async fn push(&mut self, records: &[AvailabilityRecord]) -> MeetGridResult<()> {
        let batch = dedupe_last_write(records);
        if batch.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.store.upsert_many(&batch).await {
            warn!(event_id = %self.event_id, records = batch.len(), error = %e, "push failed");
            return Err(e);
        }
        debug!(event_id = %self.event_id, records = batch.len(), "pushed");

        self.engine
            .extend(batch.iter().filter(|r| r.event_id == self.event_id));
        self.aggregate = self.engine.snapshot();
        Ok(())
    }

    /// Refetch everything and rebuild the aggregate. On failure the previous
    /// aggregate stays in place.
    pub async fn refresh(&mut self) -> MeetGridResult<&Aggregate> {
        let records = self.store.fetch_availability(&self.event_id).await?;
        debug!(event_id = %self.event_id, records = records.len(), "refetched");
        self.engine.rebuild(&records);
        self.aggregate = self.engine.snapshot();
        Ok(&self.aggregate)
    }

    /// Wait for the next notification (or poll tick) and bring the aggregate
    /// up to date. Notifications that queued up meanwhile are handled in the
    /// same pass.
    pub async fn next_update(&mut self) -> MeetGridResult<&Aggregate> {
        let wake = match &mut self.feed {
            Feed::Live(subscription) => match subscription.recv().await {
                Some(first) => {
                    let mut changes = vec![first];
                    changes.extend(subscription.drain());
                    Wake::Changes(changes)
                }
                None => Wake::FeedClosed,
            },
            Feed::Polling(interval) => {
                interval.tick().await;
                Wake::Tick
            }
        };

        match wake {
            Wake::Changes(changes) => self.reconcile(changes).await,
            Wake::FeedClosed => {
                warn!(event_id = %self.event_id, "change feed closed, polling instead");
                self.feed = Feed::polling(self.options.poll_interval);
                self.refresh().await
            }
            Wake::Tick => self.refresh().await,
        }
    }

    async fn reconcile(&mut self, changes: Vec<Change>) -> MeetGridResult<&Aggregate> {
        let deltas: Option<Vec<AvailabilityRecord>> =
            changes.into_iter().map(|c| c.record).collect();

        match deltas {
            Some(records)
                if self.options.strategy == SyncStrategy::Incremental
                    && self.store.ordered_delivery() =>
            {
                debug!(event_id = %self.event_id, records = records.len(), "merging deltas");
                self.engine
                    .extend(records.iter().filter(|r| r.event_id == self.event_id));
                self.aggregate = self.engine.snapshot();
                Ok(&self.aggregate)
            }
            _ => self.refresh().await,
        }
    }

    /// Release the subscription. Dropping the channel does the same.
    pub fn close(self) {
        if let Feed::Live(subscription) = self.feed {
            subscription.unsubscribe();
        }
    }
}
