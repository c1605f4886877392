//! Ingest consumer
//!
//! Polls a topic in batches and hands every record to a [`RecordHandler`].
//! A batch is split into lanes by `hash(key) % workers` so records sharing
//! a key (a chat id, a symbol) keep their order, while different keys are
//! processed concurrently. Offsets are committed once every lane is done.
//!
//! ```text
//! incoming  → ChatCommandHandler  → CommandProcessor → outgoing
//! prices    → PriceEventHandler   → Evaluator → Dispatcher → outgoing
//! outgoing  → OutgoingHandler     → Telegram sendMessage
//! ```

pub mod handlers;
pub mod ticker;


pub use handlers::{ChatCommandHandler, OutgoingHandler, PriceEventHandler};
pub use ticker::PriceTicker;

use crate::bus::{BusRecord, EventSource};
use crate::error::{BotError, Result};
use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Processes one record. Errors are logged by the consumer; records that
/// fail to decode count as poison and are skipped.
#[async_trait]
pub trait RecordHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, record: &BusRecord) -> Result<()>;
}

/// Per-batch counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub handled: usize,
    pub failed: usize,
    pub poison: usize,
}

impl BatchStats {
    fn merge(&mut self, other: BatchStats) {
        self.handled += other.handled;
        self.failed += other.failed;
        self.poison += other.poison;
    }
}

/// Lane index for a record key. Stable for the lifetime of the process.
pub fn lane_for(key: &str, workers: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % workers.max(1) as u64) as usize
}

/// Split a batch into `workers` lanes, preserving order within each lane
pub fn split_lanes(records: Vec<BusRecord>, workers: usize) -> Vec<Vec<BusRecord>> {
    let workers = workers.max(1);
    let mut lanes: Vec<Vec<BusRecord>> = (0..workers).map(|_| Vec::new()).collect();
    for record in records {
        lanes[lane_for(&record.key, workers)].push(record);
    }
    lanes
}

pub struct IngestConsumer {
    workers: usize,
    idle_backoff: Duration,
}

impl IngestConsumer {
    pub fn new(workers: usize, idle_backoff: Duration) -> Self {
        Self {
            workers: workers.max(1),
            idle_backoff,
        }
    }

    async fn run_lane(handler: &dyn RecordHandler, lane: Vec<BusRecord>) -> BatchStats {
        let mut stats = BatchStats::default();
        for record in lane {
            match handler.handle(&record).await {
                Ok(()) => stats.handled += 1,
                Err(BotError::Serialization(e)) => {
                    tracing::warn!(
                        "☠️ [{}] Skipping malformed record {}@{}: {}",
                        handler.name(),
                        record.topic,
                        record.offset,
                        e
                    );
                    stats.poison += 1;
                }
                Err(e) => {
                    tracing::error!(
                        "❌ [{}] Record {}@{} failed: {}",
                        handler.name(),
                        record.topic,
                        record.offset,
                        e
                    );
                    stats.failed += 1;
                }
            }
        }
        stats
    }

    /// Run every lane of one batch to completion
    pub async fn process_batch(&self, handler: &Arc<dyn RecordHandler>, records: Vec<BusRecord>) -> BatchStats {
        let lanes = split_lanes(records, self.workers);
        let results = join_all(
            lanes
                .into_iter()
                .filter(|lane| !lane.is_empty())
                .map(|lane| Self::run_lane(handler.as_ref(), lane)),
        )
        .await;

        let mut total = BatchStats::default();
        for stats in results {
            total.merge(stats);
        }
        total
    }

    /// Poll, process and commit until `shutdown` flips
    pub async fn run(
        &self,
        mut source: Box<dyn EventSource>,
        handler: Arc<dyn RecordHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!("🚀 [{}] Consumer started with {} lanes", handler.name(), self.workers);

        loop {
            if *shutdown.borrow() {
                break;
            }
            let polled = tokio::select! {
                _ = shutdown.changed() => break,
                polled = source.poll() => polled,
            };

            let records = match polled {
                Ok(records) => records,
                Err(e) => {
                    tracing::error!("❌ [{}] Poll failed: {}", handler.name(), e);
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(self.idle_backoff * 10) => {}
                    }
                    continue;
                }
            };

            if records.is_empty() {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(self.idle_backoff) => {}
                }
                continue;
            }

            let count = records.len();
            let stats = self.process_batch(&handler, records).await;
            tracing::debug!(
                "📦 [{}] Batch of {}: {} ok, {} failed, {} poison",
                handler.name(),
                count,
                stats.handled,
                stats.failed,
                stats.poison
            );

            if let Err(e) = source.commit().await {
                tracing::error!("❌ [{}] Commit failed, batch will be redelivered: {}", handler.name(), e);
            }
        }

        tracing::info!("🛑 [{}] Consumer stopped", handler.name());
    }
}
