//! Notification dispatch
//!
//! Every decision is persisted with a conditional write before anything is
//! sent. A write that touches no row means another delivery of the same
//! event got there first, and the message is dropped.

pub mod dedup;


pub use dedup::RecentMessages;

use crate::alerts::Decision;
use crate::bus::{publish_json, EventSink};
use crate::error::Result;
use crate::storage::Database;
use crate::types::ChatMessage;
use crate::utils::mask_chat_id;
use async_trait::async_trait;
use std::sync::Arc;

/// Anything that can deliver a text to a chat
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, chat_id: &str, text: &str) -> Result<()>;
}

/// Publishes replies on the outgoing topic, keyed by chat id
pub struct BusMessenger {
    sink: Arc<dyn EventSink>,
    topic: String,
}

impl BusMessenger {
    pub fn new(sink: Arc<dyn EventSink>, topic: impl Into<String>) -> Self {
        Self { sink, topic: topic.into() }
    }
}

#[async_trait]
impl Messenger for BusMessenger {
    async fn send(&self, chat_id: &str, text: &str) -> Result<()> {
        let message = ChatMessage::new(chat_id, text);
        publish_json(self.sink.as_ref(), &self.topic, chat_id, &message).await
    }
}

/// Outcome counters for one dispatch call
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Conditional writes that changed state
    pub applied: usize,
    /// Decisions whose write was already applied by an earlier delivery
    pub skipped: usize,
    pub sent: usize,
}

pub struct Dispatcher {
    db: Database,
    messenger: Arc<dyn Messenger>,
}

impl Dispatcher {
    pub fn new(db: Database, messenger: Arc<dyn Messenger>) -> Self {
        Self { db, messenger }
    }

    /// Apply decisions in order. A store error stops at that decision and
    /// is returned; the consumer logs it and still commits the record, so
    /// an unapplied alert waits for the next price event. A send error
    /// after a successful write is logged.
    pub async fn dispatch(&self, decisions: Vec<Decision>) -> Result<DispatchReport> {
        let mut report = DispatchReport::default();

        for decision in decisions {
            let applied = match &decision {
                Decision::Trigger { alert_id, event_ts, .. } => {
                    self.db.mark_triggered(alert_id, *event_ts, *event_ts).await?
                }
                Decision::Ema { alert_id, event_ts, ema, is_above, .. } => {
                    self.db.advance_ema(alert_id, *ema, *is_above, *event_ts).await?
                }
            };

            if !applied {
                tracing::debug!("⏭️ Alert {} already at or past this event", decision.alert_id());
                report.skipped += 1;
                continue;
            }
            report.applied += 1;

            let Some(text) = decision.message() else {
                continue;
            };
            match self.messenger.send(decision.chat_id(), text).await {
                Ok(()) => {
                    tracing::info!("📤 Alert {} sent to {}", decision.alert_id(), mask_chat_id(decision.chat_id()));
                    report.sent += 1;
                }
                Err(e) => {
                    tracing::error!(
                        "❌ Alert {} for {} was recorded but not sent: {}",
                        decision.alert_id(),
                        mask_chat_id(decision.chat_id()),
                        e
                    );
                }
            }
        }

        Ok(report)
    }
}
