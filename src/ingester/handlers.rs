//! Record handlers for the three topics

use super::RecordHandler;
use crate::bus::BusRecord;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::notify::{Dispatcher, Messenger, RecentMessages};
use crate::telegram::CommandProcessor;
use crate::types::{ChatMessage, PriceEvent};
use crate::utils::{mask_chat_id, mask_chat_ids_in_json};
use async_trait::async_trait;
use std::sync::Arc;

/// Price events: evaluate alerts, then dispatch
pub struct PriceEventHandler {
    evaluator: Evaluator,
    dispatcher: Dispatcher,
}

impl PriceEventHandler {
    pub fn new(evaluator: Evaluator, dispatcher: Dispatcher) -> Self {
        Self { evaluator, dispatcher }
    }
}

#[async_trait]
impl RecordHandler for PriceEventHandler {
    fn name(&self) -> &'static str {
        "prices"
    }

    async fn handle(&self, record: &BusRecord) -> Result<()> {
        let event: PriceEvent = record.decode()?;
        let decisions = self.evaluator.evaluate(&event).await?;
        if decisions.is_empty() {
            return Ok(());
        }
        let report = self.dispatcher.dispatch(decisions).await?;
        tracing::debug!("🔔 {} {}: {:?}", event.symbol, event.event_id, report);
        Ok(())
    }
}

/// Incoming chat messages: run the command, queue the reply
pub struct ChatCommandHandler {
    processor: Arc<CommandProcessor>,
    replies: Arc<dyn Messenger>,
}

impl ChatCommandHandler {
    pub fn new(processor: Arc<CommandProcessor>, replies: Arc<dyn Messenger>) -> Self {
        Self { processor, replies }
    }
}

#[async_trait]
impl RecordHandler for ChatCommandHandler {
    fn name(&self) -> &'static str {
        "incoming"
    }

    async fn handle(&self, record: &BusRecord) -> Result<()> {
        let message: ChatMessage = record.decode().inspect_err(|_| {
            tracing::debug!("Undecodable incoming payload: {}", mask_chat_ids_in_json(&record.payload_str()));
        })?;
        let reply = self.processor.process(&message.chat_id, &message.message).await;
        self.replies.send(&message.chat_id, &reply).await
    }
}

/// Outgoing messages: deliver to Telegram once per message id
pub struct OutgoingHandler {
    messenger: Arc<dyn Messenger>,
    recent: RecentMessages,
}

impl OutgoingHandler {
    pub fn new(messenger: Arc<dyn Messenger>, recent: RecentMessages) -> Self {
        Self { messenger, recent }
    }
}

#[async_trait]
impl RecordHandler for OutgoingHandler {
    fn name(&self) -> &'static str {
        "outgoing"
    }

    async fn handle(&self, record: &BusRecord) -> Result<()> {
        let message: ChatMessage = record.decode()?;
        if self.recent.contains(&message.message_id) {
            tracing::debug!("⏭️ Message {} already delivered", message.message_id);
            return Ok(());
        }
        self.messenger.send(&message.chat_id, &message.message).await?;
        self.recent.record(message.message_id);
        tracing::debug!("📤 Delivered {} to {}", message.message_id, mask_chat_id(&message.chat_id));
        Ok(())
    }
}
