//! Telegram Bot API over reqwest
//!
//! Long-polls `getUpdates` and posts replies with `sendMessage`. The
//! poller does no command handling itself: every text message goes onto
//! the incoming topic and is processed by the ingest consumer.

use crate::bus::{publish_json, EventSink};
use crate::config::TelegramConfig;
use crate::error::{BotError, Result};
use crate::notify::Messenger;
use crate::types::ChatMessage;
use crate::utils::mask_chat_id;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub chat: TelegramChat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
}

/// Escape the characters the HTML parse mode treats as markup
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    base_url: String,
    poll_timeout: u64,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        if config.bot_token.is_empty() {
            return Err(BotError::Config("telegram.bot_token is not set".into()));
        }
        // The long-poll must fit inside the request timeout
        let http = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 10))
            .build()?;
        Ok(Self {
            http,
            base_url: format!("{}/bot{}", config.api_url.trim_end_matches('/'), config.bot_token),
            poll_timeout: config.poll_timeout_secs,
        })
    }

    fn unwrap_response<T>(response: ApiResponse<T>, method: &str) -> Result<T> {
        match (response.ok, response.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(BotError::Api(format!(
                "{} failed: {}",
                method,
                response.description.unwrap_or_else(|| "no description".into())
            ))),
        }
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>> {
        let url = format!("{}/getUpdates", self.base_url);
        let response: ApiResponse<Vec<TelegramUpdate>> = self
            .http
            .get(&url)
            .query(&[("offset", offset.to_string()), ("timeout", self.poll_timeout.to_string())])
            .send()
            .await?
            .json()
            .await?;
        Self::unwrap_response(response, "getUpdates")
    }

    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let url = format!("{}/sendMessage", self.base_url);
        let request = SendMessageRequest {
            chat_id,
            text: escape_html(text),
            parse_mode: "HTML",
        };
        let response: ApiResponse<serde_json::Value> =
            self.http.post(&url).json(&request).send().await?.json().await?;
        Self::unwrap_response(response, "sendMessage")?;
        Ok(())
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send(&self, chat_id: &str, text: &str) -> Result<()> {
        self.send_message(chat_id, text).await
    }
}

/// Moves Telegram updates onto the incoming topic
pub struct UpdatePoller {
    client: TelegramClient,
    sink: Arc<dyn EventSink>,
    topic: String,
    offset: i64,
}

impl UpdatePoller {
    pub fn new(client: TelegramClient, sink: Arc<dyn EventSink>, topic: impl Into<String>) -> Self {
        Self {
            client,
            sink,
            topic: topic.into(),
            offset: 0,
        }
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Publish one batch of updates and advance the offset past every
    /// update that was handled. A failed publish stops the batch so the
    /// update is fetched again next time.
    pub async fn forward(&mut self, updates: Vec<TelegramUpdate>) -> Result<usize> {
        let mut forwarded = 0;
        for update in updates {
            if let Some(message) = update.message {
                if let Some(text) = message.text {
                    let chat_id = message.chat.id.to_string();
                    let envelope = ChatMessage::new(chat_id.clone(), text);
                    publish_json(self.sink.as_ref(), &self.topic, &chat_id, &envelope).await?;
                    tracing::debug!("📥 Message from {} queued", mask_chat_id(&chat_id));
                    forwarded += 1;
                }
            }
            self.offset = update.update_id + 1;
        }
        Ok(forwarded)
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("📡 Telegram update poller started");
        loop {
            let updates = tokio::select! {
                _ = shutdown.changed() => break,
                result = self.client.get_updates(self.offset) => result,
            };

            match updates {
                Ok(updates) => {
                    if let Err(e) = self.forward(updates).await {
                        tracing::error!("❌ Failed to queue Telegram update: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
                Err(e) => {
                    tracing::error!("❌ Failed to poll Telegram updates: {}", e);
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(Duration::from_secs(5)) => {}
                    }
                }
            }
        }
        tracing::info!("📡 Telegram update poller stopped");
    }
}
