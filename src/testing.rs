//! Shared fixtures for unit and pipeline tests

use crate::config::{AlertConfig, DatabaseConfig};
use crate::error::{BotError, Result};
use crate::market::converter::FixedRates;
use crate::market::{CryptoInformation, PriceSource};
use crate::notify::Messenger;
use crate::storage::{Database, SchemaPlan};
use crate::types::{Crypto, Fiat, PriceQuote};
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const NOW: i64 = 1_700_000_000;

/// Settable prices; historical lookups return the same price unless a
/// specific timestamp was set
#[derive(Default)]
pub struct StaticPrices {
    current: Mutex<HashMap<Crypto, Decimal>>,
    history: Mutex<HashMap<(Crypto, i64), Decimal>>,
}

impl StaticPrices {
    pub fn new(prices: impl IntoIterator<Item = (Crypto, Decimal)>) -> Self {
        Self {
            current: Mutex::new(prices.into_iter().collect()),
            history: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, crypto: Crypto, price: Decimal) {
        self.current.lock().insert(crypto, price);
    }

    pub fn set_at(&self, crypto: Crypto, timestamp: i64, price: Decimal) {
        self.history.lock().insert((crypto, timestamp), price);
    }
}

#[async_trait]
impl PriceSource for StaticPrices {
    async fn current_price(&self, crypto: Crypto) -> Result<PriceQuote> {
        let price = self
            .current
            .lock()
            .get(&crypto)
            .copied()
            .ok_or_else(|| BotError::Api(format!("no price for {}", crypto)))?;
        Ok(PriceQuote { crypto, price, timestamp: NOW })
    }

    async fn price_at(&self, crypto: Crypto, timestamp: i64) -> Result<PriceQuote> {
        if let Some(price) = self.history.lock().get(&(crypto, timestamp)).copied() {
            return Ok(PriceQuote { crypto, price, timestamp });
        }
        let quote = self.current_price(crypto).await?;
        Ok(PriceQuote { timestamp, ..quote })
    }
}

/// Messenger that keeps everything it was asked to send
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, chat_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(chat, _)| chat == chat_id)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, chat_id: &str, text: &str) -> Result<()> {
        self.sent.lock().push((chat_id.to_string(), text.to_string()));
        Ok(())
    }
}

pub async fn memory_db() -> Database {
    match Database::in_memory(SchemaPlan::for_config(&DatabaseConfig::default())).await {
        Ok(db) => db,
        Err(e) => panic!("in-memory database: {}", e),
    }
}

/// USD 1:1, EUR at 0.9
pub fn rates() -> Arc<FixedRates> {
    Arc::new(FixedRates::new([(Fiat::Eur, dec!(0.9))]))
}

pub fn info(prices: Arc<StaticPrices>) -> Arc<CryptoInformation> {
    Arc::new(CryptoInformation::new(prices, rates()).with_history_delay(Duration::from_millis(1)))
}

pub fn alert_config() -> AlertConfig {
    AlertConfig::default()
}
