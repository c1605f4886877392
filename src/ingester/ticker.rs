//! Periodic price sampling onto the price topic

use crate::bus::{publish_json, EventSink};
use crate::error::Result;
use crate::market::PriceSource;
use crate::storage::Database;
use crate::types::{Crypto, PriceEvent};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub struct PriceTicker {
    db: Database,
    prices: Arc<dyn PriceSource>,
    sink: Arc<dyn EventSink>,
    topic: String,
    interval: Duration,
}

impl PriceTicker {
    pub fn new(
        db: Database,
        prices: Arc<dyn PriceSource>,
        sink: Arc<dyn EventSink>,
        topic: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            db,
            prices,
            sink,
            topic: topic.into(),
            interval,
        }
    }

    /// Cryptos someone cares about: alerted, held or tracked
    pub async fn symbols(&self) -> Result<BTreeSet<Crypto>> {
        let mut symbols: BTreeSet<Crypto> = self.db.watched_cryptos().await?.into_iter().collect();
        symbols.extend(self.db.held_cryptos().await?);
        symbols.extend(self.db.list_tracked().await?.into_iter().map(|t| t.symbol));
        Ok(symbols)
    }

    /// Publish one event per symbol. Returns how many were published.
    pub async fn tick(&self) -> Result<usize> {
        let mut published = 0;
        for crypto in self.symbols().await? {
            let quote = match self.prices.current_price(crypto).await {
                Ok(q) => q,
                Err(e) => {
                    tracing::warn!("⚠️ Price for {} unavailable: {}", crypto, e);
                    continue;
                }
            };
            let event = PriceEvent::new(crypto, quote.price, quote.timestamp);
            publish_json(self.sink.as_ref(), &self.topic, crypto.code(), &event).await?;
            published += 1;
        }
        Ok(published)
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("⏱️ Price ticker every {}s", self.interval.as_secs());
        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {
                    match self.tick().await {
                        Ok(0) => tracing::debug!("⏱️ Nothing to sample"),
                        Ok(n) => tracing::info!("⏱️ Published {} price events", n),
                        Err(e) => tracing::error!("❌ Price tick failed: {}", e),
                    }
                }
            }
        }
        tracing::info!("⏱️ Price ticker stopped");
    }
}
