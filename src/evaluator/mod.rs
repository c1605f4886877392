//! Matches price events against stored alerts
//!
//! Evaluation is read-only with respect to alerts: it returns the
//! decisions and leaves the conditional writes to the dispatcher, so an
//! event delivered twice produces the same decisions but only one write.

use crate::alerts::{evaluate_alert, Decision};
use crate::error::Result;
use crate::market::RateSource;
use crate::storage::Database;
use crate::types::{Fiat, PriceEvent};
use crate::utils::round_half_up;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

pub struct Evaluator {
    db: Database,
    rates: Arc<dyn RateSource>,
    smoothing: Decimal,
}

impl Evaluator {
    pub fn new(db: Database, rates: Arc<dyn RateSource>, smoothing: Decimal) -> Self {
        Self { db, rates, smoothing }
    }

    pub async fn evaluate(&self, event: &PriceEvent) -> Result<Vec<Decision>> {
        self.db.upsert_tracked(event.symbol, event.price, event.timestamp).await?;

        let alerts = self.db.active_notifications_for(event.symbol).await?;
        if alerts.is_empty() {
            return Ok(Vec::new());
        }

        // One rate lookup per fiat in this batch of alerts. A failed lookup
        // is remembered as None and only that fiat's alerts are skipped.
        let mut fiat_prices: HashMap<Fiat, Option<Decimal>> = HashMap::new();
        let mut decisions = Vec::new();

        for alert in &alerts {
            // Alerts only react to prices observed after they were set
            if event.timestamp < alert.start_timestamp {
                tracing::debug!("⏭️ Event for {} predates alert {}", event.symbol, alert.id);
                continue;
            }

            let price = match fiat_prices.get(&alert.fiat) {
                Some(cached) => *cached,
                None => {
                    let converted = match self.rates.usd_to(alert.fiat).await {
                        Ok(rate) => Some(round_half_up(event.price * rate, 2)),
                        Err(e) => {
                            tracing::warn!(
                                "⚠️ No {} rate, skipping {} alerts in it: {}",
                                alert.fiat,
                                event.symbol,
                                e
                            );
                            None
                        }
                    };
                    fiat_prices.insert(alert.fiat, converted);
                    converted
                }
            };
            let Some(price) = price else { continue };

            if let Some(decision) = evaluate_alert(alert, price, event.timestamp, self.smoothing) {
                decisions.push(decision);
            }
        }

        tracing::debug!(
            "🧮 {} @ {} checked against {} alerts, {} decisions",
            event.symbol,
            event.price,
            alerts.len(),
            decisions.len()
        );
        Ok(decisions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Notification, NotificationKind};
    use crate::testing;
    use crate::types::Crypto;
    use rust_decimal_macros::dec;

    fn alert(fiat: Fiat, kind: NotificationKind) -> Notification {
        Notification {
            id: uuid::Uuid::new_v4().to_string(),
            chat_id: "c1".into(),
            crypto: Crypto::Btc,
            fiat,
            is_active: true,
            start_price: dec!(100),
            start_timestamp: 1_000,
            trigger_timestamp: None,
            last_event_ts: None,
            kind,
        }
    }

    #[tokio::test]
    async fn test_evaluate_converts_to_alert_fiat() {
        let db = testing::memory_db().await;
        // 110 USD is 99 EUR: inside the EUR band, above the USD one
        db.insert_notification(&alert(Fiat::Eur, NotificationKind::Value { upper: dec!(100), lower: dec!(50) }))
            .await
            .unwrap();
        db.insert_notification(&alert(Fiat::Usd, NotificationKind::Value { upper: dec!(105), lower: dec!(50) }))
            .await
            .unwrap();

        let evaluator = Evaluator::new(db.clone(), testing::rates(), dec!(0.05));
        let decisions = evaluator.evaluate(&PriceEvent::new(Crypto::Btc, dec!(110), 2_000)).await.unwrap();

        assert_eq!(decisions.len(), 1);
        assert!(decisions[0].message().unwrap().contains("110.00 USD"));
    }

    #[tokio::test]
    async fn test_missing_rate_only_skips_that_fiat() {
        let db = testing::memory_db().await;
        for _ in 0..2 {
            db.insert_notification(&alert(Fiat::Gbp, NotificationKind::Value { upper: dec!(105), lower: dec!(50) }))
                .await
                .unwrap();
        }
        let usd = alert(Fiat::Usd, NotificationKind::Value { upper: dec!(105), lower: dec!(50) });
        db.insert_notification(&usd).await.unwrap();

        // The fixture rates have EUR only
        let evaluator = Evaluator::new(db.clone(), testing::rates(), dec!(0.05));
        let decisions = evaluator.evaluate(&PriceEvent::new(Crypto::Btc, dec!(500), 2_000)).await.unwrap();

        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].alert_id(), usd.id);
        assert!(decisions[0].message().unwrap().contains("500.00 USD"));
        assert!(db.list_tracked().await.unwrap().iter().any(|t| t.last_price == dec!(500)));
    }

    #[tokio::test]
    async fn test_evaluate_skips_events_before_alert_start() {
        let db = testing::memory_db().await;
        db.insert_notification(&alert(Fiat::Usd, NotificationKind::Value { upper: dec!(105), lower: dec!(50) }))
            .await
            .unwrap();

        let evaluator = Evaluator::new(db, testing::rates(), dec!(0.05));
        let decisions = evaluator.evaluate(&PriceEvent::new(Crypto::Btc, dec!(500), 999)).await.unwrap();
        assert!(decisions.is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_refreshes_tracked_price() {
        let db = testing::memory_db().await;
        let evaluator = Evaluator::new(db.clone(), testing::rates(), dec!(0.05));
        evaluator.evaluate(&PriceEvent::new(Crypto::Ltc, dec!(70), 5)).await.unwrap();

        let tracked = db.list_tracked().await.unwrap();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].last_price, dec!(70));
    }

    #[tokio::test]
    async fn test_ema_alert_always_yields_a_decision() {
        let db = testing::memory_db().await;
        db.insert_notification(&alert(
            Fiat::Usd,
            NotificationKind::Ema { start_ema: dec!(100), current_ema: dec!(100), is_above: false },
        ))
        .await
        .unwrap();

        let evaluator = Evaluator::new(db, testing::rates(), dec!(0.05));
        let decisions = evaluator.evaluate(&PriceEvent::new(Crypto::Btc, dec!(99), 2_000)).await.unwrap();
        assert_eq!(decisions.len(), 1);
        assert!(matches!(&decisions[0], Decision::Ema { message: None, is_above: false, .. }));
    }
}
