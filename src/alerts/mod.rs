//! Price alerts: creation, listing and removal
//!
//! Three kinds exist. VALUE fires once when the price leaves a band,
//! PERCENT fires once on a relative move from the creation price, and EMA
//! reports every crossing of a running exponential average seeded from a
//! 20-day simple average.

pub mod rules;


pub use rules::{ema_step, evaluate_alert, percent_crossing, value_crossing, Decision, EmaStep};

use crate::config::AlertConfig;
use crate::error::{BotError, Result};
use crate::market::CryptoInformation;
use crate::storage::{Database, Notification, NotificationKind};
use crate::types::{Crypto, Fiat, ThresholdType};
use crate::utils::{format_duration, retry_with_backoff, round_half_up};
use chrono::Utc;
use futures_util::future::join_all;
use rust_decimal::Decimal;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const SECONDS_PER_DAY: i64 = 86_400;
const EMA_HISTORY_DELAY: Duration = Duration::from_secs(1);

pub struct AlertService {
    db: Database,
    info: Arc<CryptoInformation>,
    config: AlertConfig,
    history_delay: Duration,
}

impl AlertService {
    pub fn new(db: Database, info: Arc<CryptoInformation>, config: AlertConfig) -> Self {
        Self {
            db,
            info,
            config,
            history_delay: EMA_HISTORY_DELAY,
        }
    }

    pub fn with_history_delay(mut self, delay: Duration) -> Self {
        self.history_delay = delay;
        self
    }

    fn new_alert(chat_id: &str, crypto: Crypto, fiat: Fiat, start_price: Decimal, start_ts: i64, kind: NotificationKind) -> Notification {
        Notification {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            crypto,
            fiat,
            is_active: true,
            start_price,
            start_timestamp: start_ts,
            trigger_timestamp: None,
            last_event_ts: None,
            kind,
        }
    }

    /// Band alert in `fiat`. Requires `max > min > 0`.
    pub async fn set_value(&self, chat_id: &str, crypto: Crypto, fiat: Fiat, max: Decimal, min: Decimal) -> Result<String> {
        if max <= Decimal::ZERO || min <= Decimal::ZERO {
            return Err(BotError::Validation("prices must be positive".into()));
        }
        if max <= min {
            return Err(BotError::Validation("maximum price must be greater than minimum".into()));
        }

        let quote = self.info.current_price(crypto, fiat).await?;
        let (upper, lower) = (round_half_up(max, 2), round_half_up(min, 2));
        let alert = Self::new_alert(
            chat_id,
            crypto,
            fiat,
            quote.price,
            quote.timestamp,
            NotificationKind::Value { upper, lower },
        );
        self.db.insert_notification(&alert).await?;
        tracing::info!("🔔 VALUE alert {} for {} [{} .. {}] {}", alert.id, crypto, lower, upper, fiat);

        Ok(format!(
            "✅ Alert set for {}\n💰 Current price: {} {}\n📈 Upper boundary: {} {}\n📉 Lower boundary: {} {}",
            crypto.code(),
            quote.price,
            fiat.code(),
            upper,
            fiat.code(),
            lower,
            fiat.code()
        ))
    }

    /// Relative-move alert. Boundaries are derived from the current price.
    pub async fn set_percent(&self, chat_id: &str, crypto: Crypto, fiat: Fiat, up: Decimal, down: Decimal) -> Result<String> {
        if up <= Decimal::ZERO || down <= Decimal::ZERO {
            return Err(BotError::Validation("percentages must be positive".into()));
        }

        let quote = self.info.current_price(crypto, fiat).await?;
        let (upper, lower) = percent_boundaries(quote.price, up, down);
        let alert = Self::new_alert(
            chat_id,
            crypto,
            fiat,
            quote.price,
            quote.timestamp,
            NotificationKind::Percent {
                up_percent: up,
                down_percent: down,
                upper,
                lower,
            },
        );
        self.db.insert_notification(&alert).await?;
        tracing::info!("🔔 PERCENT alert {} for {} +{}% / -{}%", alert.id, crypto, up, down);

        Ok(format!(
            "✅ Alert set for {}\n💰 Current price: {} {}\n📈 Rise: +{}%\n📉 Fall: -{}%",
            crypto.code(),
            quote.price,
            fiat.code(),
            round_half_up(up, 2),
            round_half_up(down, 2)
        ))
    }

    /// EMA alert seeded with the simple average of the last daily prices
    pub async fn set_ema(&self, chat_id: &str, crypto: Crypto, fiat: Fiat) -> Result<String> {
        let quote = self.info.current_price(crypto, fiat).await?;
        let sma_usd = self.daily_sma(crypto, quote.timestamp).await?;
        let sma = self.info.to_fiat(sma_usd, fiat).await?;

        let alert = Self::new_alert(
            chat_id,
            crypto,
            fiat,
            quote.price,
            quote.timestamp,
            NotificationKind::Ema {
                start_ema: sma,
                current_ema: sma,
                is_above: quote.price > sma,
            },
        );
        self.db.insert_notification(&alert).await?;
        tracing::info!("🔔 EMA alert {} for {} seeded at {} {}", alert.id, crypto, sma, fiat);

        Ok(format!(
            "✅ EMA alert set for {}\n💰 Current price: {} {}\n📈 Starting EMA (SMA {}): {} {}",
            crypto.code(),
            quote.price,
            fiat.code(),
            self.config.ema_period,
            sma,
            fiat.code()
        ))
    }

    /// USD average of one price per day going back `ema_period` days.
    /// Samples that still fail after retrying are left out.
    async fn daily_sma(&self, crypto: Crypto, now: i64) -> Result<Decimal> {
        let prices = self.info.prices();
        let fetches = (0..self.config.ema_period as i64).map(|i| {
            let ts = now - i * SECONDS_PER_DAY;
            async move {
                retry_with_backoff(
                    &format!("{} daily price", crypto),
                    self.config.history_retries,
                    self.history_delay,
                    true,
                    || prices.price_at(crypto, ts),
                )
                .await
            }
        });

        let samples: Vec<Decimal> = join_all(fetches)
            .await
            .into_iter()
            .filter_map(|r| match r {
                Ok(q) if q.price > Decimal::ZERO => Some(q.price),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!("⚠️ Skipping {} history sample: {}", crypto, e);
                    None
                }
            })
            .collect();

        if samples.is_empty() {
            return Err(BotError::Api(format!("no price history for {}", crypto)));
        }
        let sum: Decimal = samples.iter().copied().sum();
        Ok(round_half_up(sum / Decimal::from(samples.len()), 2))
    }

    pub async fn list(&self, chat_id: &str) -> Result<String> {
        let alerts = self.db.notifications_for_chat(chat_id).await?;
        if alerts.is_empty() {
            return Ok("📭 You have no alerts.".to_string());
        }

        let now = Utc::now().timestamp();
        let mut out = String::from("🔔 Your alerts:\n\n");
        for alert in &alerts {
            let fiat = alert.fiat.code();
            let emoji = match alert.threshold_type() {
                ThresholdType::Value => "💰",
                ThresholdType::Percent => "📊",
                ThresholdType::Ema => "📈",
            };
            let _ = writeln!(out, "{} {} ({})", emoji, alert.crypto.code(), alert.threshold_type().as_str());

            match &alert.kind {
                NotificationKind::Value { upper, lower } => {
                    let _ = writeln!(out, "   Upper boundary: {} {}", upper, fiat);
                    let _ = writeln!(out, "   Lower boundary: {} {}", lower, fiat);
                }
                NotificationKind::Percent { up_percent, down_percent, upper, lower } => {
                    let _ = writeln!(out, "   Rise: +{}%", round_half_up(*up_percent, 2));
                    let _ = writeln!(out, "   Fall: -{}%", round_half_up(*down_percent, 2));
                    let _ = writeln!(out, "   Upper boundary: {} {}", upper, fiat);
                    let _ = writeln!(out, "   Lower boundary: {} {}", lower, fiat);
                }
                NotificationKind::Ema { start_ema, current_ema, .. } => {
                    let _ = writeln!(out, "   Starting EMA: {} {}", start_ema, fiat);
                    let _ = writeln!(out, "   Current EMA: {} {}", round_half_up(*current_ema, 2), fiat);
                }
            }
            let _ = writeln!(out, "   Start price: {} {}", alert.start_price, fiat);

            if alert.threshold_type() == ThresholdType::Ema {
                let _ = writeln!(out, "   Running for: {}", format_duration(now - alert.start_timestamp));
            } else {
                let _ = writeln!(out, "   Status: {}", if alert.is_active { "✅" } else { "❌" });
                match alert.trigger_timestamp.filter(|_| !alert.is_active) {
                    Some(ts) => {
                        let _ = writeln!(out, "   Triggered: {} ago", format_duration(now - ts));
                    }
                    None => {
                        let _ = writeln!(out, "   Running for: {}", format_duration(now - alert.start_timestamp));
                    }
                }
            }
            out.push('\n');
        }
        Ok(out.trim_end().to_string())
    }

    pub async fn delete(&self, chat_id: &str, threshold: ThresholdType, crypto: Crypto) -> Result<String> {
        let removed = self.db.delete_notifications(chat_id, threshold, crypto).await?;
        Ok(if removed > 0 {
            format!("✅ Alert deleted: {} {}", threshold.short(), crypto.code())
        } else {
            format!("❌ Alert not found: {} {}", threshold.short(), crypto.code())
        })
    }

    pub async fn delete_all(&self, chat_id: &str) -> Result<String> {
        let removed = self.db.delete_all_notifications(chat_id).await?;
        Ok(if removed == 0 {
            "📭 You have no alerts to delete.".to_string()
        } else {
            format!("✅ Deleted {} alerts", removed)
        })
    }
}

/// Boundaries `price * (1 ± pct / 100)`, percent divided at scale 4 and
/// the result rounded to two decimals
pub fn percent_boundaries(price: Decimal, up: Decimal, down: Decimal) -> (Decimal, Decimal) {
    let up_ratio = round_half_up(up / Decimal::ONE_HUNDRED, 4);
    let down_ratio = round_half_up(down / Decimal::ONE_HUNDRED, 4);
    (
        round_half_up(price * (Decimal::ONE + up_ratio), 2),
        round_half_up(price * (Decimal::ONE - down_ratio), 2),
    )
}
