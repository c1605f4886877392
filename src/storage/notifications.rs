//! `notifications` collection: price alerts per chat
//!
//! Transitions are conditional writes so that replays of the same price
//! event can never fire an alert twice.

use super::{decimal_col, opt_decimal_col, parsed_col, Database};
use crate::error::{BotError, Result};
use crate::types::{Crypto, Fiat, ThresholdType};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Threshold parameters by alert type
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationKind {
    Value {
        upper: Decimal,
        lower: Decimal,
    },
    Percent {
        up_percent: Decimal,
        down_percent: Decimal,
        /// Boundaries implied by the percentages at creation time
        upper: Decimal,
        lower: Decimal,
    },
    Ema {
        start_ema: Decimal,
        current_ema: Decimal,
        is_above: bool,
    },
}

impl NotificationKind {
    pub fn threshold_type(&self) -> ThresholdType {
        match self {
            NotificationKind::Value { .. } => ThresholdType::Value,
            NotificationKind::Percent { .. } => ThresholdType::Percent,
            NotificationKind::Ema { .. } => ThresholdType::Ema,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: String,
    pub chat_id: String,
    pub crypto: Crypto,
    pub fiat: Fiat,
    pub is_active: bool,
    /// Price in `fiat` when the alert was created
    pub start_price: Decimal,
    pub start_timestamp: i64,
    pub trigger_timestamp: Option<i64>,
    /// Timestamp of the newest price event applied to this alert
    pub last_event_ts: Option<i64>,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn threshold_type(&self) -> ThresholdType {
        self.kind.threshold_type()
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        let threshold: ThresholdType = parsed_col(row, "threshold_type")?;
        let missing = |col: &str| BotError::Internal(format!("{} alert without {}", threshold.as_str(), col));

        let kind = match threshold {
            ThresholdType::Value => NotificationKind::Value {
                upper: opt_decimal_col(row, "upper_boundary")?.ok_or_else(|| missing("upper_boundary"))?,
                lower: opt_decimal_col(row, "lower_boundary")?.ok_or_else(|| missing("lower_boundary"))?,
            },
            ThresholdType::Percent => NotificationKind::Percent {
                up_percent: opt_decimal_col(row, "up_percent")?.ok_or_else(|| missing("up_percent"))?,
                down_percent: opt_decimal_col(row, "down_percent")?.ok_or_else(|| missing("down_percent"))?,
                upper: opt_decimal_col(row, "upper_boundary")?.ok_or_else(|| missing("upper_boundary"))?,
                lower: opt_decimal_col(row, "lower_boundary")?.ok_or_else(|| missing("lower_boundary"))?,
            },
            ThresholdType::Ema => NotificationKind::Ema {
                start_ema: opt_decimal_col(row, "start_ema")?.ok_or_else(|| missing("start_ema"))?,
                current_ema: opt_decimal_col(row, "current_ema")?.ok_or_else(|| missing("current_ema"))?,
                is_above: row.try_get::<Option<bool>, _>("is_above")?.unwrap_or(false),
            },
        };

        Ok(Self {
            id: row.try_get("id")?,
            chat_id: row.try_get("chat_id")?,
            crypto: parsed_col(row, "crypto")?,
            fiat: parsed_col(row, "fiat")?,
            is_active: row.try_get("is_active")?,
            start_price: decimal_col(row, "start_price")?,
            start_timestamp: row.try_get("start_timestamp")?,
            trigger_timestamp: row.try_get("trigger_timestamp")?,
            last_event_ts: row.try_get("last_event_ts")?,
            kind,
        })
    }
}

fn dec_text(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.to_string())
}

impl Database {
    pub async fn insert_notification(&self, n: &Notification) -> Result<()> {
        let (upper, lower, up, down, start_ema, current_ema, is_above) = match &n.kind {
            NotificationKind::Value { upper, lower } => {
                (Some(*upper), Some(*lower), None, None, None, None, None)
            }
            NotificationKind::Percent { up_percent, down_percent, upper, lower } => {
                (Some(*upper), Some(*lower), Some(*up_percent), Some(*down_percent), None, None, None)
            }
            NotificationKind::Ema { start_ema, current_ema, is_above } => {
                (None, None, None, None, Some(*start_ema), Some(*current_ema), Some(*is_above))
            }
        };

        sqlx::query(
            "INSERT INTO notifications (id, chat_id, crypto, fiat, threshold_type, is_active, \
             upper_boundary, lower_boundary, start_price, start_timestamp, trigger_timestamp, \
             up_percent, down_percent, start_ema, current_ema, is_above, last_event_ts) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&n.id)
        .bind(&n.chat_id)
        .bind(n.crypto.code())
        .bind(n.fiat.code())
        .bind(n.threshold_type().as_str())
        .bind(n.is_active)
        .bind(dec_text(upper))
        .bind(dec_text(lower))
        .bind(n.start_price.to_string())
        .bind(n.start_timestamp)
        .bind(n.trigger_timestamp)
        .bind(dec_text(up))
        .bind(dec_text(down))
        .bind(dec_text(start_ema))
        .bind(dec_text(current_ema))
        .bind(is_above)
        .bind(n.last_event_ts)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn find_notification(&self, id: &str) -> Result<Option<Notification>> {
        let row = sqlx::query("SELECT * FROM notifications WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(Notification::from_row).transpose()
    }

    pub async fn active_notifications(&self) -> Result<Vec<Notification>> {
        let rows = sqlx::query("SELECT * FROM notifications WHERE is_active = 1 ORDER BY start_timestamp")
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(Notification::from_row).collect()
    }

    pub async fn active_notifications_for(&self, crypto: Crypto) -> Result<Vec<Notification>> {
        let rows = sqlx::query(
            "SELECT * FROM notifications WHERE is_active = 1 AND crypto = ? ORDER BY start_timestamp",
        )
        .bind(crypto.code())
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(Notification::from_row).collect()
    }

    pub async fn notifications_for_chat(&self, chat_id: &str) -> Result<Vec<Notification>> {
        let rows = sqlx::query("SELECT * FROM notifications WHERE chat_id = ? ORDER BY start_timestamp")
            .bind(chat_id)
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(Notification::from_row).collect()
    }

    /// Cryptos that have at least one active alert
    pub async fn watched_cryptos(&self) -> Result<Vec<Crypto>> {
        let rows = sqlx::query("SELECT DISTINCT crypto FROM notifications WHERE is_active = 1 ORDER BY crypto")
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(|row| parsed_col(row, "crypto")).collect()
    }

    pub async fn delete_notifications(
        &self,
        chat_id: &str,
        threshold: ThresholdType,
        crypto: Crypto,
    ) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM notifications WHERE chat_id = ? AND threshold_type = ? AND crypto = ?",
        )
        .bind(chat_id)
        .bind(threshold.as_str())
        .bind(crypto.code())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_all_notifications(&self, chat_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE chat_id = ?")
            .bind(chat_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// Deactivate a still-active alert. Returns false when another
    /// delivery already fired it (or it was deleted).
    pub async fn mark_triggered(&self, id: &str, trigger_ts: i64, event_ts: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET is_active = 0, trigger_timestamp = ?, last_event_ts = ? \
             WHERE id = ? AND is_active = 1",
        )
        .bind(trigger_ts)
        .bind(event_ts)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Advance EMA state. Only applies when `event_ts` is newer than the
    /// last applied event, so redelivered or stale events are ignored.
    pub async fn advance_ema(
        &self,
        id: &str,
        current_ema: Decimal,
        is_above: bool,
        event_ts: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET current_ema = ?, is_above = ?, last_event_ts = ? \
             WHERE id = ? AND is_active = 1 AND (last_event_ts IS NULL OR last_event_ts < ?)",
        )
        .bind(current_ema.to_string())
        .bind(is_above)
        .bind(event_ts)
        .bind(id)
        .bind(event_ts)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
