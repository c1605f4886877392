//! `portfolios` collection: one holding per (chat, crypto)

use super::{decimal_col, opt_decimal_col, parsed_col, Database};
use crate::error::{BotError, Result};
use crate::types::Crypto;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub id: String,
    pub chat_id: String,
    pub crypto: Crypto,
    pub count: Decimal,
    /// USD price recorded at the last valuation
    pub last_price: Option<Decimal>,
    pub last_price_ts: Option<i64>,
    pub updated_at: i64,
}

impl Holding {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            chat_id: row.try_get("chat_id")?,
            crypto: parsed_col(row, "crypto")?,
            count: decimal_col(row, "count")?,
            last_price: opt_decimal_col(row, "last_price")?,
            last_price_ts: row.try_get("last_price_ts")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl Database {
    pub async fn find_holding(&self, chat_id: &str, crypto: Crypto) -> Result<Option<Holding>> {
        let row = sqlx::query("SELECT * FROM portfolios WHERE chat_id = ? AND crypto = ?")
            .bind(chat_id)
            .bind(crypto.code())
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(Holding::from_row).transpose()
    }

    pub async fn list_holdings(&self, chat_id: &str) -> Result<Vec<Holding>> {
        let rows = sqlx::query("SELECT * FROM portfolios WHERE chat_id = ? ORDER BY crypto")
            .bind(chat_id)
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(Holding::from_row).collect()
    }

    /// Increase a holding, creating it when absent. Returns the new count.
    pub async fn add_to_holding(
        &self,
        chat_id: &str,
        crypto: Crypto,
        amount: Decimal,
        usd_price: Decimal,
        price_ts: i64,
    ) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(BotError::Validation("amount must be positive".into()));
        }

        let mut tx = self.pool().begin().await?;
        let existing = sqlx::query("SELECT * FROM portfolios WHERE chat_id = ? AND crypto = ?")
            .bind(chat_id)
            .bind(crypto.code())
            .fetch_optional(&mut *tx)
            .await?;
        let now = Utc::now().timestamp();

        let new_count = match existing.as_ref().map(Holding::from_row).transpose()? {
            Some(holding) => {
                let count = holding.count + amount;
                sqlx::query(
                    "UPDATE portfolios SET count = ?, last_price = ?, last_price_ts = ?, updated_at = ? WHERE id = ?",
                )
                .bind(count.to_string())
                .bind(usd_price.to_string())
                .bind(price_ts)
                .bind(now)
                .bind(&holding.id)
                .execute(&mut *tx)
                .await?;
                count
            }
            None => {
                sqlx::query(
                    "INSERT INTO portfolios (id, chat_id, crypto, count, last_price, last_price_ts, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(Uuid::new_v4().to_string())
                .bind(chat_id)
                .bind(crypto.code())
                .bind(amount.to_string())
                .bind(usd_price.to_string())
                .bind(price_ts)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                amount
            }
        };

        tx.commit().await?;
        Ok(new_count)
    }

    /// Decrease a holding. The entry disappears when it reaches zero.
    /// Returns the remaining count.
    pub async fn remove_from_holding(
        &self,
        chat_id: &str,
        crypto: Crypto,
        amount: Decimal,
    ) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(BotError::Validation("amount must be positive".into()));
        }

        let mut tx = self.pool().begin().await?;
        let row = sqlx::query("SELECT * FROM portfolios WHERE chat_id = ? AND crypto = ?")
            .bind(chat_id)
            .bind(crypto.code())
            .fetch_optional(&mut *tx)
            .await?;
        let holding = row
            .as_ref()
            .map(Holding::from_row)
            .transpose()?
            .ok_or_else(|| BotError::NotFound(format!("no {} in portfolio", crypto)))?;

        if holding.count < amount {
            return Err(BotError::InsufficientFunds {
                symbol: crypto.code().to_string(),
                available: holding.count,
            });
        }

        let remaining = holding.count - amount;
        if remaining.is_zero() {
            sqlx::query("DELETE FROM portfolios WHERE id = ?")
                .bind(&holding.id)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query("UPDATE portfolios SET count = ?, updated_at = ? WHERE id = ?")
                .bind(remaining.to_string())
                .bind(Utc::now().timestamp())
                .bind(&holding.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(remaining)
    }

    pub async fn delete_holding(&self, chat_id: &str, crypto: Crypto) -> Result<bool> {
        let result = sqlx::query("DELETE FROM portfolios WHERE chat_id = ? AND crypto = ?")
            .bind(chat_id)
            .bind(crypto.code())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all_holdings(&self, chat_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM portfolios WHERE chat_id = ?")
            .bind(chat_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// Record the valuation price for one holding
    pub async fn update_holding_price(&self, id: &str, usd_price: Decimal, price_ts: i64) -> Result<()> {
        sqlx::query("UPDATE portfolios SET last_price = ?, last_price_ts = ? WHERE id = ?")
            .bind(usd_price.to_string())
            .bind(price_ts)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Every crypto held by at least one user
    pub async fn held_cryptos(&self) -> Result<Vec<Crypto>> {
        let rows = sqlx::query("SELECT DISTINCT crypto FROM portfolios ORDER BY crypto")
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(|row| parsed_col(row, "crypto")).collect()
    }
}
