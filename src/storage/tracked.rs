//! `TrackedCryptoCurrencies` collection (optional variant)

use super::{decimal_col, parsed_col, schema, Database};
use crate::error::Result;
use crate::types::Crypto;
use rust_decimal::Decimal;
use sqlx::Row;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedCurrency {
    pub symbol: Crypto,
    /// Last seen USD price
    pub last_price: Decimal,
    pub updated_at: i64,
}

impl Database {
    pub fn tracks_currencies(&self) -> bool {
        self.plan().has_collection(schema::TRACKED_CURRENCIES)
    }

    /// Record the latest price. No-op when the collection is not part of
    /// the plan. Older observations never overwrite newer ones.
    pub async fn upsert_tracked(&self, symbol: Crypto, price: Decimal, timestamp: i64) -> Result<()> {
        if !self.tracks_currencies() {
            return Ok(());
        }
        sqlx::query(
            "INSERT INTO TrackedCryptoCurrencies (symbol, last_price, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(symbol) DO UPDATE SET last_price = excluded.last_price, updated_at = excluded.updated_at \
             WHERE excluded.updated_at >= TrackedCryptoCurrencies.updated_at",
        )
        .bind(symbol.code())
        .bind(price.to_string())
        .bind(timestamp)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn list_tracked(&self) -> Result<Vec<TrackedCurrency>> {
        if !self.tracks_currencies() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query("SELECT * FROM TrackedCryptoCurrencies ORDER BY symbol")
            .fetch_all(self.pool())
            .await?;
        rows.iter()
            .map(|row| {
                Ok(TrackedCurrency {
                    symbol: parsed_col(row, "symbol")?,
                    last_price: decimal_col(row, "last_price")?,
                    updated_at: row.try_get("updated_at")?,
                })
            })
            .collect()
    }
}
