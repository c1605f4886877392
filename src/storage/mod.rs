//! State store backed by SQLite via sqlx
//!
//! Tables mirror the `BitBotDB` collections described by [`SchemaPlan`].

pub mod admins;
pub mod notifications;
pub mod portfolios;
pub mod schema;
pub mod tracked;
pub mod users;

#[cfg(test)]
mod tests;

pub use admins::AdminRecord;
pub use notifications::{Notification, NotificationKind};
pub use portfolios::Holding;
pub use schema::SchemaPlan;
pub use tracked::TrackedCurrency;
pub use users::UserRecord;

use crate::error::{BotError, Result};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

const MEMORY_URL: &str = "sqlite::memory:";

/// Handle to the state store
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    plan: SchemaPlan,
}

impl Database {
    /// Open (creating if needed) the store at `path` and apply the plan
    pub async fn connect(path: &str, plan: SchemaPlan) -> Result<Self> {
        let in_memory = path == MEMORY_URL || path == ":memory:";

        let options = if in_memory {
            SqliteConnectOptions::from_str(MEMORY_URL)?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        BotError::Config(format!("cannot create {}: {}", parent.display(), e))
                    })?;
                }
            }
            SqliteConnectOptions::new().filename(path).create_if_missing(true)
        };

        // An in-memory database lives as long as its single connection.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;
        let db = Self { pool, plan };
        db.bootstrap().await?;

        tracing::info!(
            "🗄️ State store ready at {} ({} collections)",
            path,
            db.plan.collections.len()
        );
        Ok(db)
    }

    pub async fn in_memory(plan: SchemaPlan) -> Result<Self> {
        Self::connect(MEMORY_URL, plan).await
    }

    /// Apply every statement of the plan; safe to run repeatedly
    pub async fn bootstrap(&self) -> Result<()> {
        for statement in self.plan.sqlite_statements() {
            sqlx::query(&statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn plan(&self) -> &SchemaPlan {
        &self.plan
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Names of the collections present in the store
    pub async fn collections(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(BotError::from))
            .collect()
    }

    /// Cheap liveness check
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Decimals are stored as TEXT to keep exact scale
pub(crate) fn decimal_col(row: &SqliteRow, column: &str) -> Result<Decimal> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw)
        .map_err(|e| BotError::Internal(format!("bad decimal in {}: {}", column, e)))
}

pub(crate) fn opt_decimal_col(row: &SqliteRow, column: &str) -> Result<Option<Decimal>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| {
        Decimal::from_str(&s)
            .map_err(|e| BotError::Internal(format!("bad decimal in {}: {}", column, e)))
    })
    .transpose()
}

pub(crate) fn parsed_col<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: FromStr<Err = BotError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
}
