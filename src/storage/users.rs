//! `users` collection

use super::{parsed_col, Database};
use crate::error::Result;
use crate::types::{Crypto, Fiat};
use chrono::Utc;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub telegram_id: String,
    pub has_started: bool,
    pub current_crypto: Crypto,
    pub current_fiat: Fiat,
    pub created_at: i64,
}

impl UserRecord {
    pub fn new(telegram_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            telegram_id: telegram_id.into(),
            has_started: false,
            current_crypto: Crypto::Btc,
            current_fiat: Fiat::Usd,
            created_at: Utc::now().timestamp(),
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            telegram_id: row.try_get("telegram_id")?,
            has_started: row.try_get("has_started")?,
            current_crypto: parsed_col(row, "current_crypto")?,
            current_fiat: parsed_col(row, "current_fiat")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl Database {
    /// Insert a new user document. Fails with `Duplicate` when the
    /// `telegramId` index is enforced and the id already exists.
    pub async fn insert_user(&self, user: &UserRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, telegram_id, has_started, current_crypto, current_fiat, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.telegram_id)
        .bind(user.has_started)
        .bind(user.current_crypto.code())
        .bind(user.current_fiat.code())
        .bind(user.created_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn find_user(&self, telegram_id: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query("SELECT * FROM users WHERE telegram_id = ? ORDER BY created_at LIMIT 1")
            .bind(telegram_id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(UserRecord::from_row).transpose()
    }

    /// Mark the user as started, creating the record on first contact.
    ///
    /// Returns `true` when the user had already started before.
    pub async fn start_user(&self, telegram_id: &str) -> Result<bool> {
        match self.find_user(telegram_id).await? {
            Some(user) if user.has_started => Ok(true),
            Some(user) => {
                sqlx::query("UPDATE users SET has_started = 1 WHERE id = ?")
                    .bind(&user.id)
                    .execute(self.pool())
                    .await?;
                Ok(false)
            }
            None => {
                let mut user = UserRecord::new(telegram_id);
                user.has_started = true;
                self.insert_user(&user).await?;
                Ok(false)
            }
        }
    }

    pub async fn set_user_crypto(&self, telegram_id: &str, crypto: Crypto) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET current_crypto = ? WHERE telegram_id = ?")
            .bind(crypto.code())
            .bind(telegram_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_user_fiat(&self, telegram_id: &str, fiat: Fiat) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET current_fiat = ? WHERE telegram_id = ?")
            .bind(fiat.code())
            .bind(telegram_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY created_at")
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(UserRecord::from_row).collect()
    }
}
