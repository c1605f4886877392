//! `admins` collection

use super::Database;
use crate::error::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

#[derive(Debug, Clone, PartialEq)]
pub struct AdminRecord {
    pub id: String,
    pub username: String,
    /// Hex HMAC of the API key; the plaintext is never stored
    pub api_key_hash: String,
    /// Epoch seconds
    pub api_key_expiry: i64,
    pub created_at: i64,
    /// Set by deactivation; a deactivated key never validates
    pub deactivated_at: Option<i64>,
}

impl AdminRecord {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            api_key_hash: row.try_get("api_key_hash")?,
            api_key_expiry: row.try_get("api_key_expiry")?,
            created_at: row.try_get("created_at")?,
            deactivated_at: row.try_get("deactivated_at")?,
        })
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.api_key_expiry
    }

    pub fn is_deactivated(&self) -> bool {
        self.deactivated_at.is_some()
    }
}

impl Database {
    /// Fails with `Duplicate` when the username is taken
    pub async fn insert_admin(&self, admin: &AdminRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO admins (id, username, api_key_hash, api_key_expiry, created_at, deactivated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&admin.id)
        .bind(&admin.username)
        .bind(&admin.api_key_hash)
        .bind(admin.api_key_expiry)
        .bind(admin.created_at)
        .bind(admin.deactivated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn find_admin(&self, username: &str) -> Result<Option<AdminRecord>> {
        let row = sqlx::query("SELECT * FROM admins WHERE username = ?")
            .bind(username)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(AdminRecord::from_row).transpose()
    }

    pub async fn find_admin_by_key_hash(&self, key_hash: &str) -> Result<Option<AdminRecord>> {
        let row = sqlx::query("SELECT * FROM admins WHERE api_key_hash = ?")
            .bind(key_hash)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(AdminRecord::from_row).transpose()
    }

    /// Replace key hash and expiry, clearing any deactivation. Returns
    /// false for an unknown admin.
    pub async fn update_admin_key(&self, username: &str, key_hash: &str, expiry: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE admins SET api_key_hash = ?, api_key_expiry = ?, deactivated_at = NULL WHERE username = ?",
        )
            .bind(key_hash)
            .bind(expiry)
            .bind(username)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke the key at `at`; returns false for an unknown admin
    pub async fn deactivate_admin(&self, username: &str, at: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE admins SET api_key_expiry = ?, deactivated_at = ? WHERE username = ?")
            .bind(at)
            .bind(at)
            .bind(username)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_admins(&self) -> Result<Vec<AdminRecord>> {
        let rows = sqlx::query("SELECT * FROM admins ORDER BY created_at")
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(AdminRecord::from_row).collect()
    }
}
