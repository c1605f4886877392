//! Admin API keys
//!
//! Keys are random UUIDs handed out once. Only an HMAC-SHA256 of the key
//! (keyed with `admin.key_secret`) is stored, so lookups hash the
//! presented key and search by hash.

use crate::config::AdminConfig;
use crate::error::{BotError, Result};
use crate::storage::{AdminRecord, Database};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const SECONDS_PER_DAY: i64 = 86_400;

/// Result of checking a presented key
#[derive(Debug, Clone, PartialEq)]
pub enum KeyStatus {
    Valid(AdminRecord),
    Expired(AdminRecord),
    Invalid,
}

/// A freshly issued key. `key` is the only copy of the plaintext.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedKey {
    pub username: String,
    pub key: String,
    pub expires_at: i64,
}

pub struct AdminService {
    db: Database,
    config: AdminConfig,
}

impl AdminService {
    pub fn new(db: Database, config: AdminConfig) -> Self {
        Self { db, config }
    }

    pub fn hash_key(&self, key: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.config.key_secret.as_bytes())
            .map_err(|e| BotError::Internal(format!("hmac key: {}", e)))?;
        mac.update(key.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn expiry_from(&self, now: i64) -> i64 {
        now + self.config.key_ttl_days * SECONDS_PER_DAY
    }

    /// Chat ids allowed to manage admins over Telegram
    pub fn is_admin_chat(&self, chat_id: &str) -> bool {
        self.config.telegram_chat_ids.iter().any(|id| id == chat_id)
    }

    pub async fn create(&self, username: &str) -> Result<IssuedKey> {
        let username = username.trim();
        if username.is_empty() {
            return Err(BotError::Validation("username must not be empty".into()));
        }

        let key = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();
        let record = AdminRecord {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            api_key_hash: self.hash_key(&key)?,
            api_key_expiry: self.expiry_from(now),
            created_at: now,
            deactivated_at: None,
        };
        self.db.insert_admin(&record).await?;
        tracing::info!("🔑 Admin {} created, key valid until {}", username, record.api_key_expiry);

        Ok(IssuedKey {
            username: record.username,
            key,
            expires_at: record.api_key_expiry,
        })
    }

    pub async fn validate(&self, key: &str) -> Result<KeyStatus> {
        if key.is_empty() {
            return Ok(KeyStatus::Invalid);
        }
        let hash = self.hash_key(key)?;
        Ok(match self.db.find_admin_by_key_hash(&hash).await? {
            Some(admin) if admin.is_deactivated() => KeyStatus::Invalid,
            Some(admin) if admin.is_expired(Utc::now().timestamp()) => KeyStatus::Expired(admin),
            Some(admin) => KeyStatus::Valid(admin),
            None => KeyStatus::Invalid,
        })
    }

    /// Replace an admin's key, reactivating a deactivated admin. `NotFound`
    /// when the username is unknown.
    pub async fn refresh(&self, username: &str) -> Result<IssuedKey> {
        let key = Uuid::new_v4().to_string();
        let expires_at = self.expiry_from(Utc::now().timestamp());

        if !self.db.update_admin_key(username, &self.hash_key(&key)?, expires_at).await? {
            return Err(BotError::NotFound(format!("admin {}", username)));
        }
        tracing::info!("🔑 Admin {} key refreshed", username);

        Ok(IssuedKey {
            username: username.to_string(),
            key,
            expires_at,
        })
    }

    /// Revoke the key now. Unlike natural expiry this is not refreshable
    /// with the old key. False when the username is unknown.
    pub async fn deactivate(&self, username: &str) -> Result<bool> {
        let done = self.db.deactivate_admin(username, Utc::now().timestamp()).await?;
        if done {
            tracing::info!("🔒 Admin {} deactivated", username);
        }
        Ok(done)
    }
}
