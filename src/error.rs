//! Error types for the bot

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Message bus error: {0}")]
    Bus(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Auth error: {0}")]
    Auth(String),

    /// Unique index violation
    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Insufficient funds: have {available} {symbol}")]
    InsufficientFunds {
        symbol: String,
        available: rust_decimal::Decimal,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BotError {
    /// True for failures worth retrying (network, broker).
    pub fn is_transient(&self) -> bool {
        matches!(self, BotError::Http(_) | BotError::Bus(_))
    }
}

impl From<sqlx::Error> for BotError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return BotError::Duplicate(db.message().to_string());
            }
        }
        BotError::Database(err)
    }
}

impl From<config::ConfigError> for BotError {
    fn from(err: config::ConfigError) -> Self {
        BotError::Config(err.to_string())
    }
}

impl From<kafka::Error> for BotError {
    fn from(err: kafka::Error) -> Self {
        BotError::Bus(err.to_string())
    }
}

impl From<tokio::task::JoinError> for BotError {
    fn from(err: tokio::task::JoinError) -> Self {
        BotError::Internal(format!("task failed: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
