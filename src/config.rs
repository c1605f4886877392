//! Configuration management
//!
//! Layered sources: `.env` (via dotenvy), the TOML file, then environment
//! variables prefixed with `BITBOT__` (e.g. `BITBOT__TELEGRAM__BOT_TOKEN`).

use crate::error::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub bingx: BingxConfig,
    #[serde(default)]
    pub currency_api: CurrencyApiConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Long-poll timeout passed to getUpdates
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_telegram_api")]
    pub api_url: String,
}

fn default_poll_timeout() -> u64 { 30 }
fn default_telegram_api() -> String { "https://api.telegram.org".to_string() }

/// Which message bus backs the pipeline
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusBackend {
    #[default]
    Kafka,
    /// In-process queues, for local runs without a broker
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    #[serde(default)]
    pub backend: BusBackend,
    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: Vec<String>,
    /// Base consumer group; each consumer appends its own suffix
    #[serde(default = "default_group_id")]
    pub group_id: String,
    #[serde(default = "default_incoming_topic")]
    pub incoming_topic: String,
    #[serde(default = "default_outgoing_topic")]
    pub outgoing_topic: String,
    #[serde(default = "default_price_topic")]
    pub price_topic: String,
    /// Worker lanes per consumer
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    #[serde(default = "default_send_retries")]
    pub send_retries: u32,
    /// Pause between empty polls
    #[serde(default = "default_idle_ms")]
    pub idle_backoff_ms: u64,
}

fn default_bootstrap_servers() -> Vec<String> { vec!["localhost:29092".to_string()] }
fn default_group_id() -> String { "telegram-bot-group".to_string() }
fn default_incoming_topic() -> String { "telegram-incoming-messages".to_string() }
fn default_outgoing_topic() -> String { "telegram-outgoing-messages".to_string() }
fn default_price_topic() -> String { "crypto-price-events".to_string() }
fn default_workers() -> usize { 4 }
fn default_ack_timeout_ms() -> u64 { 1000 }
fn default_send_retries() -> u32 { 3 }
fn default_idle_ms() -> u64 { 200 }

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            backend: BusBackend::default(),
            bootstrap_servers: default_bootstrap_servers(),
            group_id: default_group_id(),
            incoming_topic: default_incoming_topic(),
            outgoing_topic: default_outgoing_topic(),
            price_topic: default_price_topic(),
            workers: default_workers(),
            ack_timeout_ms: default_ack_timeout_ms(),
            send_retries: default_send_retries(),
            idle_backoff_ms: default_idle_ms(),
        }
    }
}

impl KafkaConfig {
    pub fn group_for(&self, suffix: &str) -> String {
        format!("{}-{}", self.group_id, suffix)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file; `~` is expanded. Use `sqlite::memory:` for throwaway runs.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Logical database name used by the bootstrap script
    #[serde(default = "default_db_name")]
    pub name: String,
    #[serde(default = "default_app_user")]
    pub app_user: String,
    #[serde(default)]
    pub app_password: String,
    /// Create the `TrackedCryptoCurrencies` collection
    #[serde(default = "default_true")]
    pub tracked_currencies_collection: bool,
    /// Enforce a unique index on `users.telegramId`
    #[serde(default = "default_true")]
    pub unique_telegram_id: bool,
}

fn default_db_path() -> String { "~/.bitbot/bitbot.db".to_string() }
fn default_db_name() -> String { "BitBotDB".to_string() }
fn default_app_user() -> String { "bitbot".to_string() }
fn default_true() -> bool { true }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            name: default_db_name(),
            app_user: default_app_user(),
            app_password: String::new(),
            tracked_currencies_collection: true,
            unique_telegram_id: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BingxConfig {
    #[serde(default = "default_bingx_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_bingx_url() -> String { "https://open-api.bingx.com".to_string() }
fn default_http_timeout() -> u64 { 10 }

impl Default for BingxConfig {
    fn default() -> Self {
        Self {
            base_url: default_bingx_url(),
            api_key: String::new(),
            api_secret: String::new(),
            timeout_secs: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CurrencyApiConfig {
    #[serde(default = "default_currency_url")]
    pub url: String,
}

fn default_currency_url() -> String {
    "https://cdn.jsdelivr.net/npm/@fawazahmed0/currency-api@latest/v1/currencies".to_string()
}

impl Default for CurrencyApiConfig {
    fn default() -> Self {
        Self { url: default_currency_url() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertConfig {
    /// How often the ticker publishes prices for watched assets
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// Daily samples used to seed an EMA alert
    #[serde(default = "default_ema_period")]
    pub ema_period: u32,
    /// Weight of the newest price in the EMA update
    #[serde(default = "default_ema_smoothing")]
    pub ema_smoothing: Decimal,
    /// Retries per historical price fetch
    #[serde(default = "default_history_retries")]
    pub history_retries: u32,
    /// How long a dispatched message id is remembered for dedup
    #[serde(default = "default_dedup_ttl")]
    pub dedup_ttl_secs: u64,
}

fn default_check_interval() -> u64 { 300 }
fn default_ema_period() -> u32 { 20 }
fn default_ema_smoothing() -> Decimal { dec!(0.05) }
fn default_history_retries() -> u32 { 2 }
fn default_dedup_ttl() -> u64 { 3600 }

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            ema_period: default_ema_period(),
            ema_smoothing: default_ema_smoothing(),
            history_retries: default_history_retries(),
            dedup_ttl_secs: default_dedup_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminConfig {
    /// HMAC key for hashing stored API keys
    #[serde(default)]
    pub key_secret: String,
    #[serde(default = "default_key_ttl")]
    pub key_ttl_days: i64,
    /// Chats allowed to run /admin_* commands
    #[serde(default)]
    pub telegram_chat_ids: Vec<String>,
}

fn default_key_ttl() -> i64 { 30 }

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            key_secret: String::new(),
            key_ttl_days: default_key_ttl(),
            telegram_chat_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String { "info,sqlx=warn".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(path: &Path) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("BITBOT")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("kafka.bootstrap_servers")
                    .with_list_parse_key("admin.telegram_chat_ids")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        use crate::error::BotError;

        if self.kafka.workers == 0 {
            return Err(BotError::Config("kafka.workers must be at least 1".into()));
        }
        if self.alerts.ema_smoothing <= Decimal::ZERO || self.alerts.ema_smoothing >= Decimal::ONE {
            return Err(BotError::Config("alerts.ema_smoothing must be in (0, 1)".into()));
        }
        if self.alerts.check_interval_secs == 0 {
            return Err(BotError::Config("alerts.check_interval_secs must be at least 1".into()));
        }
        if self.admin.key_ttl_days <= 0 {
            return Err(BotError::Config("admin.key_ttl_days must be positive".into()));
        }
        // Without a secret the stored key hashes are computable by anyone
        if self.server.enabled && self.admin.key_secret.trim().is_empty() {
            return Err(BotError::Config(
                "admin.key_secret is required while the HTTP server is enabled".into(),
            ));
        }
        Ok(())
    }

    /// Database path with `~` expanded
    pub fn database_path(&self) -> String {
        shellexpand::tilde(&self.database.path).into_owned()
    }
}
