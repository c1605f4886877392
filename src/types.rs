//! Core domain types shared across modules

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{BotError, Result};

/// Supported crypto assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Crypto {
    Btc,
    Eth,
    Sol,
    Xrp,
    Ada,
    Doge,
    Avax,
    Near,
    Ltc,
}

impl Crypto {
    pub const ALL: [Crypto; 9] = [
        Crypto::Btc,
        Crypto::Eth,
        Crypto::Sol,
        Crypto::Xrp,
        Crypto::Ada,
        Crypto::Doge,
        Crypto::Avax,
        Crypto::Near,
        Crypto::Ltc,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Crypto::Btc => "BTC",
            Crypto::Eth => "ETH",
            Crypto::Sol => "SOL",
            Crypto::Xrp => "XRP",
            Crypto::Ada => "ADA",
            Crypto::Doge => "DOGE",
            Crypto::Avax => "AVAX",
            Crypto::Near => "NEAR",
            Crypto::Ltc => "LTC",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Crypto::Btc => "Bitcoin",
            Crypto::Eth => "Ethereum",
            Crypto::Sol => "Solana",
            Crypto::Xrp => "Ripple",
            Crypto::Ada => "Cardano",
            Crypto::Doge => "Dogecoin",
            Crypto::Avax => "Avalanche",
            Crypto::Near => "Near",
            Crypto::Ltc => "Litecoin",
        }
    }

    /// Exchange pair symbol quoted in USDT, e.g. `BTC-USDT`
    pub fn usdt_pair(&self) -> String {
        format!("{}-USDT", self.code())
    }

    /// Parse either a bare code (`btc`) or a pair symbol (`BTC-USDT`)
    pub fn from_symbol(symbol: &str) -> Result<Self> {
        let base = symbol.split('-').next().unwrap_or(symbol);
        base.parse()
    }

    /// Comma separated list used in user-facing hints
    pub fn codes_hint() -> String {
        Self::ALL.iter().map(|c| c.code()).collect::<Vec<_>>().join(", ")
    }
}

impl FromStr for Crypto {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim().to_uppercase();
        Self::ALL
            .iter()
            .find(|c| c.code() == code)
            .copied()
            .ok_or_else(|| BotError::Validation(format!("unknown crypto currency: {}", s)))
    }
}

impl fmt::Display for Crypto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Supported fiat currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Fiat {
    #[default]
    Usd,
    Eur,
    Jpy,
    Gbp,
    Rub,
    Cny,
}

impl Fiat {
    pub const ALL: [Fiat; 6] = [Fiat::Usd, Fiat::Eur, Fiat::Jpy, Fiat::Gbp, Fiat::Rub, Fiat::Cny];

    pub fn code(&self) -> &'static str {
        match self {
            Fiat::Usd => "USD",
            Fiat::Eur => "EUR",
            Fiat::Jpy => "JPY",
            Fiat::Gbp => "GBP",
            Fiat::Rub => "RUB",
            Fiat::Cny => "CNY",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Fiat::Usd => "US Dollar",
            Fiat::Eur => "Euro",
            Fiat::Jpy => "Japanese Yen",
            Fiat::Gbp => "British Pound",
            Fiat::Rub => "Russian Ruble",
            Fiat::Cny => "Chinese Yuan",
        }
    }

    pub fn codes_hint() -> String {
        Self::ALL.iter().map(|c| c.code()).collect::<Vec<_>>().join(", ")
    }
}

impl FromStr for Fiat {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim().to_uppercase();
        Self::ALL
            .iter()
            .find(|c| c.code() == code)
            .copied()
            .ok_or_else(|| BotError::Validation(format!("unknown fiat currency: {}", s)))
    }
}

impl fmt::Display for Fiat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// How an alert threshold is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThresholdType {
    Value,
    Percent,
    Ema,
}

impl ThresholdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdType::Value => "VALUE",
            ThresholdType::Percent => "PERCENT",
            ThresholdType::Ema => "EMA",
        }
    }

    /// Short form used in chat commands (`VAL`, `PERC`, `EMA`)
    pub fn short(&self) -> &'static str {
        match self {
            ThresholdType::Value => "VAL",
            ThresholdType::Percent => "PERC",
            ThresholdType::Ema => "EMA",
        }
    }
}

impl FromStr for ThresholdType {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "VAL" | "VALUE" => Ok(ThresholdType::Value),
            "PERC" | "PERCENT" => Ok(ThresholdType::Percent),
            "EMA" => Ok(ThresholdType::Ema),
            other => Err(BotError::Validation(format!("unknown alert type: {}", other))),
        }
    }
}

/// Look-back window accepted by history and comparison commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Hours(u32),
    Days(u32),
    Months(u32),
}

impl Period {
    pub const ACCEPTED: [&'static str; 6] = ["3h", "12h", "24h", "3d", "7d", "1M"];

    pub fn seconds(&self) -> i64 {
        match self {
            Period::Hours(h) => *h as i64 * 3600,
            Period::Days(d) => *d as i64 * 86_400,
            Period::Months(m) => *m as i64 * 30 * 86_400,
        }
    }

    /// Sampling step and number of steps for a history series
    pub fn sampling(&self) -> (i64, u32) {
        match self {
            Period::Hours(h) => (3600, *h),
            Period::Days(d) => (86_400, *d),
            Period::Months(m) => (86_400, m * 30),
        }
    }
}

impl FromStr for Period {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "3h" => Ok(Period::Hours(3)),
            "12h" => Ok(Period::Hours(12)),
            "24h" => Ok(Period::Hours(24)),
            "3d" => Ok(Period::Days(3)),
            "7d" => Ok(Period::Days(7)),
            "1M" => Ok(Period::Months(1)),
            other => Err(BotError::Validation(format!("unsupported period: {}", other))),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Hours(h) => write!(f, "{}h", h),
            Period::Days(d) => write!(f, "{}d", d),
            Period::Months(m) => write!(f, "{}M", m),
        }
    }
}

/// Chat text travelling over the incoming and outgoing topics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub message_id: Uuid,
    pub chat_id: String,
    pub message: String,
}

impl ChatMessage {
    pub fn new(chat_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            chat_id: chat_id.into(),
            message: message.into(),
        }
    }
}

/// USD spot price observation published on the price topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceEvent {
    pub event_id: Uuid,
    pub symbol: Crypto,
    pub price: Decimal,
    /// Epoch seconds
    pub timestamp: i64,
}

impl PriceEvent {
    pub fn new(symbol: Crypto, price: Decimal, timestamp: i64) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            symbol,
            price,
            timestamp,
        }
    }
}

/// Price quote returned by market sources
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub crypto: Crypto,
    pub price: Decimal,
    /// Epoch seconds
    pub timestamp: i64,
}
