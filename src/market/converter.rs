//! USD to fiat conversion via a static currency-rates API
//!
//! Expects `{base}/usd.json` shaped as `{"date": "...", "usd": {"eur": 0.92, ...}}`.

use super::RateSource;
use crate::error::{BotError, Result};
use crate::types::Fiat;
use crate::utils::round_half_up;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::{Duration, Instant};

const RATE_DP: u32 = 4;

pub struct HttpRateSource {
    http: Client,
    base_url: String,
    ttl: Duration,
    cache: Mutex<Option<(Instant, serde_json::Value)>>,
}

impl HttpRateSource {
    pub fn new(base_url: &str, ttl: Duration) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            ttl,
            cache: Mutex::new(None),
        }
    }

    fn cached(&self) -> Option<serde_json::Value> {
        let guard = self.cache.lock();
        guard
            .as_ref()
            .filter(|(at, _)| at.elapsed() < self.ttl)
            .map(|(_, body)| body.clone())
    }

    async fn fetch(&self) -> Result<serde_json::Value> {
        if let Some(body) = self.cached() {
            return Ok(body);
        }

        let url = format!("{}/usd.json", self.base_url);
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(BotError::Api(format!("rates API returned {}", response.status())));
        }
        let body: serde_json::Value = response.json().await?;
        *self.cache.lock() = Some((Instant::now(), body.clone()));
        Ok(body)
    }
}

/// Read the USD to `fiat` rate from a rates document, rounded to 4 decimals
pub fn parse_rate(body: &serde_json::Value, fiat: Fiat) -> Result<Decimal> {
    if fiat == Fiat::Usd {
        return Ok(Decimal::ONE);
    }

    let key = fiat.code().to_lowercase();
    let raw = body
        .get("usd")
        .and_then(|usd| usd.get(&key))
        .ok_or_else(|| BotError::Api(format!("currency {} not found in response", fiat)))?;

    let rate = match raw {
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string())),
        serde_json::Value::String(s) => Decimal::from_str(s),
        other => return Err(BotError::Api(format!("unexpected rate value: {}", other))),
    }
    .map_err(|e| BotError::Api(format!("bad rate for {}: {}", fiat, e)))?;

    Ok(round_half_up(rate, RATE_DP))
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn usd_to(&self, fiat: Fiat) -> Result<Decimal> {
        if fiat == Fiat::Usd {
            return Ok(Decimal::ONE);
        }
        let body = self.fetch().await?;
        parse_rate(&body, fiat)
    }
}

/// Fixed rates, for offline runs and tests
pub struct FixedRates {
    rates: HashMap<Fiat, Decimal>,
}

impl FixedRates {
    pub fn new(rates: impl IntoIterator<Item = (Fiat, Decimal)>) -> Self {
        Self { rates: rates.into_iter().collect() }
    }
}

#[async_trait]
impl RateSource for FixedRates {
    async fn usd_to(&self, fiat: Fiat) -> Result<Decimal> {
        if fiat == Fiat::Usd {
            return Ok(Decimal::ONE);
        }
        self.rates
            .get(&fiat)
            .copied()
            .ok_or_else(|| BotError::NotFound(format!("no rate for {}", fiat)))
    }
}
