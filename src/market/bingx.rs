//! BingX spot market client
//!
//! Uses the public ticker and kline endpoints. When an API secret is
//! configured, requests carry a `timestamp` and an HMAC-SHA256 `signature`
//! over the query string, as the BingX open API expects.

use super::PriceSource;
use crate::config::BingxConfig;
use crate::error::{BotError, Result};
use crate::types::{Crypto, PriceQuote};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use std::str::FromStr;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

const TICKER_PATH: &str = "/openApi/spot/v1/ticker/price";
const KLINE_PATH: &str = "/openApi/market/his/v1/kline";

pub struct BingxClient {
    http: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<TickerData>,
}

#[derive(Debug, Deserialize)]
struct TickerData {
    #[serde(default)]
    trades: Vec<TickerTrade>,
}

#[derive(Debug, Deserialize)]
struct TickerTrade {
    /// Milliseconds
    timestamp: i64,
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct KlineResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<Vec<serde_json::Value>>,
}

impl BingxClient {
    pub fn new(config: &BingxConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    /// Encode params, appending timestamp and signature when a secret is set
    fn query_string(&self, params: &[(&str, String)]) -> String {
        let mut query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        if !self.api_secret.is_empty() {
            query.push_str(&format!("&timestamp={}", Utc::now().timestamp_millis()));
            let signature = sign(&self.api_secret, &query);
            query.push_str(&format!("&signature={}", signature));
        }
        query
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<String> {
        let url = format!("{}{}?{}", self.base_url, path, self.query_string(params));
        let mut request = self.http.get(&url);
        if !self.api_key.is_empty() {
            request = request.header("X-BX-APIKEY", &self.api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Api(format!("BingX {} returned {}: {}", path, status, body)));
        }
        Ok(response.text().await?)
    }
}

/// Hex HMAC-SHA256 of `payload`
pub fn sign(secret: &str, payload: &str) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Extract the last trade from a ticker response
pub fn parse_ticker(body: &str, crypto: Crypto) -> Result<PriceQuote> {
    let response: TickerResponse = serde_json::from_str(body)?;
    if response.code != 0 {
        return Err(BotError::Api(format!("BingX ticker error {}: {}", response.code, response.msg)));
    }

    let trade = response
        .data
        .first()
        .and_then(|d| d.trades.first())
        .ok_or_else(|| BotError::Api(format!("no trades for {}", crypto.usdt_pair())))?;

    Ok(PriceQuote {
        crypto,
        price: trade.price,
        timestamp: trade.timestamp / 1000,
    })
}

/// Take the open price of the first candle
pub fn parse_kline(body: &str, crypto: Crypto, minute_start: i64) -> Result<PriceQuote> {
    let response: KlineResponse = serde_json::from_str(body)?;
    if response.code != 0 {
        return Err(BotError::Api(format!("BingX kline error {}: {}", response.code, response.msg)));
    }

    let open = response
        .data
        .first()
        .and_then(|candle| candle.get(1))
        .ok_or_else(|| BotError::Api(format!("no candles for {}", crypto.usdt_pair())))?;

    let price = match open {
        serde_json::Value::String(s) => Decimal::from_str(s),
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()),
        other => return Err(BotError::Api(format!("unexpected candle value: {}", other))),
    }
    .map_err(|e| BotError::Api(format!("bad candle price: {}", e)))?;

    Ok(PriceQuote {
        crypto,
        price,
        timestamp: minute_start,
    })
}

#[async_trait]
impl PriceSource for BingxClient {
    async fn current_price(&self, crypto: Crypto) -> Result<PriceQuote> {
        let body = self.get(TICKER_PATH, &[("symbol", crypto.usdt_pair())]).await?;
        let quote = parse_ticker(&body, crypto)?;
        tracing::debug!("{} = {} USDT", crypto.usdt_pair(), quote.price);
        Ok(quote)
    }

    async fn price_at(&self, crypto: Crypto, timestamp: i64) -> Result<PriceQuote> {
        // Accept millisecond timestamps too
        let millis = if timestamp < 1_000_000_000_000 { timestamp * 1000 } else { timestamp };
        let start = (millis / 60_000) * 60_000;
        let end = start + 60_000;

        let body = self
            .get(
                KLINE_PATH,
                &[
                    ("symbol", crypto.usdt_pair()),
                    ("interval", "1m".to_string()),
                    ("startTime", start.to_string()),
                    ("endTime", end.to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        parse_kline(&body, crypto, start / 1000)
    }
}
