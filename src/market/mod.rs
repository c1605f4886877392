//! Market data: exchange prices and fiat conversion rates

pub mod bingx;
pub mod converter;
pub mod info;

pub use bingx::BingxClient;
pub use converter::HttpRateSource;
pub use info::{Comparison, CryptoInformation, FiatQuote, PriceHistory};

use crate::error::Result;
use crate::types::{Crypto, Fiat, PriceQuote};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Source of USD spot prices
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Latest traded price
    async fn current_price(&self, crypto: Crypto) -> Result<PriceQuote>;

    /// Price at (the minute containing) `timestamp`, epoch seconds
    async fn price_at(&self, crypto: Crypto, timestamp: i64) -> Result<PriceQuote>;
}

/// USD to fiat exchange rates
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn usd_to(&self, fiat: Fiat) -> Result<Decimal>;
}
