//! Price lookups expressed in a user's fiat currency
//!
//! Combines a [`PriceSource`] with a [`RateSource`]: current price, a
//! sampled history over a look-back period, and a two-asset comparison.

use super::{PriceSource, RateSource};
use crate::error::{BotError, Result};
use crate::types::{Crypto, Fiat, Period, PriceQuote};
use crate::utils::{percent_change, retry_with_backoff, round_half_up};
use chrono::{TimeZone, Utc};
use futures_util::future::try_join_all;
use rust_decimal::Decimal;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

const PRICE_DP: u32 = 2;
const RATIO_DP: u32 = 8;
const HISTORY_RETRIES: u32 = 3;
const HISTORY_DELAY: Duration = Duration::from_millis(500);

/// Spot price converted to a fiat currency
#[derive(Debug, Clone, PartialEq)]
pub struct FiatQuote {
    pub crypto: Crypto,
    pub fiat: Fiat,
    pub price: Decimal,
    pub timestamp: i64,
}

impl FiatQuote {
    pub fn symbol(&self) -> String {
        format!("{}-{}", self.crypto.code(), self.fiat.code())
    }

    pub fn to_message(&self) -> String {
        format!(
            "📊 Current price\n➡️ {} ({}):\n💰 {} {}\n🔄 Updated: {} UTC",
            self.crypto.code(),
            self.crypto.name(),
            self.price,
            self.fiat.code(),
            format_time(self.timestamp, "%H:%M:%S"),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub timestamp: i64,
    pub price: Decimal,
}

/// Sampled prices over a period, oldest first
#[derive(Debug, Clone)]
pub struct PriceHistory {
    pub period: Period,
    pub current: FiatQuote,
    pub points: Vec<PricePoint>,
    pub first: Decimal,
    pub last: Decimal,
    pub min: Decimal,
    pub max: Decimal,
    pub percent_change: Decimal,
}

impl PriceHistory {
    fn from_points(period: Period, current: FiatQuote, mut points: Vec<PricePoint>) -> Result<Self> {
        points.sort_by_key(|p| p.timestamp);
        let (first, last) = match (points.first(), points.last()) {
            (Some(f), Some(l)) => (f.price, l.price),
            _ => return Err(BotError::Api("empty price history".into())),
        };
        let min = points.iter().map(|p| p.price).min().unwrap_or(first);
        let max = points.iter().map(|p| p.price).max().unwrap_or(first);

        Ok(Self {
            period,
            current,
            percent_change: percent_change(last, first, 4, 2),
            points,
            first,
            last,
            min,
            max,
        })
    }

    pub fn to_message(&self) -> String {
        let fiat = self.current.fiat.code();
        let mut out = format!("📈 {} over {}\n", self.current.symbol(), self.period);
        let _ = writeln!(out, "{:<17} | {:>12}", "📅 Date and time", format!("Price ({})", fiat));
        out.push_str("—————————|———————\n");
        for point in &self.points {
            let _ = writeln!(out, "{:<19} | {:>12}", format_time(point.timestamp, "%Y-%m-%d %H:%M"), point.price);
        }

        let sign = if self.percent_change >= Decimal::ZERO { "+" } else { "" };
        let _ = write!(
            out,
            "\n📊 Change over period:\n{}{}% (from {} to {})\n📌 Min: {} ∣ Max: {}\n🔍 Updated: {} UTC",
            sign,
            self.percent_change,
            self.first,
            self.last,
            self.min,
            self.max,
            format_time(self.current.timestamp, "%H:%M:%S"),
        );
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparedAsset {
    pub crypto: Crypto,
    pub current_price: Decimal,
    pub historic_price: Decimal,
    pub change: Decimal,
}

/// Two assets priced now and one period ago
#[derive(Debug, Clone)]
pub struct Comparison {
    pub period: Period,
    pub fiat: Fiat,
    pub first: ComparedAsset,
    pub second: ComparedAsset,
    pub current_ratio: Decimal,
    pub historic_ratio: Decimal,
    pub ratio_change: Decimal,
}

impl Comparison {
    pub fn to_message(&self) -> String {
        let fiat = self.fiat.code();
        let mut out = format!("💱 PRICE COMPARISON ({})\n\n", self.period);
        for (i, asset) in [&self.first, &self.second].into_iter().enumerate() {
            if i == 1 {
                out.push_str("🆚\n\n");
            }
            let _ = write!(
                out,
                "💰 {} ({})\n📈 Price now: {} {}\n📈 Price then: {} {}\n\n",
                asset.crypto.code(),
                asset.crypto.name(),
                asset.current_price,
                fiat,
                asset.historic_price,
                fiat,
            );
        }

        out.push_str("📅 Change over period:\n");
        for asset in [&self.first, &self.second] {
            let _ = writeln!(out, "{}: {}%", asset.crypto.code(), trend(asset.change));
        }

        let (a, b) = (self.first.crypto.code(), self.second.crypto.code());
        let _ = write!(
            out,
            "\n💡 Ratio {}/{}:\nNow: 1 {} = {} {}\nThen: 1 {} = {} {}\nChange: {}%",
            a,
            b,
            a,
            format_ratio(self.current_ratio),
            b,
            a,
            format_ratio(self.historic_ratio),
            b,
            trend(self.ratio_change),
        );
        out
    }
}

fn trend(change: Decimal) -> String {
    if change >= Decimal::ZERO {
        format!("▲ +{}", change)
    } else {
        format!("▼ {}", change)
    }
}

fn format_time(timestamp: i64, pattern: &str) -> String {
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .map(|t| t.format(pattern).to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Four decimals for ratios of at least one; below one, keep the leading
/// zeros after the point plus four significant digits.
pub fn format_ratio(ratio: Decimal) -> String {
    if ratio >= Decimal::ONE {
        return round_half_up(ratio, 4).to_string();
    }

    let text = ratio.to_string();
    let leading_zeros = match text.split_once('.') {
        Some((_, frac)) => frac.chars().take_while(|c| *c == '0').count() as u32,
        None => return text,
    };
    round_half_up(ratio, leading_zeros + 4).to_string()
}

pub struct CryptoInformation {
    prices: Arc<dyn PriceSource>,
    rates: Arc<dyn RateSource>,
    history_delay: Duration,
}

impl CryptoInformation {
    pub fn new(prices: Arc<dyn PriceSource>, rates: Arc<dyn RateSource>) -> Self {
        Self {
            prices,
            rates,
            history_delay: HISTORY_DELAY,
        }
    }

    /// Shorten the retry delay, for tests
    pub fn with_history_delay(mut self, delay: Duration) -> Self {
        self.history_delay = delay;
        self
    }

    pub fn prices(&self) -> &Arc<dyn PriceSource> {
        &self.prices
    }

    pub fn rates(&self) -> &Arc<dyn RateSource> {
        &self.rates
    }

    /// USD amount converted to `fiat`, two decimals
    pub async fn to_fiat(&self, usd: Decimal, fiat: Fiat) -> Result<Decimal> {
        let rate = self.rates.usd_to(fiat).await?;
        Ok(round_half_up(usd * rate, PRICE_DP))
    }

    pub async fn current_price(&self, crypto: Crypto, fiat: Fiat) -> Result<FiatQuote> {
        let (quote, rate) = tokio::try_join!(self.prices.current_price(crypto), self.rates.usd_to(fiat))?;
        Ok(FiatQuote {
            crypto,
            fiat,
            price: round_half_up(quote.price * rate, PRICE_DP),
            timestamp: quote.timestamp,
        })
    }

    async fn historic_quote(&self, crypto: Crypto, timestamp: i64) -> Result<PriceQuote> {
        retry_with_backoff(
            &format!("{} price at {}", crypto, timestamp),
            HISTORY_RETRIES,
            self.history_delay,
            true,
            || self.prices.price_at(crypto, timestamp),
        )
        .await
    }

    /// `n + 1` samples stepping back from now, where the step and `n`
    /// come from the period (hourly for hours, daily for days and months)
    pub async fn price_history(&self, crypto: Crypto, fiat: Fiat, period: Period) -> Result<PriceHistory> {
        let rate = self.rates.usd_to(fiat).await?;
        let now = self.prices.current_price(crypto).await?;
        let current = FiatQuote {
            crypto,
            fiat,
            price: round_half_up(now.price * rate, PRICE_DP),
            timestamp: now.timestamp,
        };

        let (step, steps) = period.sampling();
        let fetches = (0..=steps as i64).map(|i| {
            let ts = now.timestamp - i * step;
            async move {
                let quote = self.historic_quote(crypto, ts).await?;
                Ok::<_, BotError>(PricePoint {
                    timestamp: ts,
                    price: round_half_up(quote.price * rate, PRICE_DP),
                })
            }
        });
        let points = try_join_all(fetches).await?;

        tracing::debug!("📈 {} history over {}: {} points", crypto, period, points.len());
        PriceHistory::from_points(period, current, points)
    }

    pub async fn compare(&self, first: Crypto, second: Crypto, fiat: Fiat, period: Period) -> Result<Comparison> {
        let rate = self.rates.usd_to(fiat).await?;
        let (a, b) = tokio::try_join!(
            self.asset_over(first, period, rate),
            self.asset_over(second, period, rate)
        )?;

        if a.current_price.is_zero() || b.current_price.is_zero() || b.historic_price.is_zero() {
            return Err(BotError::Api("zero price, cannot compute ratio".into()));
        }
        let current_ratio = round_half_up(a.current_price / b.current_price, RATIO_DP);
        let historic_ratio = round_half_up(a.historic_price / b.historic_price, RATIO_DP);

        Ok(Comparison {
            period,
            fiat,
            ratio_change: percent_change(current_ratio, historic_ratio, 4, 2),
            first: a,
            second: b,
            current_ratio,
            historic_ratio,
        })
    }

    async fn asset_over(&self, crypto: Crypto, period: Period, rate: Decimal) -> Result<ComparedAsset> {
        let now = self.prices.current_price(crypto).await?;
        let then = self.historic_quote(crypto, now.timestamp - period.seconds()).await?;
        let current_price = round_half_up(now.price * rate, PRICE_DP);
        let historic_price = round_half_up(then.price * rate, PRICE_DP);
        Ok(ComparedAsset {
            crypto,
            current_price,
            historic_price,
            change: percent_change(current_price, historic_price, 4, 2),
        })
    }
}
