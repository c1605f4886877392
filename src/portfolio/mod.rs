//! # Portfolio management
//!
//! One holding per (chat, crypto). Counts are stored exactly; USD prices
//! recorded at the last valuation let `price_info` report the change since
//! the user last looked.
//!
//! All replies are rendered in the user's selected fiat.

#[cfg(test)]
mod tests;

use crate::error::{BotError, Result};
use crate::market::CryptoInformation;
use crate::storage::{Database, Holding};
use crate::types::{Crypto, Fiat};
use crate::utils::{format_duration, percent_change, round_half_up};
use chrono::Utc;
use futures_util::future::join_all;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt::Write as _;
use std::sync::Arc;

/// Displayed count precision
const COUNT_DP: u32 = 6;

/// Count truncated toward zero to six decimals
pub fn display_count(count: Decimal) -> Decimal {
    let mut floored = count.round_dp_with_strategy(COUNT_DP, RoundingStrategy::ToNegativeInfinity);
    floored.rescale(COUNT_DP);
    floored
}

/// One holding priced now and at its last recorded valuation
#[derive(Debug, Clone)]
struct Valuation {
    holding: Holding,
    usd_price: Decimal,
    price_ts: i64,
    /// Current price in the user's fiat
    price: Decimal,
    value: Decimal,
    previous_value: Decimal,
}

pub struct PortfolioManager {
    db: Database,
    info: Arc<CryptoInformation>,
}

impl PortfolioManager {
    pub fn new(db: Database, info: Arc<CryptoInformation>) -> Self {
        Self { db, info }
    }

    async fn user_fiat(&self, chat_id: &str) -> Result<Fiat> {
        Ok(self
            .db
            .find_user(chat_id)
            .await?
            .map(|u| u.current_fiat)
            .unwrap_or_default())
    }

    pub async fn add(&self, chat_id: &str, amount: Decimal, crypto: Crypto) -> Result<String> {
        if amount <= Decimal::ZERO {
            return Err(BotError::Validation("amount must be positive".into()));
        }
        let fiat = self.user_fiat(chat_id).await?;
        let (quote, rate) = tokio::try_join!(
            self.info.prices().current_price(crypto),
            self.info.rates().usd_to(fiat)
        )?;

        let total = self
            .db
            .add_to_holding(chat_id, crypto, amount, quote.price, quote.timestamp)
            .await?;
        tracing::info!("💼 +{} {} (now {}) at {} USD", amount, crypto, total, quote.price);

        let price = round_half_up(quote.price * rate, 2);
        Ok(format!(
            "✅ Added {} {}\n💰 Price: {} {}\n💼 Holding: {} {} ({} {})",
            amount,
            crypto.code(),
            price,
            fiat.code(),
            display_count(total),
            crypto.code(),
            round_half_up(display_count(total) * price, 2),
            fiat.code()
        ))
    }

    pub async fn remove(&self, chat_id: &str, amount: Decimal, crypto: Crypto) -> Result<String> {
        if amount <= Decimal::ZERO {
            return Err(BotError::Validation("amount must be positive".into()));
        }

        match self.db.remove_from_holding(chat_id, crypto, amount).await {
            Ok(remaining) if remaining.is_zero() => {
                tracing::info!("💼 -{} {}, holding closed", amount, crypto);
                Ok(format!("✅ Removed {} {}. No {} left in portfolio", amount, crypto.code(), crypto.code()))
            }
            Ok(remaining) => {
                tracing::info!("💼 -{} {} (now {})", amount, crypto, remaining);
                Ok(format!(
                    "✅ Removed {} {}\n💼 Remaining: {} {}",
                    amount,
                    crypto.code(),
                    display_count(remaining),
                    crypto.code()
                ))
            }
            Err(BotError::NotFound(_)) => Ok(format!("❌ Asset {} not found in portfolio", crypto.code())),
            Err(BotError::InsufficientFunds { available, .. }) => Ok(format!(
                "❌ Insufficient funds: you have {} {}",
                display_count(available),
                crypto.code()
            )),
            Err(e) => Err(e),
        }
    }

    /// Price every holding. Holdings whose price cannot be fetched are
    /// left out with a warning.
    async fn valuations(&self, holdings: Vec<Holding>, fiat: Fiat) -> Result<Vec<Valuation>> {
        let rate = self.info.rates().usd_to(fiat).await?;
        let prices = self.info.prices();

        let quotes = join_all(holdings.iter().map(|h| prices.current_price(h.crypto))).await;

        let mut out = Vec::with_capacity(holdings.len());
        for (holding, quote) in holdings.into_iter().zip(quotes) {
            let quote = match quote {
                Ok(q) => q,
                Err(e) => {
                    tracing::warn!("⚠️ No price for {}: {}", holding.crypto, e);
                    continue;
                }
            };
            let price = round_half_up(quote.price * rate, 2);
            let previous_price = holding
                .last_price
                .map(|p| round_half_up(p * rate, 2))
                .unwrap_or(price);
            let count = display_count(holding.count);

            out.push(Valuation {
                value: round_half_up(price * count, 2),
                previous_value: round_half_up(previous_price * count, 2),
                usd_price: quote.price,
                price_ts: quote.timestamp,
                price,
                holding,
            });
        }
        Ok(out)
    }

    pub async fn info(&self, chat_id: &str) -> Result<String> {
        let holdings = self.db.list_holdings(chat_id).await?;
        if holdings.is_empty() {
            return Ok("📭 Your portfolio is empty. Use /add to add crypto.".to_string());
        }
        let fiat = self.user_fiat(chat_id).await?;
        let valued = self.valuations(holdings, fiat).await?;

        let mut out = format!("👜 Portfolio ({} assets):\n", valued.len());
        let mut total = Decimal::ZERO;
        for v in &valued {
            total += v.value;
            let _ = writeln!(
                out,
                "• {} {} ({} {})",
                display_count(v.holding.count),
                v.holding.crypto.code(),
                v.value,
                fiat.code()
            );
        }
        let _ = write!(out, "\n💼 Total: {} {}", round_half_up(total, 2), fiat.code());
        Ok(out)
    }

    /// Total now against the total at the stored prices, then store the
    /// current prices as the new baseline
    pub async fn price_info(&self, chat_id: &str) -> Result<String> {
        let holdings = self.db.list_holdings(chat_id).await?;
        if holdings.is_empty() {
            return Ok("❌ You have no assets in your portfolio".to_string());
        }
        let fiat = self.user_fiat(chat_id).await?;
        let last_update = holdings.iter().filter_map(|h| h.last_price_ts).max();
        let valued = self.valuations(holdings, fiat).await?;

        let total: Decimal = valued.iter().map(|v| v.value).sum();
        let previous: Decimal = valued.iter().map(|v| v.previous_value).sum();
        let (total, previous) = (round_half_up(total, 2), round_half_up(previous, 2));

        let mut out = format!("💰 Portfolio value: {} {}\n", total, fiat.code());
        let _ = writeln!(out, "📊 Before: {} {}", previous, fiat.code());
        let _ = writeln!(out, "{}", change_line(total, previous, fiat));
        let _ = write!(
            out,
            "⏰ Last update: {}",
            match last_update {
                Some(ts) => format!("{} ago", format_duration(Utc::now().timestamp() - ts)),
                None => "never".to_string(),
            }
        );

        for v in &valued {
            self.db.update_holding_price(&v.holding.id, v.usd_price, v.price_ts).await?;
        }
        Ok(out)
    }

    pub async fn assets_price(&self, chat_id: &str) -> Result<String> {
        let holdings = self.db.list_holdings(chat_id).await?;
        if holdings.is_empty() {
            return Ok("❌ You have no assets in your portfolio".to_string());
        }
        let fiat = self.user_fiat(chat_id).await?;
        let valued = self.valuations(holdings, fiat).await?;

        let mut out = String::from("💼 Portfolio assets:\n\n");
        for v in &valued {
            let crypto = v.holding.crypto;
            let _ = writeln!(out, "💰 {} ({})", crypto.code(), crypto.name());
            let _ = writeln!(out, "   • Price: {} {}", v.price, fiat.code());
            let _ = writeln!(out, "   • Now: {} {}", v.value, fiat.code());
            let _ = writeln!(out, "   • Before: {} {}", v.previous_value, fiat.code());
            let _ = writeln!(out, "   {}\n", change_line(v.value, v.previous_value, fiat));
        }
        Ok(out.trim_end().to_string())
    }

    pub async fn balance(&self, chat_id: &str) -> Result<String> {
        let holdings = self.db.list_holdings(chat_id).await?;
        let fiat = self.user_fiat(chat_id).await?;
        if holdings.is_empty() {
            return Ok(format!("💰 Balance: 0.00 {}", fiat.code()));
        }
        let valued = self.valuations(holdings, fiat).await?;
        let total: Decimal = valued.iter().map(|v| v.value).sum();
        Ok(format!("💰 Balance: {} {}", round_half_up(total, 2), fiat.code()))
    }

    pub async fn delete_asset(&self, chat_id: &str, crypto: Crypto) -> Result<String> {
        Ok(if self.db.delete_holding(chat_id, crypto).await? {
            format!("✅ {} removed from portfolio", crypto.code())
        } else {
            format!("❌ {} is not in your portfolio", crypto.code())
        })
    }

    pub async fn delete_all(&self, chat_id: &str) -> Result<String> {
        let removed = self.db.delete_all_holdings(chat_id).await?;
        Ok(if removed == 0 {
            "📭 Your portfolio is already empty.".to_string()
        } else {
            format!("✅ Removed {} assets", removed)
        })
    }
}

/// `📈 Change: +1.2345% (10.00 USD)`; percent at scale 6 then ×100
fn change_line(now: Decimal, before: Decimal, fiat: Fiat) -> String {
    let pct = percent_change(now, before, 6, 4);
    let (emoji, sign) = if pct >= Decimal::ZERO { ("📈", "+") } else { ("📉", "") };
    format!(
        "{} Change: {}{}% ({} {})",
        emoji,
        sign,
        pct,
        round_half_up(now - before, 2),
        fiat.code()
    )
}
