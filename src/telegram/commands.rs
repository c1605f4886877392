//! Bot command parsing
//!
//! `/name@botname arg1 arg2`. The name is matched case-insensitively and
//! every command takes an exact number of whitespace separated arguments.

use crate::types::{Crypto, Fiat, Period, ThresholdType};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Commands understood by the bot
#[derive(Debug, Clone, PartialEq)]
pub enum BotCommand {
    Start,
    Help,
    Authors,
    SetCrypto(Crypto),
    SetFiat(Fiat),
    ShowCurrentPrice,
    ShowPriceHistory(Period),
    CompareCurrency { first: Crypto, second: Crypto, period: Period },
    Portfolio,
    GetPortfolioPrice,
    GetAssetsPrice,
    Balance,
    SetAlertVal { crypto: Crypto, max: Decimal, min: Decimal },
    SetAlertPerc { crypto: Crypto, up: Decimal, down: Decimal },
    SetAlertEma(Crypto),
    MyAlerts,
    DeleteAlert { kind: ThresholdType, crypto: Crypto },
    DeleteAllAlerts,
    Add { amount: Decimal, crypto: Crypto },
    Remove { amount: Decimal, crypto: Crypto },
    DeleteAsset(Crypto),
    DeleteAllAssets,
    AdminCreate(String),
    AdminRefreshKey(String),
    AdminDeactivate(String),
}

/// Why a message did not yield a command. Each variant maps to a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Plain text or an unrecognised `/name`
    Unknown,
    /// Wrong argument count; carries the usage line
    Usage(&'static str),
    InvalidNumber(String),
    UnknownCrypto(String),
    UnknownFiat(String),
    InvalidPeriod(String),
    UnknownAlertType(String),
}

impl ParseError {
    pub fn reply(&self) -> String {
        match self {
            ParseError::Unknown => "❌ Unknown command, use /help".to_string(),
            ParseError::Usage(usage) => format!("❌ Invalid command format!\nUsage: {}", usage),
            ParseError::InvalidNumber(raw) => format!("❌ Invalid number format: {}", raw),
            ParseError::UnknownCrypto(raw) => format!(
                "❌ Crypto currency {} is not supported. Use one of: {}",
                raw,
                Crypto::codes_hint()
            ),
            ParseError::UnknownFiat(raw) => format!(
                "❌ Fiat currency {} is not supported. Use one of: {}",
                raw,
                Fiat::codes_hint()
            ),
            ParseError::InvalidPeriod(raw) => format!(
                "❌ Invalid period {}. Available periods: {}",
                raw,
                Period::ACCEPTED.join(", ")
            ),
            ParseError::UnknownAlertType(raw) => {
                format!("❌ Unknown alert type {}. Use VAL, PERC or EMA", raw)
            }
        }
    }
}

fn crypto(raw: &str) -> Result<Crypto, ParseError> {
    Crypto::from_str(raw).map_err(|_| ParseError::UnknownCrypto(raw.to_string()))
}

fn fiat(raw: &str) -> Result<Fiat, ParseError> {
    Fiat::from_str(raw).map_err(|_| ParseError::UnknownFiat(raw.to_string()))
}

fn period(raw: &str) -> Result<Period, ParseError> {
    Period::from_str(raw).map_err(|_| ParseError::InvalidPeriod(raw.to_string()))
}

fn number(raw: &str) -> Result<Decimal, ParseError> {
    // Accept a comma as decimal separator
    Decimal::from_str(&raw.replace(',', ".")).map_err(|_| ParseError::InvalidNumber(raw.to_string()))
}

impl BotCommand {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let text = text.trim();
        let Some(rest) = text.strip_prefix('/') else {
            return Err(ParseError::Unknown);
        };

        let mut parts = rest.split_whitespace();
        let head = parts.next().unwrap_or_default();
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        let args: Vec<&str> = parts.collect();

        let expect = |n: usize, usage: &'static str| {
            if args.len() == n {
                Ok(())
            } else {
                Err(ParseError::Usage(usage))
            }
        };

        let command = match name.as_str() {
            "start" => {
                expect(0, "/start")?;
                BotCommand::Start
            }
            "help" => {
                expect(0, "/help")?;
                BotCommand::Help
            }
            "authors" => {
                expect(0, "/authors")?;
                BotCommand::Authors
            }
            "set_crypto" => {
                expect(1, "/set_crypto <crypto>")?;
                BotCommand::SetCrypto(crypto(args[0])?)
            }
            "set_fiat" => {
                expect(1, "/set_fiat <fiat>")?;
                BotCommand::SetFiat(fiat(args[0])?)
            }
            "show_current_price" => {
                expect(0, "/show_current_price")?;
                BotCommand::ShowCurrentPrice
            }
            "show_price_history" => {
                expect(1, "/show_price_history <period>")?;
                BotCommand::ShowPriceHistory(period(args[0])?)
            }
            "compare_currency" => {
                expect(3, "/compare_currency <crypto 1> <crypto 2> <period>")?;
                BotCommand::CompareCurrency {
                    first: crypto(args[0])?,
                    second: crypto(args[1])?,
                    period: period(args[2])?,
                }
            }
            "portfolio" => {
                expect(0, "/portfolio")?;
                BotCommand::Portfolio
            }
            "get_portfolio_price" => {
                expect(0, "/get_portfolio_price")?;
                BotCommand::GetPortfolioPrice
            }
            "get_assets_price" => {
                expect(0, "/get_assets_price")?;
                BotCommand::GetAssetsPrice
            }
            "balance" => {
                expect(0, "/balance")?;
                BotCommand::Balance
            }
            "set_alert_val" => {
                expect(3, "/set_alert_val <crypto> <max price> <min price>")?;
                BotCommand::SetAlertVal {
                    crypto: crypto(args[0])?,
                    max: number(args[1])?,
                    min: number(args[2])?,
                }
            }
            "set_alert_perc" => {
                expect(3, "/set_alert_perc <crypto> <rise %> <fall %>")?;
                BotCommand::SetAlertPerc {
                    crypto: crypto(args[0])?,
                    up: number(args[1])?,
                    down: number(args[2])?,
                }
            }
            "set_alert_ema" => {
                expect(1, "/set_alert_ema <crypto>")?;
                BotCommand::SetAlertEma(crypto(args[0])?)
            }
            "my_alerts" => {
                expect(0, "/my_alerts")?;
                BotCommand::MyAlerts
            }
            "delete_alert" => {
                expect(2, "/delete_alert <VAL|PERC|EMA> <crypto>")?;
                BotCommand::DeleteAlert {
                    kind: ThresholdType::from_str(args[0])
                        .map_err(|_| ParseError::UnknownAlertType(args[0].to_string()))?,
                    crypto: crypto(args[1])?,
                }
            }
            "delete_all_alerts" => {
                expect(0, "/delete_all_alerts")?;
                BotCommand::DeleteAllAlerts
            }
            "add" => {
                expect(2, "/add <amount> <crypto>")?;
                BotCommand::Add {
                    amount: number(args[0])?,
                    crypto: crypto(args[1])?,
                }
            }
            "remove" => {
                expect(2, "/remove <amount> <crypto>")?;
                BotCommand::Remove {
                    amount: number(args[0])?,
                    crypto: crypto(args[1])?,
                }
            }
            "delete_asset" => {
                expect(1, "/delete_asset <crypto>")?;
                BotCommand::DeleteAsset(crypto(args[0])?)
            }
            "delete_all_assets" => {
                expect(0, "/delete_all_assets")?;
                BotCommand::DeleteAllAssets
            }
            "admin_create" => {
                expect(1, "/admin_create <username>")?;
                BotCommand::AdminCreate(args[0].to_string())
            }
            "admin_refresh_key" => {
                expect(1, "/admin_refresh_key <username>")?;
                BotCommand::AdminRefreshKey(args[0].to_string())
            }
            "admin_deactivate" => {
                expect(1, "/admin_deactivate <username>")?;
                BotCommand::AdminDeactivate(args[0].to_string())
            }
            _ => return Err(ParseError::Unknown),
        };
        Ok(command)
    }

    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            BotCommand::AdminCreate(_) | BotCommand::AdminRefreshKey(_) | BotCommand::AdminDeactivate(_)
        )
    }
}

pub const HELP_TEXT: &str = "📚 BitBotX Help Center
Your guide to the crypto bot
🔹 Basics:
▸ /start - Start using the bot
▸ /help - This menu
▸ /authors - Authors
▸ /set_fiat <fiat> - Default fiat currency
▸ /set_crypto <crypto> - Default crypto currency
📊 Prices:
▸ /show_current_price - Current price of the default crypto
▸ /show_price_history <period> - Price history (3h/12h/24h/3d/7d/1M)
▸ /compare_currency <crypto 1> <crypto 2> <period> - Compare two cryptos
💼 Portfolio:
▸ /add <amount> <crypto> - Add an asset
▸ /remove <amount> <crypto> - Remove an asset
▸ /portfolio - Show portfolio
▸ /get_portfolio_price - Portfolio value and change
▸ /get_assets_price - Per-asset prices
▸ /balance - Portfolio balance
▸ /delete_asset <crypto> - Delete an asset
▸ /delete_all_assets - Delete all assets
🔔 Alerts:
▸ /set_alert_ema <crypto> - EMA trend alert
▸ /set_alert_val <crypto> <max> <min> - Price band alert
▸ /set_alert_perc <crypto> <rise %> <fall %> - Percent move alert
▸ /my_alerts - Your alerts
▸ /delete_alert <VAL|PERC|EMA> <crypto> - Delete an alert
▸ /delete_all_alerts - Delete all alerts";

pub const AUTHORS_TEXT: &str = "👥 Authors:\n▸ BitBotX team, SPbSTU";
