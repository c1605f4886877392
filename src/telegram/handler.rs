//! Turns an incoming chat message into a reply

use super::commands::{BotCommand, ParseError, AUTHORS_TEXT, HELP_TEXT};
use crate::admin::AdminService;
use crate::alerts::AlertService;
use crate::error::{BotError, Result};
use crate::market::CryptoInformation;
use crate::portfolio::PortfolioManager;
use crate::storage::{Database, UserRecord};
use crate::utils::mask_chat_id;
use chrono::DateTime;
use rust_decimal::Decimal;
use std::sync::Arc;

const START_TEXT: &str = "👋 Welcome to BitBotX!\n\
I track crypto prices, your portfolio and price alerts.\n\
Use /help to see what I can do.";
const NOT_STARTED: &str = "❌ Please start the bot with /start";
const ADMIN_ONLY: &str = "⛔ This command is only available to administrators";
const AMOUNT_NOT_POSITIVE: &str = "❌ Amount must be greater than zero";
const GENERIC_FAILURE: &str = "⚠️ Something went wrong, please try again later";

pub struct CommandProcessor {
    db: Database,
    info: Arc<CryptoInformation>,
    alerts: AlertService,
    portfolio: PortfolioManager,
    admin: Arc<AdminService>,
}

impl CommandProcessor {
    pub fn new(
        db: Database,
        info: Arc<CryptoInformation>,
        alerts: AlertService,
        portfolio: PortfolioManager,
        admin: Arc<AdminService>,
    ) -> Self {
        Self {
            db,
            info,
            alerts,
            portfolio,
            admin,
        }
    }

    /// Reply for `text` sent from `chat_id`. Never fails: errors become
    /// user-facing messages.
    pub async fn process(&self, chat_id: &str, text: &str) -> String {
        let parsed = BotCommand::parse(text);

        if parsed != Ok(BotCommand::Start) {
            match self.db.find_user(chat_id).await {
                Ok(Some(user)) if user.has_started => {}
                Ok(_) => return NOT_STARTED.to_string(),
                Err(e) => {
                    tracing::error!("❌ User lookup for {} failed: {}", mask_chat_id(chat_id), e);
                    return GENERIC_FAILURE.to_string();
                }
            }
        }

        let command = match parsed {
            Ok(command) => command,
            Err(e) => {
                if e != ParseError::Unknown {
                    tracing::debug!("Rejected command from {}: {:?}", mask_chat_id(chat_id), e);
                }
                return e.reply();
            }
        };

        if command.is_admin() && !self.admin.is_admin_chat(chat_id) {
            tracing::warn!("⛔ Admin command from non-admin chat {}", mask_chat_id(chat_id));
            return ADMIN_ONLY.to_string();
        }

        tracing::info!("💬 {:?} from {}", command, mask_chat_id(chat_id));
        match self.execute(chat_id, command).await {
            Ok(reply) => reply,
            Err(BotError::Validation(msg)) => format!("❌ {}", msg),
            Err(e) => {
                tracing::error!("❌ Command from {} failed: {}", mask_chat_id(chat_id), e);
                GENERIC_FAILURE.to_string()
            }
        }
    }

    async fn user(&self, chat_id: &str) -> Result<UserRecord> {
        self.db
            .find_user(chat_id)
            .await?
            .ok_or_else(|| BotError::NotFound(format!("user {}", mask_chat_id(chat_id))))
    }

    async fn execute(&self, chat_id: &str, command: BotCommand) -> Result<String> {
        match command {
            BotCommand::Start => {
                if !self.db.start_user(chat_id).await? {
                    tracing::info!("👤 New user {}", mask_chat_id(chat_id));
                }
                Ok(START_TEXT.to_string())
            }
            BotCommand::Help => Ok(HELP_TEXT.to_string()),
            BotCommand::Authors => Ok(AUTHORS_TEXT.to_string()),
            BotCommand::SetCrypto(crypto) => {
                if self.user(chat_id).await?.current_crypto == crypto {
                    return Ok(format!("ℹ️ {} is already your default crypto currency", crypto.code()));
                }
                self.db.set_user_crypto(chat_id, crypto).await?;
                Ok(format!("💱 Default crypto currency set to {}", crypto.code()))
            }
            BotCommand::SetFiat(fiat) => {
                if self.user(chat_id).await?.current_fiat == fiat {
                    return Ok(format!("ℹ️ {} is already your default fiat currency", fiat.code()));
                }
                self.db.set_user_fiat(chat_id, fiat).await?;
                Ok(format!("💱 Prices will now be shown in {}", fiat.code()))
            }
            BotCommand::ShowCurrentPrice => {
                let user = self.user(chat_id).await?;
                let quote = self.info.current_price(user.current_crypto, user.current_fiat).await?;
                Ok(quote.to_message())
            }
            BotCommand::ShowPriceHistory(period) => {
                let user = self.user(chat_id).await?;
                let history = self
                    .info
                    .price_history(user.current_crypto, user.current_fiat, period)
                    .await?;
                Ok(history.to_message())
            }
            BotCommand::CompareCurrency { first, second, period } => {
                let user = self.user(chat_id).await?;
                let comparison = self.info.compare(first, second, user.current_fiat, period).await?;
                Ok(comparison.to_message())
            }
            BotCommand::Portfolio => self.portfolio.info(chat_id).await,
            BotCommand::GetPortfolioPrice => self.portfolio.price_info(chat_id).await,
            BotCommand::GetAssetsPrice => self.portfolio.assets_price(chat_id).await,
            BotCommand::Balance => self.portfolio.balance(chat_id).await,
            BotCommand::SetAlertVal { crypto, max, min } => {
                let fiat = self.user(chat_id).await?.current_fiat;
                self.alerts.set_value(chat_id, crypto, fiat, max, min).await
            }
            BotCommand::SetAlertPerc { crypto, up, down } => {
                let fiat = self.user(chat_id).await?.current_fiat;
                self.alerts.set_percent(chat_id, crypto, fiat, up, down).await
            }
            BotCommand::SetAlertEma(crypto) => {
                let fiat = self.user(chat_id).await?.current_fiat;
                self.alerts.set_ema(chat_id, crypto, fiat).await
            }
            BotCommand::MyAlerts => self.alerts.list(chat_id).await,
            BotCommand::DeleteAlert { kind, crypto } => self.alerts.delete(chat_id, kind, crypto).await,
            BotCommand::DeleteAllAlerts => self.alerts.delete_all(chat_id).await,
            BotCommand::Add { amount, crypto } => {
                if amount <= Decimal::ZERO {
                    return Ok(AMOUNT_NOT_POSITIVE.to_string());
                }
                self.portfolio.add(chat_id, amount, crypto).await
            }
            BotCommand::Remove { amount, crypto } => {
                if amount <= Decimal::ZERO {
                    return Ok(AMOUNT_NOT_POSITIVE.to_string());
                }
                self.portfolio.remove(chat_id, amount, crypto).await
            }
            BotCommand::DeleteAsset(crypto) => self.portfolio.delete_asset(chat_id, crypto).await,
            BotCommand::DeleteAllAssets => self.portfolio.delete_all(chat_id).await,
            BotCommand::AdminCreate(username) => match self.admin.create(&username).await {
                Ok(issued) => Ok(format!(
                    "✅ Admin {} created\n🔑 API key: {}\n⏰ Valid until: {}",
                    issued.username,
                    issued.key,
                    format_expiry(issued.expires_at)
                )),
                Err(BotError::Duplicate(_)) => Ok(format!("❌ Admin {} already exists", username)),
                Err(e) => Err(e),
            },
            BotCommand::AdminRefreshKey(username) => match self.admin.refresh(&username).await {
                Ok(issued) => Ok(format!(
                    "🔄 New key for {}\n🔑 API key: {}\n⏰ Valid until: {}",
                    issued.username,
                    issued.key,
                    format_expiry(issued.expires_at)
                )),
                Err(BotError::NotFound(_)) => Ok(format!("❌ Admin {} not found", username)),
                Err(e) => Err(e),
            },
            BotCommand::AdminDeactivate(username) => Ok(if self.admin.deactivate(&username).await? {
                format!("🔒 Admin {} deactivated", username)
            } else {
                format!("❌ Admin {} not found", username)
            }),
        }
    }
}

fn format_expiry(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}
