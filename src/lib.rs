//! BitBotX
//!
//! A Telegram bot for crypto prices, price alerts and portfolios, driven
//! by Kafka topics.
//!
//! ## Architecture
//!
//! ```text
//! Telegram getUpdates → incoming ──→ CommandProcessor ──┐
//!                                                        ├→ outgoing → Telegram sendMessage
//! PriceTicker ────────→ prices ───→ Evaluator → Dispatcher┘
//!                                        ↕
//!                                 SQLite (BitBotDB)
//! ```

pub mod admin;
pub mod alerts;
pub mod bus;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod ingester;
pub mod market;
pub mod monitor;
pub mod notify;
pub mod portfolio;
pub mod storage;
pub mod telegram;
pub mod types;
pub mod utils;

#[cfg(test)]
pub mod testing;

#[cfg(test)]
mod types_tests;
#[cfg(test)]
mod config_tests;

pub use config::Config;
pub use error::{BotError, Result};
