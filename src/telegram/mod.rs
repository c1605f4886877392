//! Telegram bot interface
//!
//! [`UpdatePoller`] feeds incoming messages onto the bus,
//! [`CommandProcessor`] answers them and [`TelegramClient`] delivers
//! whatever lands on the outgoing topic.

pub mod client;
pub mod commands;
pub mod handler;


pub use client::{escape_html, TelegramClient, TelegramUpdate, UpdatePoller};
pub use commands::{BotCommand, ParseError};
pub use handler::CommandProcessor;
