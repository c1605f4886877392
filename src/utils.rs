//! Small helpers shared by logging and message formatting

use crate::error::Result;
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use std::future::Future;
use std::time::Duration;

const MASK: &str = "****";

/// Hide the middle of a chat id before it reaches the logs.
///
/// Keeps the first and last two characters; ids shorter than four
/// characters are replaced entirely.
pub fn mask_chat_id(chat_id: &str) -> String {
    let chars: Vec<char> = chat_id.chars().collect();
    if chars.len() < 4 {
        return MASK.to_string();
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}{}{}", head, MASK, tail)
}

/// Mask every `chatId` value inside a JSON document.
///
/// Non-JSON input is returned unchanged.
pub fn mask_chat_ids_in_json(raw: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(mut value) => {
            mask_value(&mut value);
            value.to_string()
        }
        Err(_) => raw.to_string(),
    }
}

fn mask_value(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if key == "chatId" {
                    let masked = match v {
                        serde_json::Value::String(s) => mask_chat_id(s),
                        serde_json::Value::Number(n) => mask_chat_id(&n.to_string()),
                        _ => continue,
                    };
                    *v = serde_json::Value::String(masked);
                } else {
                    mask_value(v);
                }
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(mask_value),
        _ => {}
    }
}

/// Human readable age, e.g. `2 d 3 h 15 min`
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let minutes = (seconds % 3600) / 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{} d", days));
    }
    if hours > 0 {
        parts.push(format!("{} h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{} min", minutes));
    }
    if parts.is_empty() {
        "less than a minute".to_string()
    } else {
        parts.join(" ")
    }
}

/// Round half-up to exactly `dp` decimals (trailing zeros kept for display)
pub fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(dp);
    rounded
}

/// Percent change `(current - base) / base * 100`.
///
/// The ratio is rounded to `ratio_dp` decimals before scaling and the
/// result to `result_dp`; a zero base yields zero.
pub fn percent_change(current: Decimal, base: Decimal, ratio_dp: u32, result_dp: u32) -> Decimal {
    if base.is_zero() {
        return round_half_up(Decimal::ZERO, result_dp);
    }
    let ratio = round_half_up((current - base) / base, ratio_dp);
    round_half_up(ratio * Decimal::ONE_HUNDRED, result_dp)
}

/// Run `op` up to `1 + retries` times, doubling the delay after each
/// failure and adding a little jitter. Non-transient errors are returned
/// immediately unless `retry_all` is set.
pub async fn retry_with_backoff<T, F, Fut>(
    label: &str,
    retries: u32,
    initial_delay: Duration,
    retry_all: bool,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = initial_delay;
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries && (retry_all || e.is_transient()) => {
                attempt += 1;
                let jitter_ms = rand::rng().random_range(0..=delay.as_millis() as u64 / 5);
                tracing::warn!(
                    "🔁 {} failed (attempt {}/{}): {}",
                    label,
                    attempt,
                    retries + 1,
                    e
                );
                tokio::time::sleep(delay + Duration::from_millis(jitter_ms)).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}
