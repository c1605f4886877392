//! Alert trigger rules
//!
//! Pure functions over a stored alert and a price already converted to the
//! alert's fiat. They never touch storage; the dispatcher applies the
//! resulting [`Decision`] with a conditional write.

use crate::storage::{Notification, NotificationKind};
use crate::types::{Crypto, Fiat};
use crate::utils::{percent_change, round_half_up};
use rust_decimal::Decimal;

/// Scale of the stored running EMA
const EMA_DP: u32 = 8;

/// State transition produced by evaluating one alert against one price
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// VALUE or PERCENT threshold crossed; the alert deactivates
    Trigger {
        alert_id: String,
        chat_id: String,
        event_ts: i64,
        message: String,
    },
    /// EMA advanced; `message` is set when the trend flipped
    Ema {
        alert_id: String,
        chat_id: String,
        event_ts: i64,
        ema: Decimal,
        is_above: bool,
        message: Option<String>,
    },
}

impl Decision {
    pub fn alert_id(&self) -> &str {
        match self {
            Decision::Trigger { alert_id, .. } | Decision::Ema { alert_id, .. } => alert_id,
        }
    }

    pub fn chat_id(&self) -> &str {
        match self {
            Decision::Trigger { chat_id, .. } | Decision::Ema { chat_id, .. } => chat_id,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Decision::Trigger { message, .. } => Some(message),
            Decision::Ema { message, .. } => message.as_deref(),
        }
    }
}

/// Fires when `price >= upper` or `price <= lower`
pub fn value_crossing(crypto: Crypto, fiat: Fiat, price: Decimal, upper: Decimal, lower: Decimal) -> Option<String> {
    if price >= upper {
        Some(format!(
            "🚨 {} exceeded the upper boundary, current price: {} {}",
            crypto.code(),
            price,
            fiat.code()
        ))
    } else if price <= lower {
        Some(format!(
            "🚨 {} dropped below the lower boundary, current price: {} {}",
            crypto.code(),
            price,
            fiat.code()
        ))
    } else {
        None
    }
}

/// Fires when the change from `start` reaches `+up` or `-down` percent
pub fn percent_crossing(
    crypto: Crypto,
    fiat: Fiat,
    price: Decimal,
    start: Decimal,
    up: Decimal,
    down: Decimal,
) -> Option<String> {
    if start.is_zero() {
        return None;
    }
    let change = percent_change(price, start, 4, 2);

    if change >= up {
        Some(format!(
            "🚨 {} rose by {}% (to {} {})",
            crypto.code(),
            change,
            price,
            fiat.code()
        ))
    } else if change <= -down {
        Some(format!(
            "🚨 {} fell by {}% (to {} {})",
            crypto.code(),
            change.abs(),
            price,
            fiat.code()
        ))
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmaStep {
    pub ema: Decimal,
    pub is_above: bool,
    pub crossing: Option<String>,
}

/// `ema' = (1 - k) * ema + k * price`; a crossing is a change of side
pub fn ema_step(
    crypto: Crypto,
    fiat: Fiat,
    price: Decimal,
    current_ema: Decimal,
    was_above: bool,
    smoothing: Decimal,
) -> EmaStep {
    let ema = round_half_up((Decimal::ONE - smoothing) * current_ema + smoothing * price, EMA_DP);
    let is_above = price > ema;

    let crossing = (is_above != was_above).then(|| {
        let (trend, arrow) = if is_above { ("Uptrend", "📈") } else { ("Downtrend", "📉") };
        format!(
            "🚨 {} detected for {}\n💰 Current price: {} {}\n{} EMA: {} {}",
            trend,
            crypto.code(),
            price,
            fiat.code(),
            arrow,
            round_half_up(ema, 2),
            fiat.code()
        )
    });

    EmaStep { ema, is_above, crossing }
}

/// Apply the rule matching the alert's kind
pub fn evaluate_alert(alert: &Notification, price: Decimal, event_ts: i64, smoothing: Decimal) -> Option<Decision> {
    let trigger = |message: String| Decision::Trigger {
        alert_id: alert.id.clone(),
        chat_id: alert.chat_id.clone(),
        event_ts,
        message,
    };

    match &alert.kind {
        NotificationKind::Value { upper, lower } => {
            value_crossing(alert.crypto, alert.fiat, price, *upper, *lower).map(trigger)
        }
        NotificationKind::Percent { up_percent, down_percent, .. } => percent_crossing(
            alert.crypto,
            alert.fiat,
            price,
            alert.start_price,
            *up_percent,
            *down_percent,
        )
        .map(trigger),
        NotificationKind::Ema { current_ema, is_above, .. } => {
            let step = ema_step(alert.crypto, alert.fiat, price, *current_ema, *is_above, smoothing);
            Some(Decision::Ema {
                alert_id: alert.id.clone(),
                chat_id: alert.chat_id.clone(),
                event_ts,
                ema: step.ema,
                is_above: step.is_above,
                message: step.crossing,
            })
        }
    }
}
