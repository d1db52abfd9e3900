//! Inbound JSON shapes.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sigbot_engine::InboundSignal;

use crate::error::ApiError;

/// `Max Exit Time` as a plain string or an extended-JSON date object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExitTime {
    Text(String),
    Wrapped {
        #[serde(rename = "$date")]
        date: String,
    },
}

impl ExitTime {
    /// Parse as ISO-8601. Naive timestamps are taken as UTC.
    pub fn parse(&self) -> Result<DateTime<Utc>, ApiError> {
        let raw = match self {
            Self::Text(s) => s.as_str(),
            Self::Wrapped { date } => date.as_str(),
        }
        .trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid Max Exit Time: {raw}")))
    }
}

/// `POST /signal` body.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalBody {
    #[serde(rename = "Signal Message")]
    pub signal_message: String,
    #[serde(rename = "Token Mentioned")]
    pub token_mentioned: String,
    #[serde(rename = "TP1")]
    pub tp1: Decimal,
    #[serde(rename = "TP2")]
    pub tp2: Decimal,
    #[serde(rename = "SL")]
    pub sl: Decimal,
    #[serde(rename = "Max Exit Time")]
    pub max_exit_time: ExitTime,
    #[serde(rename = "Current Price", default)]
    pub current_price: Option<Decimal>,
}

impl SignalBody {
    pub fn into_inbound(self) -> Result<InboundSignal, ApiError> {
        let direction = self.signal_message.to_lowercase();
        if direction != "buy" && direction != "sell" {
            return Err(ApiError::BadRequest(format!(
                "Invalid signal message: {direction}. Must be \"buy\" or \"sell\""
            )));
        }
        Ok(InboundSignal {
            direction,
            symbol: self.token_mentioned.to_uppercase(),
            tp1: self.tp1,
            tp2: self.tp2,
            sl: self.sl,
            expires_at: self.max_exit_time.parse()?,
            reference_price: self.current_price,
        })
    }
}
