//! Decoding of `/exchange` responses into [`OrderOutcome`].
//!
//! Shapes handled:
//! - `{"status": "ok", "response": {"type": "order", "data": {"statuses": [...]}}}`
//! - `{"status": "err", "response": "<message>"}`
//!
//! Each entry of `statuses` is one of:
//! - `{"filled": {"totalSz": "0.02", "avgPx": "1891.4", "oid": 12345}}`
//! - `{"resting": {"oid": 12345}}`
//! - `{"error": "<message>"}`

use serde::Deserialize;
use serde_json::Value;
use sigbot_core::{Price, Size};

use crate::gateway::{Fill, OrderOutcome};

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "status", content = "response", rename_all = "lowercase")]
enum ExchangeResponse {
    Ok(ResponseBody),
    /// Usually a plain message string.
    Err(Value),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
enum ResponseBody {
    Order(OrderData),
    Default,
}

#[derive(Debug, Deserialize)]
struct OrderData {
    statuses: Vec<OrderStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum OrderStatus {
    Filled(FilledOrder),
    Resting(RestingOrder),
    Error(String),
}

#[derive(Debug, Deserialize)]
struct FilledOrder {
    oid: u64,
    #[serde(rename = "avgPx")]
    avg_px: Price,
    #[serde(rename = "totalSz")]
    total_sz: Size,
}

#[derive(Debug, Deserialize)]
struct RestingOrder {
    oid: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ActionStatus {
    Ok,
    Err,
}

#[derive(Debug, Deserialize)]
struct ActionEnvelope {
    status: ActionStatus,
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode the first order status of an exchange response.
///
/// Anything that does not match a known shape is `Unknown`, which the retry
/// layer treats like any other unfilled attempt.
pub fn decode_order_response(body: &Value) -> OrderOutcome {
    let response = match ExchangeResponse::deserialize(body) {
        Ok(response) => response,
        Err(e) => return OrderOutcome::Unknown(format!("{e}: {body}")),
    };

    let data = match response {
        ExchangeResponse::Err(message) => return OrderOutcome::Rejected(value_to_message(&message)),
        ExchangeResponse::Ok(ResponseBody::Order(data)) => data,
        ExchangeResponse::Ok(ResponseBody::Default) => {
            return OrderOutcome::Unknown(format!("not an order response: {body}"))
        }
    };

    match data.statuses.into_iter().next() {
        Some(OrderStatus::Filled(filled)) => OrderOutcome::Filled(Fill {
            order_id: filled.oid,
            avg_price: filled.avg_px,
            filled_size: filled.total_sz,
        }),
        Some(OrderStatus::Error(message)) => OrderOutcome::Rejected(message),
        Some(OrderStatus::Resting(resting)) => {
            OrderOutcome::Unknown(format!("order {} resting, not filled", resting.oid))
        }
        None => OrderOutcome::Unknown(format!("no order statuses: {body}")),
    }
}

/// Whether a non-order action (e.g. `updateLeverage`) succeeded.
pub fn is_action_ok(body: &Value) -> bool {
    matches!(
        ActionEnvelope::deserialize(body),
        Ok(ActionEnvelope {
            status: ActionStatus::Ok
        })
    )
}

fn value_to_message(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}
