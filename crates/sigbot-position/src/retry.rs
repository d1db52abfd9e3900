//! Bounded retry with exponential backoff for order placement.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sigbot_exchange::{ExchangeGateway, Fill, OrderOutcome, OrderRequest};
use sigbot_telemetry::Metrics;
use tracing::{debug, warn};

use crate::error::{PositionError, PositionResult};

/// Attempt budget for a single open or close.
///
/// The delay between attempt `i` and `i + 1` (zero-based) is
/// `base_delay_ms * 2^i`: 1s, 2s, 4s with the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay_ms: base_delay.as_millis() as u64,
        }
    }

    /// Backoff after zero-based attempt `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    /// Place `request` until it fills or the budget runs out.
    ///
    /// Only `Filled` counts as success. Rejections and unknown shapes are
    /// retried alike.
    pub async fn place(
        &self,
        gateway: &dyn ExchangeGateway,
        request: &OrderRequest,
        operation: &'static str,
    ) -> PositionResult<Fill> {
        let attempts = self.max_attempts.max(1);
        let mut last = String::new();

        for attempt in 0..attempts {
            let outcome = gateway.place_order(request.clone()).await;
            match outcome {
                OrderOutcome::Filled(fill) => {
                    Metrics::order_attempt(operation, "filled");
                    debug!(
                        operation,
                        symbol = %request.symbol,
                        attempt = attempt + 1,
                        oid = fill.order_id,
                        "Order filled"
                    );
                    return Ok(fill);
                }
                OrderOutcome::Rejected(reason) => {
                    Metrics::order_attempt(operation, "rejected");
                    last = reason;
                }
                OrderOutcome::Unknown(shape) => {
                    Metrics::order_attempt(operation, "unknown");
                    last = shape;
                }
            }

            warn!(
                operation,
                symbol = %request.symbol,
                attempt = attempt + 1,
                max_attempts = attempts,
                reason = %last,
                "Order attempt not filled"
            );

            if attempt + 1 < attempts {
                tokio::time::sleep(self.delay_after(attempt)).await;
            }
        }

        Err(PositionError::NotFilled { attempts, last })
    }
}
