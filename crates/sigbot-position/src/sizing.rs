//! Risk-bounded position sizing.
//!
//! margin   = account value * risk% / 100
//! notional = margin * leverage
//! size     = notional / price, rounded to the asset's size precision
//!
//! Sizes below the venue minimum are bumped to `min_size * 1.1`.

use rust_decimal::Decimal;
use serde::Serialize;
use sigbot_core::{Price, Size};
use sigbot_exchange::ExchangeGateway;
use tracing::debug;

use crate::error::{PositionError, PositionResult};

/// Leverage applied to every entry.
pub const ENTRY_LEVERAGE: u32 = 2;

/// Multiplier applied to the venue minimum when the computed size is too small.
pub const MIN_SIZE_BUFFER: Decimal = Decimal::from_parts(11, 0, 0, false, 1);

/// Inputs for [`calculate_position_size`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizingInput {
    pub account_value: Decimal,
    /// Percentage of account value committed as margin (10 = 10%).
    pub risk_pct: Decimal,
    pub leverage: u32,
    pub price: Price,
    pub min_size: Size,
    pub sz_decimals: u32,
}

/// Sizing result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PositionSize {
    pub size: Size,
    pub notional_usd: Decimal,
    pub margin_usd: Decimal,
    /// True when the venue minimum replaced the computed size.
    pub bumped_to_min: bool,
}

pub fn calculate_position_size(input: &SizingInput) -> PositionResult<PositionSize> {
    if !input.price.is_positive() {
        return Err(PositionError::InvalidSize(format!(
            "non-positive price {}",
            input.price
        )));
    }

    let margin_usd = input.account_value * input.risk_pct / Decimal::ONE_HUNDRED;
    let target_notional = margin_usd * Decimal::from(input.leverage);
    let raw_size = Size::new(target_notional / input.price.inner());

    let (size, bumped_to_min) = if raw_size < input.min_size {
        (input.min_size * MIN_SIZE_BUFFER, true)
    } else {
        (raw_size, false)
    };

    let mut size = size.round_dp(input.sz_decimals);
    if size < input.min_size {
        size = input.min_size;
    }

    Ok(PositionSize {
        size,
        notional_usd: size.notional(input.price),
        margin_usd,
        bumped_to_min,
    })
}

/// Size a new position for `symbol` from live account and venue data.
pub async fn size_position(
    gateway: &dyn ExchangeGateway,
    symbol: &str,
    price: Price,
    risk_pct: Decimal,
) -> PositionResult<PositionSize> {
    let account = gateway.account_value().await?;
    let min_size = gateway.min_size(symbol).await?;
    let sz_decimals = gateway.size_decimals(symbol).await?;

    let sized = calculate_position_size(&SizingInput {
        account_value: account.total_value,
        risk_pct,
        leverage: ENTRY_LEVERAGE,
        price,
        min_size,
        sz_decimals,
    })?;

    debug!(
        symbol,
        account_value = %account.total_value,
        size = %sized.size,
        notional = %sized.notional_usd,
        bumped_to_min = sized.bumped_to_min,
        "Position sized"
    );
    Ok(sized)
}
