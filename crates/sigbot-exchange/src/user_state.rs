//! Account state types returned by the info endpoint.
//!
//! Endpoint: POST /info with `{"type": "clearinghouseState", "user": "<address>"}`.
//! Numeric fields arrive as strings and are parsed on conversion.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sigbot_core::{Price, Size};

use crate::error::{ExchangeError, ExchangeResult};
use crate::gateway::{AccountValue, LivePosition};

/// Margin summary from clearinghouseState.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarginSummary {
    /// Account value in USD.
    #[serde(rename = "accountValue")]
    pub account_value: String,
    /// Total notional position value.
    #[serde(rename = "totalNtlPos", default)]
    pub total_notional_position: Option<String>,
    /// Total margin used.
    #[serde(rename = "totalMarginUsed", default)]
    pub total_margin_used: Option<String>,
}

/// clearinghouseState response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClearinghouseStateResponse {
    #[serde(rename = "marginSummary")]
    pub margin_summary: Option<MarginSummary>,
    /// Withdrawable balance.
    pub withdrawable: Option<String>,
    /// Open positions.
    #[serde(rename = "assetPositions", default)]
    pub asset_positions: Vec<AssetPositionEntry>,
}

/// Asset position entry from clearinghouseState.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetPositionEntry {
    pub position: AssetPositionData,
    /// Position type ("oneWay").
    #[serde(rename = "type")]
    pub position_type: Option<String>,
}

/// Position data within AssetPositionEntry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetPositionData {
    /// Coin (e.g., "ETH").
    pub coin: String,
    /// Signed size: positive = long, negative = short.
    pub szi: String,
    #[serde(rename = "entryPx")]
    pub entry_px: Option<String>,
    #[serde(rename = "positionValue")]
    pub position_value: Option<String>,
    #[serde(rename = "unrealizedPnl")]
    pub unrealized_pnl: Option<String>,
}

impl AssetPositionData {
    pub fn to_live_position(&self) -> ExchangeResult<LivePosition> {
        let size: Size = self
            .szi
            .parse()
            .map_err(|e| ExchangeError::Parse(format!("szi {:?} for {}: {e}", self.szi, self.coin)))?;
        let entry_price = self
            .entry_px
            .as_deref()
            .and_then(|px| px.parse::<Price>().ok());

        Ok(LivePosition {
            symbol: self.coin.clone(),
            size,
            entry_price,
        })
    }
}

impl ClearinghouseStateResponse {
    /// Non-zero live positions.
    pub fn live_positions(&self) -> ExchangeResult<Vec<LivePosition>> {
        let mut positions = Vec::with_capacity(self.asset_positions.len());
        for entry in &self.asset_positions {
            let position = entry.position.to_live_position()?;
            if position.is_open() {
                positions.push(position);
            }
        }
        Ok(positions)
    }

    pub fn account_value(&self) -> ExchangeResult<AccountValue> {
        let summary = self
            .margin_summary
            .as_ref()
            .ok_or_else(|| ExchangeError::Parse("missing marginSummary".to_string()))?;
        let total_value: Decimal = summary
            .account_value
            .parse()
            .map_err(|e| ExchangeError::Parse(format!("accountValue: {e}")))?;
        let withdrawable = match self.withdrawable.as_deref() {
            Some(raw) => raw
                .parse()
                .map_err(|e| ExchangeError::Parse(format!("withdrawable: {e}")))?,
            None => Decimal::ZERO,
        };

        Ok(AccountValue {
            total_value,
            withdrawable,
        })
    }
}
