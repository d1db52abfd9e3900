//! Exchange gateway contract.
//!
//! The trait uses boxed futures so it stays dyn-compatible and can be shared
//! as `Arc<dyn ExchangeGateway>` between the monitor loop and request
//! handlers.

use std::pin::Pin;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use sigbot_core::{AssetSpec, Price, Size};

use crate::error::ExchangeResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Execution style of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// Aggressive, immediate-or-cancel. Used for every lifecycle open/close.
    Immediate,
    /// Resting limit order (good till cancel).
    Resting,
}

/// Order placement request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub is_buy: bool,
    /// Absolute base-asset size.
    pub size: Size,
    /// Reference price. Immediate orders apply slippage around it.
    pub price: Price,
    pub kind: OrderKind,
    pub reduce_only: bool,
    /// Leverage to apply before an opening order.
    pub leverage: Option<u32>,
}

impl OrderRequest {
    /// Immediate order opening (or adding to) a position.
    pub fn open(symbol: impl Into<String>, is_buy: bool, size: Size, price: Price, leverage: u32) -> Self {
        Self {
            symbol: symbol.into(),
            is_buy,
            size,
            price,
            kind: OrderKind::Immediate,
            reduce_only: false,
            leverage: Some(leverage),
        }
    }

    /// Immediate reduce-only order flattening a position.
    pub fn close(symbol: impl Into<String>, is_buy: bool, size: Size, price: Price) -> Self {
        Self {
            symbol: symbol.into(),
            is_buy,
            size,
            price,
            kind: OrderKind::Immediate,
            reduce_only: true,
            leverage: None,
        }
    }
}

/// Fill data from a filled order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Fill {
    pub order_id: u64,
    pub avg_price: Price,
    pub filled_size: Size,
}

/// Decoded order placement result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum OrderOutcome {
    /// The order was filled.
    Filled(Fill),
    /// The venue (or the transport) rejected the order.
    Rejected(String),
    /// Accepted but not filled, or a response shape we do not recognize.
    Unknown(String),
}

impl OrderOutcome {
    #[must_use]
    pub fn is_filled(&self) -> bool {
        matches!(self, Self::Filled(_))
    }

    pub fn fill(&self) -> Option<&Fill> {
        match self {
            Self::Filled(fill) => Some(fill),
            _ => None,
        }
    }
}

/// Live position as reported by the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LivePosition {
    pub symbol: String,
    /// Signed size: positive = long, negative = short.
    pub size: Size,
    pub entry_price: Option<Price>,
}

impl LivePosition {
    /// True when the venue reports a non-zero exposure.
    pub fn is_open(&self) -> bool {
        !self.size.is_zero()
    }
}

/// Account balance summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountValue {
    pub total_value: Decimal,
    pub withdrawable: Decimal,
}

/// Venue operations consumed by the lifecycle engine.
///
/// Timeouts and transport failures are handled inside implementations and
/// surface as `None`, `Err` or `OrderOutcome::Rejected`.
pub trait ExchangeGateway: Send + Sync {
    /// Current mid price, `None` when unavailable.
    fn current_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, Option<Price>>;

    /// Live position for `symbol`, `Ok(None)` when the venue reports none.
    fn position<'a>(&'a self, symbol: &'a str)
        -> BoxFuture<'a, ExchangeResult<Option<LivePosition>>>;

    /// All live non-zero positions.
    fn positions(&self) -> BoxFuture<'_, ExchangeResult<Vec<LivePosition>>>;

    /// Place an order and decode the venue's answer.
    fn place_order(&self, request: OrderRequest) -> BoxFuture<'_, OrderOutcome>;

    /// Account value and withdrawable balance.
    fn account_value(&self) -> BoxFuture<'_, ExchangeResult<AccountValue>>;

    /// Venue metadata for `symbol`.
    fn asset_spec<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, ExchangeResult<AssetSpec>>;

    /// Size precision (decimals) for `symbol`.
    fn size_decimals<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, ExchangeResult<u32>> {
        Box::pin(async move { Ok(self.asset_spec(symbol).await?.sz_decimals) })
    }

    /// Minimum tradeable size for `symbol`.
    fn min_size<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, ExchangeResult<Size>> {
        Box::pin(async move { Ok(self.asset_spec(symbol).await?.min_size()) })
    }
}

/// Arc wrapper for gateway trait objects.
pub type DynGateway = Arc<dyn ExchangeGateway>;
