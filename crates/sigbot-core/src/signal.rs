//! The signal aggregate and its lifecycle.
//!
//! A signal moves `pending -> open -> closed`. `closed` is terminal and
//! closed signals are kept for history.

use crate::{CoreError, Price, Size};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique signal identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalId(pub Uuid);

impl SignalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SignalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SignalId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| CoreError::InvalidSignalId(s.to_string()))
    }
}

/// Trade direction of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    #[inline]
    pub fn is_buy(&self) -> bool {
        matches!(self, Self::Buy)
    }

    #[inline]
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = CoreError;

    /// Case-insensitive: "BUY", "Buy" and "buy" are all accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            _ => Err(CoreError::InvalidDirection(s.to_string())),
        }
    }
}

/// Lifecycle status of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    Pending,
    Open,
    Closed,
}

impl SignalStatus {
    /// Only `pending -> open` and `open -> closed` are legal.
    pub fn can_transition_to(&self, next: SignalStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Open) | (Self::Open, Self::Closed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            _ => Err(CoreError::InvalidStatus(s.to_string())),
        }
    }
}

/// Immutable signal parameters captured at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalData {
    pub direction: Direction,
    pub symbol: String,
    pub tp1: Price,
    pub tp2: Price,
    pub sl: Price,
    /// Absolute exit deadline.
    pub expires_at: DateTime<Utc>,
    /// Market price when the signal was issued.
    pub reference_price: Price,
}

/// Position attached to a signal once it opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionDetails {
    pub order_id: u64,
    pub entry_price: Price,
    /// Base-asset size (always positive).
    pub size: Size,
    /// size * entry_price.
    pub notional_usd: Decimal,
    pub leverage: u32,
    pub entry_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub exit_price: Option<Price>,
    #[serde(default)]
    pub exit_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pnl: Option<Decimal>,
}

impl PositionDetails {
    /// Realized P&L for `size` units exited at `exit_price`.
    pub fn pnl_at(&self, direction: Direction, exit_price: Price, size: Size) -> Decimal {
        let per_unit = match direction {
            Direction::Buy => exit_price - self.entry_price,
            Direction::Sell => self.entry_price - exit_price,
        };
        per_unit * size.inner()
    }
}

/// Exit data merged into a position when its signal closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitFill {
    /// Unknown when the position disappeared without a price to attribute.
    pub exit_price: Option<Price>,
    /// Size flattened by the closing order. `None` when no order was placed,
    /// in which case P&L falls back to the recorded entry size.
    #[serde(default)]
    pub closed_size: Option<Size>,
    pub exit_timestamp: DateTime<Utc>,
}

/// The signal aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    pub data: SignalData,
    #[serde(default)]
    pub position: Option<PositionDetails>,
    /// Denormalized from `data.symbol` for querying.
    pub symbol: String,
    pub status: SignalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Signal {
    pub fn new(data: SignalData, now: DateTime<Utc>) -> Self {
        Self {
            id: SignalId::new(),
            symbol: data.symbol.clone(),
            data,
            position: None,
            status: SignalStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.data.direction
    }

    /// Move to `next`, replacing position details when given.
    pub fn transition(
        &mut self,
        next: SignalStatus,
        details: Option<PositionDetails>,
        now: DateTime<Utc>,
    ) -> crate::Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if details.is_some() {
            self.position = details;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Close the signal, merging exit data into the existing position.
    pub fn apply_close(&mut self, exit: ExitFill, now: DateTime<Utc>) -> crate::Result<()> {
        let direction = self.direction();
        let mut position = self.position.clone();
        if let Some(details) = position.as_mut() {
            details.exit_price = exit.exit_price;
            details.exit_timestamp = Some(exit.exit_timestamp);
            let size = exit.closed_size.unwrap_or(details.size);
            details.pnl = exit.exit_price.map(|px| details.pnl_at(direction, px, size));
        }
        self.transition(SignalStatus::Closed, position, now)
    }
}
