//! Core domain types for the signal lifecycle bot.
//!
//! This crate provides the vocabulary shared by every other crate:
//! - `Price`, `Size`: Precision-safe numeric types
//! - `Signal`, `SignalData`, `PositionDetails`: The signal aggregate
//! - `SignalStatus`: Lifecycle states and their legal transitions
//! - `AssetSpec`: Venue price/size formatting rules

pub mod asset;
pub mod decimal;
pub mod error;
pub mod signal;

pub use asset::{AssetSpec, PRICE_SIG_FIGS, SPOT_ASSET_ID_OFFSET};
pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use signal::{
    Direction, ExitFill, PositionDetails, Signal, SignalData, SignalId, SignalStatus,
};
