//! Position execution for the signal lifecycle bot.
//!
//! # Key Components
//!
//! - [`PositionManager`]: Opens and closes positions with bounded retry and
//!   writes the resulting status transitions to the signal store
//! - [`RetryPolicy`]: Attempt budget and exponential backoff
//! - [`calculate_position_size`]: Risk-bounded sizing with venue minimums
//! - [`Reconciler`]: Aligns open signals with the venue's live positions

pub mod error;
pub mod manager;
pub mod reconcile;
pub mod retry;
pub mod sizing;

pub use error::{PositionError, PositionResult};
pub use manager::{CloseOutcome, PositionManager};
pub use reconcile::{Discrepancy, ReconcileReport, Reconciler};
pub use retry::RetryPolicy;
pub use sizing::{
    calculate_position_size, size_position, PositionSize, SizingInput, ENTRY_LEVERAGE,
};
