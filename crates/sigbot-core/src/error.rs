//! Error types for sigbot-core.

use crate::SignalStatus;
use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid direction: {0}")]
    InvalidDirection(String),

    #[error("Invalid signal status: {0}")]
    InvalidStatus(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: SignalStatus, to: SignalStatus },

    #[error("Invalid signal id: {0}")]
    InvalidSignalId(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
