//! Store error types.

use sigbot_core::{SignalId, SignalStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Signal not found: {0}")]
    NotFound(SignalId),

    #[error("Signal {id}: invalid status transition {from} -> {to}")]
    InvalidTransition {
        id: SignalId,
        from: SignalStatus,
        to: SignalStatus,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// True when the record is already closed (a concurrent close won the race).
    pub fn is_already_closed(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition {
                from: SignalStatus::Closed,
                ..
            }
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
