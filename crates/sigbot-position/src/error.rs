//! Position error types.

use sigbot_core::SignalId;
use sigbot_exchange::ExchangeError;
use sigbot_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("Order not filled after {attempts} attempts: {last}")]
    NotFilled { attempts: u32, last: String },

    #[error("Price unavailable for {0}")]
    PriceUnavailable(String),

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The venue filled the order but the local record was not updated.
    #[error("Fill for signal {signal_id} not recorded: {source}")]
    PersistAfterFill {
        signal_id: SignalId,
        #[source]
        source: StoreError,
    },
}

pub type PositionResult<T> = Result<T, PositionError>;
