//! Engine error types.

use sigbot_exchange::ExchangeError;
use sigbot_position::PositionError;
use sigbot_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid signal: {0}")]
    InvalidSignal(String),

    #[error("No open position for {0}")]
    NoOpenPosition(String),

    #[error("Price unavailable for {0}")]
    PriceUnavailable(String),

    #[error("Monitor already running")]
    AlreadyRunning,

    #[error(transparent)]
    Position(#[from] PositionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

pub type EngineResult<T> = Result<T, EngineError>;
