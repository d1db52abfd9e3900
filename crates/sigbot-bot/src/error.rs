//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Exchange error: {0}")]
    Exchange(#[from] sigbot_exchange::ExchangeError),

    #[error("Key error: {0}")]
    Key(#[from] sigbot_exchange::KeyError),

    #[error("Store error: {0}")]
    Store(#[from] sigbot_store::StoreError),

    #[error("Engine error: {0}")]
    Engine(#[from] sigbot_engine::EngineError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] sigbot_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
