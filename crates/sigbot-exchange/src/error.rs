//! Error types for sigbot-exchange.

use crate::signer::{KeyError, SignerError};
use thiserror::Error;

/// Exchange gateway errors.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Exchange API error: {0}")]
    Api(String),

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    #[error("Failed to parse exchange data: {0}")]
    Parse(String),

    #[error("No account address configured")]
    NoAccount,

    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),
}

/// Result type for exchange operations.
pub type ExchangeResult<T> = Result<T, ExchangeError>;
