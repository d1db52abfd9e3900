//! Exchange gateway for the signal lifecycle bot.
//!
//! The lifecycle engine only talks to the venue through [`ExchangeGateway`]:
//! price lookup, position lookup, order placement and account queries.
//! Order responses are decoded once, here, into the tagged [`OrderOutcome`].
//!
//! - `gateway`: The contract and its value types
//! - `hyperliquid`: Production adapter over the Hyperliquid REST API
//! - `info`: Read-only info endpoint client
//! - `signer`: L1 action signing (msgpack action hash + EIP-712 phantom agent)
//! - `mock`: In-memory gateway for tests

pub mod error;
pub mod gateway;
pub mod hyperliquid;
pub mod info;
pub mod mock;
pub mod response;
pub mod signer;
pub mod user_state;

pub use error::{ExchangeError, ExchangeResult};
pub use gateway::{
    AccountValue, BoxFuture, DynGateway, ExchangeGateway, Fill, LivePosition, OrderKind,
    OrderOutcome, OrderRequest,
};
pub use hyperliquid::{GatewayConfig, HyperliquidGateway};
pub use info::InfoClient;
pub use mock::MockGateway;
pub use signer::{KeyError, KeyManager, KeySource, Signer, SignerError};
