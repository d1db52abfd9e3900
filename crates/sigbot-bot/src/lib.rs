//! Signal-driven position lifecycle bot.
//!
//! Wires the components together:
//! - Hyperliquid gateway with the trading key
//! - Journal-backed signal store
//! - Position manager, monitor loop and reconciliation
//! - HTTP API for signal intake and administration

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::{AppConfig, KeyConfig, StoreConfig};
pub use error::{AppError, AppResult};
