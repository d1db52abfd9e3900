//! HTTP transport for the signal lifecycle engine.
//!
//! Thin axum adapter: token auth, JSON decoding, and status mapping in front
//! of [`sigbot_engine::Engine`].
//!
//! | Route | Auth |
//! |-------|------|
//! | `POST /signal` | yes |
//! | `POST /close-all-positions` | yes |
//! | `POST /close-position/{symbol}` | yes |
//! | `POST /sync-positions` | yes |
//! | `GET /positions`, `/status`, `/vault-balance`, `/health`, `/metrics` | no |

mod config;
mod dto;
mod error;
mod server;

pub use config::ApiConfig;
pub use dto::{ExitTime, SignalBody};
pub use error::ApiError;
pub use server::{create_router, run_server, AppState, AUTH_HEADER};
