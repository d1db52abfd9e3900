//! Signal lifecycle engine.
//!
//! # Key Components
//!
//! - [`evaluate_exit`]: Exit decision for one open position at one price
//! - [`Monitor`]: Background loop promoting pending signals and closing open
//!   positions whose exit conditions are met
//! - [`Engine`]: Administrative operations invoked by the transport layer

pub mod engine;
pub mod error;
pub mod exit;
pub mod monitor;

pub use engine::{
    CloseAllReport, ClosedPosition, Engine, FailedClose, HealthReport, InboundSignal,
    PositionSummary, PositionsSummary, SignalReceipt,
};
pub use error::{EngineError, EngineResult};
pub use exit::{evaluate_exit, ExitReason, TrailingState};
pub use monitor::{CycleSummary, Monitor, MonitorConfig, MonitorStatus, SizingConfig};
