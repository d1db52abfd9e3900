//! Administrative operations consumed by the transport layer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sigbot_core::{Direction, Price, SignalData, SignalId, SignalStatus, Size};
use sigbot_exchange::AccountValue;
use sigbot_position::{PositionManager, ReconcileReport, Reconciler};
use sigbot_telemetry::Metrics;
use tracing::{error, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::monitor::{Monitor, MonitorStatus};

/// Validated-shape inbound signal handed over by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundSignal {
    /// `buy` or `sell`, any case.
    pub direction: String,
    pub symbol: String,
    pub tp1: Decimal,
    pub tp2: Decimal,
    pub sl: Decimal,
    pub expires_at: DateTime<Utc>,
    /// Fetched from the venue when absent or zero.
    pub reference_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalReceipt {
    pub signal_id: SignalId,
    pub symbol: String,
    pub direction: Direction,
    pub reference_price: Price,
    pub status: SignalStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClosedPosition {
    pub signal_id: SignalId,
    pub symbol: String,
    pub exit_price: Option<Price>,
    /// False when the venue was already flat.
    pub placed_order: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedClose {
    pub signal_id: SignalId,
    pub symbol: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseAllReport {
    /// `success`, or `partial_success` when any close failed.
    pub status: &'static str,
    pub closed_positions: Vec<ClosedPosition>,
    pub failed_positions: Vec<FailedClose>,
    pub total_positions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionSummary {
    pub signal_id: SignalId,
    pub symbol: String,
    pub direction: Direction,
    pub is_long: bool,
    pub size: Option<Size>,
    pub entry_price: Option<Price>,
    pub current_price: Option<Price>,
    pub position_value_usd: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionsSummary {
    pub positions: Vec<PositionSummary>,
    pub total_positions: usize,
    /// Sum over positions with a current price.
    pub total_value_usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub store_reachable: bool,
    pub monitoring_active: bool,
    pub timestamp: DateTime<Utc>,
}

pub struct Engine {
    manager: Arc<PositionManager>,
    monitor: Arc<Monitor>,
    reconciler: Reconciler,
}

impl Engine {
    pub fn new(manager: Arc<PositionManager>, monitor: Arc<Monitor>) -> Self {
        let reconciler = Reconciler::new(
            manager.gateway().clone(),
            manager.store().clone(),
            manager.clone(),
        );
        Self {
            manager,
            monitor,
            reconciler,
        }
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    /// Store a new pending signal and wake the monitor.
    pub async fn submit_signal(&self, inbound: InboundSignal) -> EngineResult<SignalReceipt> {
        let direction: Direction = inbound
            .direction
            .parse()
            .map_err(|_| EngineError::InvalidSignal(format!("direction {:?}", inbound.direction)))?;

        let symbol = inbound.symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(EngineError::InvalidSignal("empty symbol".to_string()));
        }
        for (name, level) in [("TP1", inbound.tp1), ("TP2", inbound.tp2), ("SL", inbound.sl)] {
            if level <= Decimal::ZERO {
                return Err(EngineError::InvalidSignal(format!("{name} must be positive")));
            }
        }

        let reference_price = match inbound.reference_price.filter(|p| p > &Decimal::ZERO) {
            Some(price) => Price::new(price),
            None => self
                .manager
                .gateway()
                .current_price(&symbol)
                .await
                .ok_or_else(|| EngineError::PriceUnavailable(symbol.clone()))?,
        };

        let signal = self.manager.store().create(SignalData {
            direction,
            symbol: symbol.clone(),
            tp1: Price::new(inbound.tp1),
            tp2: Price::new(inbound.tp2),
            sl: Price::new(inbound.sl),
            expires_at: inbound.expires_at,
            reference_price,
        })?;

        Metrics::signal_received(&symbol, direction.as_str());
        info!(
            signal_id = %signal.id,
            symbol = %symbol,
            %direction,
            %reference_price,
            expires_at = %inbound.expires_at,
            "Signal queued"
        );
        self.monitor.wake();

        Ok(SignalReceipt {
            signal_id: signal.id,
            symbol,
            direction,
            reference_price,
            status: signal.status,
        })
    }

    /// Close every open signal. Individual failures do not stop the rest.
    pub async fn close_all(&self) -> EngineResult<CloseAllReport> {
        let open = self.manager.store().by_status(SignalStatus::Open)?;
        info!(count = open.len(), "Closing all open positions");

        let mut closed_positions = Vec::new();
        let mut failed_positions = Vec::new();
        for signal in &open {
            match self.manager.close(signal.id, &signal.symbol).await {
                Ok(outcome) => {
                    Metrics::position_closed(&signal.symbol, "manual");
                    closed_positions.push(ClosedPosition {
                        signal_id: signal.id,
                        symbol: signal.symbol.clone(),
                        exit_price: outcome.exit_price(),
                        placed_order: outcome.placed_order(),
                    });
                }
                Err(e) => {
                    error!(signal_id = %signal.id, symbol = %signal.symbol, error = %e, "Close failed");
                    failed_positions.push(FailedClose {
                        signal_id: signal.id,
                        symbol: signal.symbol.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let status = if failed_positions.is_empty() {
            "success"
        } else {
            "partial_success"
        };
        info!(
            closed = closed_positions.len(),
            failed = failed_positions.len(),
            "Close all completed"
        );
        Ok(CloseAllReport {
            status,
            closed_positions,
            failed_positions,
            total_positions: open.len(),
        })
    }

    /// Close the most recent open signal for `symbol`.
    pub async fn close_by_symbol(&self, symbol: &str) -> EngineResult<ClosedPosition> {
        let symbol = symbol.trim().to_uppercase();
        let signal = self
            .manager
            .store()
            .by_asset(&symbol, Some(SignalStatus::Open))?
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::NoOpenPosition(symbol.clone()))?;

        let outcome = self.manager.close(signal.id, &symbol).await?;
        Metrics::position_closed(&symbol, "manual");
        Ok(ClosedPosition {
            signal_id: signal.id,
            symbol,
            exit_price: outcome.exit_price(),
            placed_order: outcome.placed_order(),
        })
    }

    pub async fn positions_summary(&self) -> EngineResult<PositionsSummary> {
        let open = self.manager.store().by_status(SignalStatus::Open)?;

        let mut positions = Vec::with_capacity(open.len());
        let mut total_value_usd = Decimal::ZERO;
        for signal in open {
            let current_price = self.manager.gateway().current_price(&signal.symbol).await;
            let size = signal.position.as_ref().map(|p| p.size);
            let position_value_usd = size
                .zip(current_price)
                .map(|(size, price)| size.notional(price).abs());
            if let Some(value) = position_value_usd {
                total_value_usd += value;
            }

            positions.push(PositionSummary {
                signal_id: signal.id,
                direction: signal.direction(),
                is_long: signal.direction().is_buy(),
                size,
                entry_price: signal.position.as_ref().map(|p| p.entry_price),
                current_price,
                position_value_usd,
                created_at: signal.created_at,
                symbol: signal.symbol,
            });
        }

        Ok(PositionsSummary {
            total_positions: positions.len(),
            positions,
            total_value_usd,
        })
    }

    pub async fn reconcile(&self) -> EngineResult<ReconcileReport> {
        Ok(self.reconciler.reconcile().await?)
    }

    pub fn monitoring_status(&self) -> EngineResult<MonitorStatus> {
        self.monitor.status()
    }

    pub async fn account_balance(&self) -> EngineResult<AccountValue> {
        Ok(self.manager.gateway().account_value().await?)
    }

    pub fn health(&self) -> HealthReport {
        let store_reachable = match self.manager.store().health_check() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Store health check failed");
                false
            }
        };
        HealthReport {
            status: if store_reachable { "healthy" } else { "degraded" },
            store_reachable,
            monitoring_active: self.monitor.is_running(),
            timestamp: Utc::now(),
        }
    }
}
