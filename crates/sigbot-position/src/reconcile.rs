//! Store/venue reconciliation.
//!
//! Open signals whose asset has no live position are closed at the current
//! price. Live positions with no open signal are reported, never written.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use sigbot_core::{SignalId, SignalStatus, Size};
use sigbot_exchange::DynGateway;
use sigbot_store::DynStore;
use sigbot_telemetry::Metrics;
use tracing::{debug, info, warn};

use crate::error::PositionResult;
use crate::manager::PositionManager;

/// A mismatch that reconciliation could not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Discrepancy {
    /// Live venue position with no open signal to manage it.
    Untracked { symbol: String, size: Size },
    /// Open signal with no live position, left open because no exit price
    /// could be attributed.
    PriceUnavailable { signal_id: SignalId, symbol: String },
    /// Open signal with no live position that could not be closed locally.
    CloseFailed {
        signal_id: SignalId,
        symbol: String,
        error: String,
    },
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Untracked { symbol, size } => {
                write!(f, "untracked live position {symbol} size {size}")
            }
            Self::PriceUnavailable { signal_id, symbol } => {
                write!(f, "signal {signal_id} ({symbol}) flat on venue, no price to close at")
            }
            Self::CloseFailed {
                signal_id,
                symbol,
                error,
            } => write!(f, "signal {signal_id} ({symbol}) close failed: {error}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Open signals in the store before reconciliation.
    pub database_positions: usize,
    /// Non-zero live positions on the venue.
    pub actual_positions: usize,
    /// Open signals matched by a live position.
    pub synced: usize,
    /// Open signals closed because the venue was flat.
    pub closed_in_db: usize,
    pub discrepancies: Vec<Discrepancy>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

pub struct Reconciler {
    gateway: DynGateway,
    store: DynStore,
    manager: Arc<PositionManager>,
}

impl Reconciler {
    pub fn new(gateway: DynGateway, store: DynStore, manager: Arc<PositionManager>) -> Self {
        Self {
            gateway,
            store,
            manager,
        }
    }

    /// Compare open signals against live positions and resolve what can be
    /// resolved safely.
    ///
    /// A failed live-position query aborts without writes: an unreadable venue
    /// is never taken to mean flat.
    ///
    /// The store is read before the venue, so every signal considered here
    /// was already open when the venue snapshot was taken.
    pub async fn reconcile(&self) -> PositionResult<ReconcileReport> {
        let open = self.store.by_status(SignalStatus::Open)?;
        let live = self.gateway.positions().await?;
        let live: HashMap<String, Size> = live
            .into_iter()
            .filter(|p| p.is_open())
            .map(|p| (p.symbol, p.size))
            .collect();

        let mut report = ReconcileReport {
            database_positions: open.len(),
            actual_positions: live.len(),
            ..Default::default()
        };

        let mut tracked: HashSet<&str> = HashSet::new();
        for signal in &open {
            tracked.insert(signal.symbol.as_str());

            if live.contains_key(&signal.symbol) {
                report.synced += 1;
                continue;
            }

            // Confirm flat against the venue right before writing.
            match self.gateway.position(&signal.symbol).await {
                Ok(Some(position)) if position.is_open() => {
                    debug!(
                        signal_id = %signal.id,
                        symbol = %signal.symbol,
                        size = %position.size,
                        "Position appeared after snapshot, keeping signal open"
                    );
                    report.synced += 1;
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        signal_id = %signal.id,
                        symbol = %signal.symbol,
                        error = %e,
                        "Position re-check failed, leaving signal open"
                    );
                    report.discrepancies.push(Discrepancy::CloseFailed {
                        signal_id: signal.id,
                        symbol: signal.symbol.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            }

            let Some(price) = self.gateway.current_price(&signal.symbol).await else {
                warn!(
                    signal_id = %signal.id,
                    symbol = %signal.symbol,
                    "Open signal has no live position and no price, leaving open"
                );
                report.discrepancies.push(Discrepancy::PriceUnavailable {
                    signal_id: signal.id,
                    symbol: signal.symbol.clone(),
                });
                continue;
            };

            match self.manager.mark_closed(signal.id, Some(price)) {
                Ok(false) => {
                    debug!(
                        signal_id = %signal.id,
                        symbol = %signal.symbol,
                        "Signal closed concurrently, nothing to reconcile"
                    );
                }
                Ok(true) => {
                    report.closed_in_db += 1;
                    Metrics::position_closed(&signal.symbol, "reconciled");
                    info!(
                        signal_id = %signal.id,
                        symbol = %signal.symbol,
                        exit_price = %price,
                        "Closed signal with no live position"
                    );
                }
                Err(e) => {
                    warn!(
                        signal_id = %signal.id,
                        symbol = %signal.symbol,
                        error = %e,
                        "Failed to close signal during reconciliation"
                    );
                    report.discrepancies.push(Discrepancy::CloseFailed {
                        signal_id: signal.id,
                        symbol: signal.symbol.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let mut untracked: Vec<_> = live
            .iter()
            .filter(|(symbol, _)| !tracked.contains(symbol.as_str()))
            .filter(|(symbol, _)| !self.opened_since_read(symbol))
            .collect();
        untracked.sort_by(|a, b| a.0.cmp(b.0));
        for (symbol, size) in untracked {
            warn!(symbol = %symbol, size = %size, "Untracked live position");
            report.discrepancies.push(Discrepancy::Untracked {
                symbol: symbol.clone(),
                size: *size,
            });
        }

        Metrics::reconcile_discrepancies(report.discrepancies.len());
        info!(
            database_positions = report.database_positions,
            actual_positions = report.actual_positions,
            synced = report.synced,
            closed_in_db = report.closed_in_db,
            discrepancies = report.discrepancies.len(),
            "Reconciliation complete"
        );
        Ok(report)
    }

    /// Whether a signal for `symbol` became open after the store was read.
    fn opened_since_read(&self, symbol: &str) -> bool {
        self.store
            .by_asset(symbol, Some(SignalStatus::Open))
            .map(|signals| !signals.is_empty())
            .unwrap_or(false)
    }
}
