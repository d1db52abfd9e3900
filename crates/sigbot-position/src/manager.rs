//! Position Manager: executes opens and closes and records the transitions.

use chrono::Utc;
use serde::Serialize;
use sigbot_core::{Direction, ExitFill, PositionDetails, Price, Signal, SignalId, SignalStatus, Size};
use sigbot_exchange::{DynGateway, Fill, OrderRequest};
use sigbot_store::{DynStore, StoreError};
use sigbot_telemetry::Metrics;
use tracing::{debug, error, info, warn};

use crate::error::{PositionError, PositionResult};
use crate::retry::RetryPolicy;

/// How a close completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CloseOutcome {
    /// A reduce-only order flattened the position.
    Filled { fill: Fill },
    /// The venue already showed no position; closed locally, no order placed.
    AlreadyFlat { exit_price: Option<Price> },
}

impl CloseOutcome {
    pub fn exit_price(&self) -> Option<Price> {
        match self {
            Self::Filled { fill } => Some(fill.avg_price),
            Self::AlreadyFlat { exit_price } => *exit_price,
        }
    }

    pub fn placed_order(&self) -> bool {
        matches!(self, Self::Filled { .. })
    }
}

/// Executes lifecycle orders against the gateway and writes the resulting
/// status transitions to the store.
pub struct PositionManager {
    gateway: DynGateway,
    store: DynStore,
    retry: RetryPolicy,
}

impl PositionManager {
    pub fn new(gateway: DynGateway, store: DynStore, retry: RetryPolicy) -> Self {
        Self {
            gateway,
            store,
            retry,
        }
    }

    pub fn gateway(&self) -> &DynGateway {
        &self.gateway
    }

    pub fn store(&self) -> &DynStore {
        &self.store
    }

    /// Open a position for a pending signal.
    ///
    /// On a fill the signal moves to `open` with details built from the fill.
    /// Without a fill nothing is written and the signal stays `pending`.
    pub async fn open(
        &self,
        signal_id: SignalId,
        symbol: &str,
        direction: Direction,
        size: Size,
        price: Price,
        leverage: u32,
    ) -> PositionResult<Signal> {
        info!(
            %signal_id,
            symbol,
            %direction,
            %size,
            %price,
            leverage,
            "Opening position"
        );

        let request = OrderRequest::open(symbol, direction.is_buy(), size, price, leverage);
        let fill = self.retry.place(self.gateway.as_ref(), &request, "open").await?;

        let details = PositionDetails {
            order_id: fill.order_id,
            entry_price: fill.avg_price,
            size: fill.filled_size,
            notional_usd: fill.filled_size.notional(fill.avg_price),
            leverage,
            entry_timestamp: Utc::now(),
            exit_price: None,
            exit_timestamp: None,
            pnl: None,
        };

        let signal = self
            .store
            .update_status(signal_id, SignalStatus::Open, Some(details))
            .map_err(|source| self.persist_failure(signal_id, source))?;

        Metrics::position_opened(symbol, direction.as_str());
        info!(
            %signal_id,
            symbol,
            oid = fill.order_id,
            entry_price = %fill.avg_price,
            size = %fill.filled_size,
            "Position opened"
        );
        Ok(signal)
    }

    /// Close the position behind `signal_id`.
    ///
    /// The live venue position decides side and size. A venue that already
    /// shows no position is an idempotent success without an order.
    pub async fn close(&self, signal_id: SignalId, symbol: &str) -> PositionResult<CloseOutcome> {
        let live = self
            .gateway
            .position(symbol)
            .await?
            .filter(|p| p.is_open());

        let Some(live) = live else {
            let exit_price = self.gateway.current_price(symbol).await;
            info!(%signal_id, symbol, "No live position, closing signal locally");
            self.mark_closed(signal_id, exit_price)?;
            return Ok(CloseOutcome::AlreadyFlat { exit_price });
        };

        // Long positions close with a sell, shorts with a buy.
        let is_buy = live.size.is_negative();
        let size = live.size.abs();
        let price = self
            .gateway
            .current_price(symbol)
            .await
            .ok_or_else(|| PositionError::PriceUnavailable(symbol.to_string()))?;

        info!(%signal_id, symbol, is_buy, %size, %price, "Closing position");

        let request = OrderRequest::close(symbol, is_buy, size, price);
        let fill = self.retry.place(self.gateway.as_ref(), &request, "close").await?;

        let exit = ExitFill {
            exit_price: Some(fill.avg_price),
            closed_size: Some(fill.filled_size),
            exit_timestamp: Utc::now(),
        };
        match self.store.record_close(signal_id, exit) {
            Ok(_) => {}
            Err(e) if e.is_already_closed() => {
                warn!(%signal_id, symbol, "Signal already closed when recording fill");
            }
            Err(source) => return Err(self.persist_failure(signal_id, source)),
        }

        info!(
            %signal_id,
            symbol,
            oid = fill.order_id,
            exit_price = %fill.avg_price,
            "Position closed"
        );
        Ok(CloseOutcome::Filled { fill })
    }

    /// Close a signal whose position vanished from the venue (manual close,
    /// liquidation).
    ///
    /// Returns `false` when the signal was already closed and nothing was
    /// written.
    pub fn mark_closed(&self, signal_id: SignalId, exit_price: Option<Price>) -> PositionResult<bool> {
        let exit = ExitFill {
            exit_price,
            closed_size: None,
            exit_timestamp: Utc::now(),
        };
        match self.store.record_close(signal_id, exit) {
            Ok(_) => Ok(true),
            Err(e) if e.is_already_closed() => {
                debug!(%signal_id, "Signal already closed, nothing to mark");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn persist_failure(&self, signal_id: SignalId, source: StoreError) -> PositionError {
        Metrics::persist_after_fill_failure();
        error!(
            %signal_id,
            error = %source,
            "Venue fill not recorded locally, reconciliation required"
        );
        PositionError::PersistAfterFill { signal_id, source }
    }
}
