//! Repository contract for signal records.

use std::sync::Arc;

use sigbot_core::{ExitFill, PositionDetails, Signal, SignalData, SignalId, SignalStatus};

use crate::error::StoreResult;

/// Signal repository.
///
/// Every mutating method is atomic per record: the status check, the
/// mutation and the persisted write happen as one step.
pub trait SignalStore: Send + Sync {
    /// Persist a new `pending` signal.
    fn create(&self, data: SignalData) -> StoreResult<Signal>;

    /// Transition `id` to `status`, replacing position details when given.
    ///
    /// Fails with `NotFound` or `InvalidTransition`.
    fn update_status(
        &self,
        id: SignalId,
        status: SignalStatus,
        details: Option<PositionDetails>,
    ) -> StoreResult<Signal>;

    /// Close `id`, merging exit data (and P&L) into its position details.
    fn record_close(&self, id: SignalId, exit: ExitFill) -> StoreResult<Signal>;

    /// Signals with `status`, oldest first.
    fn by_status(&self, status: SignalStatus) -> StoreResult<Vec<Signal>>;

    /// Signals for `symbol` (optionally filtered by status), newest first.
    fn by_asset(&self, symbol: &str, status: Option<SignalStatus>) -> StoreResult<Vec<Signal>>;

    fn get(&self, id: SignalId) -> StoreResult<Signal>;

    /// Cheap reachability probe for health checks.
    fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Arc wrapper for store trait objects.
pub type DynStore = Arc<dyn SignalStore>;
