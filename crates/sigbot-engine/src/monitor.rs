//! Background lifecycle loop.
//!
//! Each cycle runs two passes against the signal store:
//! 1. Pending pass (oldest first): same-asset conflict policy, sizing, open.
//! 2. Open pass (oldest first): externally-closed detection, exit evaluation,
//!    close.
//!
//! Failures are isolated per signal. The loop only stops on [`Monitor::stop`].

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sigbot_core::{Signal, SignalId, SignalStatus};
use sigbot_position::{size_position, PositionManager, ENTRY_LEVERAGE};
use sigbot_telemetry::Metrics;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::exit::{evaluate_exit, ExitReason, TrailingState};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between cycles.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Trailing stop distance from the peak/trough (0.02 = 2%).
    #[serde(default = "default_trail_percent")]
    pub trail_percent: Decimal,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Upper bound on waiting for the in-flight cycle at shutdown.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_check_interval_secs() -> u64 {
    5
}

fn default_trail_percent() -> Decimal {
    Decimal::new(2, 2)
}

fn default_heartbeat_secs() -> u64 {
    60
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            trail_percent: default_trail_percent(),
            heartbeat_secs: default_heartbeat_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl MonitorConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingConfig {
    /// Percentage of account value committed as margin per position.
    #[serde(default = "default_risk_percentage")]
    pub risk_percentage: Decimal,
}

fn default_risk_percentage() -> Decimal {
    Decimal::from(10)
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            risk_percentage: default_risk_percentage(),
        }
    }
}

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    pub monitoring_active: bool,
    pub open_positions: usize,
    pub pending_signals: usize,
    pub check_interval_secs: u64,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub cycles_completed: u64,
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub opened: usize,
    pub rejected: usize,
    pub deferred: usize,
    pub closed: Vec<(SignalId, ExitReason)>,
    pub externally_closed: usize,
    pub errors: usize,
    /// Signals still open after the cycle.
    pub open_positions: usize,
}

enum Promotion {
    Opened,
    Rejected,
    Deferred,
}

enum Evaluation {
    Held,
    Skipped,
    ExternallyClosed,
    Closed(ExitReason),
}

// ============================================================================
// Monitor
// ============================================================================

pub struct Monitor {
    manager: Arc<PositionManager>,
    config: MonitorConfig,
    sizing: SizingConfig,
    trailing: Mutex<HashMap<SignalId, TrailingState>>,
    wake: Notify,
    running: AtomicBool,
    cycles: AtomicU64,
    last_heartbeat: Mutex<Option<DateTime<Utc>>>,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl Monitor {
    pub fn new(manager: Arc<PositionManager>, config: MonitorConfig, sizing: SizingConfig) -> Self {
        Self {
            manager,
            config,
            sizing,
            trailing: Mutex::new(HashMap::new()),
            wake: Notify::new(),
            running: AtomicBool::new(false),
            cycles: AtomicU64::new(0),
            last_heartbeat: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run a cycle now instead of waiting for the next tick.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Trailing state for `id`, if the signal has been evaluated.
    pub fn trailing_state(&self, id: SignalId) -> Option<TrailingState> {
        self.trailing.lock().get(&id).copied()
    }

    /// Spawn the loop.
    pub fn start(self: &Arc<Self>) -> EngineResult<()> {
        let mut task = self.task.lock();
        if task.is_some() {
            return Err(EngineError::AlreadyRunning);
        }

        let token = CancellationToken::new();
        let monitor = Arc::clone(self);
        let loop_token = token.clone();
        self.running.store(true, Ordering::SeqCst);
        let handle = tokio::spawn(async move {
            monitor.run(loop_token).await;
        });
        *task = Some((token, handle));
        Ok(())
    }

    /// Cancel the loop and wait for the in-flight cycle, bounded by the
    /// configured shutdown timeout.
    pub async fn stop(&self) {
        let Some((token, mut handle)) = self.task.lock().take() else {
            return;
        };
        token.cancel();

        match tokio::time::timeout(self.config.shutdown_timeout(), &mut handle).await {
            Ok(Ok(())) => info!("Monitor stopped"),
            Ok(Err(e)) => error!(error = %e, "Monitor task failed"),
            Err(_) => {
                warn!(
                    timeout_secs = self.config.shutdown_timeout_secs,
                    "Monitor did not stop in time, aborting"
                );
                handle.abort();
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }

    async fn run(&self, token: CancellationToken) {
        info!(
            check_interval_secs = self.config.check_interval_secs,
            trail_percent = %self.config.trail_percent,
            risk_percentage = %self.sizing.risk_percentage,
            "Monitor started"
        );

        let mut ticker = tokio::time::interval(self.config.check_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last_heartbeat: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
                _ = self.wake.notified() => debug!("Monitor woken"),
            }

            let summary = self.run_cycle().await;
            self.heartbeat(&summary, &mut last_heartbeat);
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Monitor loop exited");
    }

    /// Log a heartbeat while idle. Open positions already produce cycle logs,
    /// so the heartbeat only fires when none are open and the interval has
    /// passed since the last one.
    fn heartbeat(&self, summary: &CycleSummary, last: &mut Option<Instant>) -> bool {
        if summary.open_positions > 0 {
            return false;
        }
        let due = last.map_or(true, |t| t.elapsed() >= self.config.heartbeat_interval());
        if !due {
            return false;
        }

        *last = Some(Instant::now());
        *self.last_heartbeat.lock() = Some(Utc::now());
        info!(
            cycles = self.cycles.load(Ordering::Relaxed),
            errors = summary.errors,
            "Monitor heartbeat"
        );
        true
    }

    /// Run one pending pass and one open pass.
    pub async fn run_cycle(&self) -> CycleSummary {
        let started = std::time::Instant::now();
        let mut summary = CycleSummary::default();

        self.pending_pass(&mut summary).await;
        self.open_pass(&mut summary).await;

        self.cycles.fetch_add(1, Ordering::Relaxed);
        Metrics::cycle_duration(started.elapsed().as_secs_f64() * 1000.0);
        summary
    }

    // ------------------------------------------------------------------
    // Pending pass
    // ------------------------------------------------------------------

    async fn pending_pass(&self, summary: &mut CycleSummary) {
        let pending = match self.manager.store().by_status(SignalStatus::Pending) {
            Ok(pending) => pending,
            Err(e) => {
                Metrics::cycle_error("pending_query");
                error!(error = %e, "Failed to load pending signals");
                summary.errors += 1;
                return;
            }
        };

        for signal in &pending {
            match self.promote(signal).await {
                Ok(Promotion::Opened) => summary.opened += 1,
                Ok(Promotion::Rejected) => summary.rejected += 1,
                Ok(Promotion::Deferred) => summary.deferred += 1,
                Err(e) => {
                    Metrics::cycle_error("open");
                    error!(
                        signal_id = %signal.id,
                        symbol = %signal.symbol,
                        error = %e,
                        "Failed to open position, will retry next cycle"
                    );
                    summary.errors += 1;
                }
            }
        }
    }

    async fn promote(&self, signal: &Signal) -> EngineResult<Promotion> {
        let direction = signal.direction();
        let symbol = signal.symbol.as_str();
        let existing = self
            .manager
            .store()
            .by_asset(symbol, Some(SignalStatus::Open))?;

        if let Some(same) = existing.iter().find(|s| s.direction() == direction) {
            Metrics::signal_rejected("same_direction_open");
            info!(
                signal_id = %signal.id,
                existing_id = %same.id,
                symbol,
                %direction,
                "Open position in the same direction, skipping signal"
            );
            return Ok(Promotion::Rejected);
        }

        for opposite in &existing {
            info!(
                signal_id = %signal.id,
                existing_id = %opposite.id,
                symbol,
                "Closing opposite position before reversing"
            );
            self.manager.close(opposite.id, symbol).await?;
            self.trailing.lock().remove(&opposite.id);
            Metrics::position_closed(symbol, "reversed");
        }

        let Some(price) = self.manager.gateway().current_price(symbol).await else {
            debug!(signal_id = %signal.id, symbol, "No price, deferring signal");
            return Ok(Promotion::Deferred);
        };

        let sized = size_position(
            self.manager.gateway().as_ref(),
            symbol,
            price,
            self.sizing.risk_percentage,
        )
        .await?;

        self.manager
            .open(signal.id, symbol, direction, sized.size, price, ENTRY_LEVERAGE)
            .await?;
        Ok(Promotion::Opened)
    }

    // ------------------------------------------------------------------
    // Open pass
    // ------------------------------------------------------------------

    async fn open_pass(&self, summary: &mut CycleSummary) {
        let open = match self.manager.store().by_status(SignalStatus::Open) {
            Ok(open) => open,
            Err(e) => {
                Metrics::cycle_error("open_query");
                error!(error = %e, "Failed to load open signals");
                summary.errors += 1;
                return;
            }
        };

        let open_ids: HashSet<SignalId> = open.iter().map(|s| s.id).collect();
        self.trailing.lock().retain(|id, _| open_ids.contains(id));

        for signal in &open {
            match self.evaluate(signal).await {
                Ok(Evaluation::Held | Evaluation::Skipped) => {}
                Ok(Evaluation::ExternallyClosed) => summary.externally_closed += 1,
                Ok(Evaluation::Closed(reason)) => summary.closed.push((signal.id, reason)),
                Err(e) => {
                    Metrics::cycle_error("evaluate");
                    error!(
                        signal_id = %signal.id,
                        symbol = %signal.symbol,
                        error = %e,
                        "Failed to evaluate open position"
                    );
                    summary.errors += 1;
                }
            }
        }

        let pending = self
            .manager
            .store()
            .by_status(SignalStatus::Pending)
            .map(|p| p.len())
            .unwrap_or_default();
        let still_open = open.len() - summary.closed.len() - summary.externally_closed;
        summary.open_positions = still_open;
        Metrics::signal_counts(pending, still_open);
    }

    async fn evaluate(&self, signal: &Signal) -> EngineResult<Evaluation> {
        let symbol = signal.symbol.as_str();
        let gateway = self.manager.gateway();

        let Some(price) = gateway.current_price(symbol).await else {
            debug!(signal_id = %signal.id, symbol, "No price, skipping evaluation");
            return Ok(Evaluation::Skipped);
        };

        let live = gateway.position(symbol).await?;
        if !live.as_ref().is_some_and(|p| p.is_open()) {
            warn!(
                signal_id = %signal.id,
                symbol,
                exit_price = %price,
                "Position closed outside the engine, marking signal closed"
            );
            if self.manager.mark_closed(signal.id, Some(price))? {
                Metrics::position_closed(symbol, "external");
            }
            self.trailing.lock().remove(&signal.id);
            return Ok(Evaluation::ExternallyClosed);
        }

        let reason = {
            let mut trailing = self.trailing.lock();
            let state = trailing.entry(signal.id).or_default();
            let was_armed = state.is_armed();
            let reason = evaluate_exit(
                &signal.data,
                state,
                price,
                Utc::now(),
                self.config.trail_percent,
            );
            if !was_armed && state.is_armed() {
                info!(signal_id = %signal.id, symbol, %price, "Trailing stop armed");
            }
            reason
        };

        let Some(reason) = reason else {
            return Ok(Evaluation::Held);
        };

        info!(signal_id = %signal.id, symbol, %price, %reason, "Exit condition met");
        self.manager.close(signal.id, symbol).await?;
        self.trailing.lock().remove(&signal.id);
        Metrics::position_closed(symbol, reason.as_str());
        Ok(Evaluation::Closed(reason))
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    pub fn status(&self) -> EngineResult<MonitorStatus> {
        let store = self.manager.store();
        Ok(MonitorStatus {
            monitoring_active: self.is_running(),
            open_positions: store.by_status(SignalStatus::Open)?.len(),
            pending_signals: store.by_status(SignalStatus::Pending)?.len(),
            check_interval_secs: self.config.check_interval_secs,
            last_heartbeat: *self.last_heartbeat.lock(),
            cycles_completed: self.cycles.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use rust_decimal_macros::dec;
    use sigbot_core::{Direction, Price, SignalData};
    use sigbot_exchange::MockGateway;
    use sigbot_position::RetryPolicy;
    use sigbot_store::{MemorySignalStore, SignalStore};

    struct Harness {
        gateway: Arc<MockGateway>,
        store: Arc<MemorySignalStore>,
        monitor: Arc<Monitor>,
    }

    fn harness() -> Harness {
        let gateway = Arc::new(MockGateway::new());
        let store = Arc::new(MemorySignalStore::new());
        let manager = Arc::new(PositionManager::new(
            gateway.clone(),
            store.clone(),
            RetryPolicy::new(3, Duration::ZERO),
        ));
        let monitor = Arc::new(Monitor::new(
            manager,
            MonitorConfig::default(),
            SizingConfig::default(),
        ));
        Harness {
            gateway,
            store,
            monitor,
        }
    }

    fn submit(h: &Harness, symbol: &str, direction: Direction) -> SignalId {
        let (tp1, tp2, sl) = match direction {
            Direction::Buy => (dec!(110), dec!(130), dec!(90)),
            Direction::Sell => (dec!(90), dec!(70), dec!(110)),
        };
        h.store
            .create(SignalData {
                direction,
                symbol: symbol.to_string(),
                tp1: Price::new(tp1),
                tp2: Price::new(tp2),
                sl: Price::new(sl),
                expires_at: Utc::now() + ChronoDuration::hours(1),
                reference_price: Price::new(dec!(100)),
            })
            .unwrap()
            .id
    }

    fn status_of(h: &Harness, id: SignalId) -> SignalStatus {
        h.store.get(id).unwrap().status
    }

    #[tokio::test]
    async fn test_pending_signal_opens_with_sized_order() {
        let h = harness();
        h.gateway.set_price("ETH", dec!(100));
        h.gateway.set_spec("ETH", 1, 2);
        let id = submit(&h, "ETH", Direction::Buy);

        let summary = h.monitor.run_cycle().await;

        assert_eq!(summary.opened, 1);
        assert_eq!(status_of(&h, id), SignalStatus::Open);
        // $1000 * 10% * 2x / $100
        let order = &h.gateway.orders()[0];
        assert_eq!(order.size.inner(), dec!(2));
        assert_eq!(order.leverage, Some(ENTRY_LEVERAGE));
    }

    #[tokio::test]
    async fn test_missing_price_defers_pending_signal() {
        let h = harness();
        let id = submit(&h, "ETH", Direction::Buy);

        let summary = h.monitor.run_cycle().await;

        assert_eq!(summary.deferred, 1);
        assert_eq!(status_of(&h, id), SignalStatus::Pending);
        assert_eq!(h.gateway.order_count(), 0);
    }

    #[tokio::test]
    async fn test_same_direction_signal_rejected_without_orders() {
        let h = harness();
        h.gateway.set_price("ETH", dec!(100));
        let first = submit(&h, "ETH", Direction::Buy);
        h.monitor.run_cycle().await;
        let orders = h.gateway.order_count();

        let second = submit(&h, "ETH", Direction::Buy);
        let summary = h.monitor.run_cycle().await;

        assert_eq!(summary.rejected, 1);
        assert_eq!(status_of(&h, first), SignalStatus::Open);
        assert_eq!(status_of(&h, second), SignalStatus::Pending);
        assert_eq!(h.gateway.order_count(), orders);
    }

    #[tokio::test]
    async fn test_opposite_direction_reverses() {
        let h = harness();
        h.gateway.set_price("ETH", dec!(100));
        let long = submit(&h, "ETH", Direction::Buy);
        h.monitor.run_cycle().await;

        let short = submit(&h, "ETH", Direction::Sell);
        let summary = h.monitor.run_cycle().await;

        assert_eq!(summary.opened, 1);
        assert_eq!(status_of(&h, long), SignalStatus::Closed);
        assert_eq!(status_of(&h, short), SignalStatus::Open);

        let orders = h.gateway.orders();
        assert_eq!(orders.len(), 3);
        assert!(orders[1].reduce_only && !orders[1].is_buy);
        assert!(!orders[2].reduce_only && !orders[2].is_buy);
        assert!(h.gateway.position_size("ETH") < Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_failed_reversal_close_keeps_new_signal_pending() {
        let h = harness();
        h.gateway.set_price("ETH", dec!(100));
        let long = submit(&h, "ETH", Direction::Buy);
        h.monitor.run_cycle().await;

        let short = submit(&h, "ETH", Direction::Sell);
        h.gateway.push_rejections(3);
        let summary = h.monitor.run_cycle().await;

        assert_eq!(summary.errors, 1);
        assert_eq!(status_of(&h, long), SignalStatus::Open);
        assert_eq!(status_of(&h, short), SignalStatus::Pending);
    }

    #[tokio::test]
    async fn test_trailing_exit_over_cycles() {
        let h = harness();
        h.gateway.set_price("ETH", dec!(100));
        let id = submit(&h, "ETH", Direction::Buy);
        h.monitor.run_cycle().await;

        for price in [dec!(108), dec!(111), dec!(120)] {
            h.gateway.set_price("ETH", price);
            let summary = h.monitor.run_cycle().await;
            assert!(summary.closed.is_empty(), "closed early at {price}");
        }
        assert_eq!(
            h.monitor.trailing_state(id).and_then(|s| s.extreme()),
            Some(Price::new(dec!(120)))
        );

        h.gateway.set_price("ETH", dec!(117.5));
        let summary = h.monitor.run_cycle().await;

        assert_eq!(summary.closed, vec![(id, ExitReason::TrailingStop)]);
        assert_eq!(status_of(&h, id), SignalStatus::Closed);
        assert!(h.monitor.trailing_state(id).is_none());
        assert_eq!(h.gateway.position_size("ETH"), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_externally_closed_position_marked_without_order() {
        let h = harness();
        h.gateway.set_price("ETH", dec!(100));
        let id = submit(&h, "ETH", Direction::Buy);
        h.monitor.run_cycle().await;
        let orders = h.gateway.order_count();

        h.gateway.set_position("ETH", Decimal::ZERO);
        h.gateway.set_price("ETH", dec!(95));
        let summary = h.monitor.run_cycle().await;

        assert_eq!(summary.externally_closed, 1);
        assert_eq!(h.gateway.order_count(), orders);
        let signal = h.store.get(id).unwrap();
        assert_eq!(signal.status, SignalStatus::Closed);
        assert_eq!(
            signal.position.unwrap().exit_price,
            Some(Price::new(dec!(95)))
        );
    }

    #[tokio::test]
    async fn test_position_query_failure_is_not_flat() {
        let h = harness();
        h.gateway.set_price("ETH", dec!(100));
        let id = submit(&h, "ETH", Direction::Buy);
        h.monitor.run_cycle().await;

        h.gateway.set_positions_failing(true);
        let summary = h.monitor.run_cycle().await;

        assert_eq!(summary.errors, 1);
        assert_eq!(status_of(&h, id), SignalStatus::Open);
    }

    #[tokio::test]
    async fn test_one_failing_signal_does_not_stop_others() {
        let h = harness();
        h.gateway.set_price("ETH", dec!(100));
        h.gateway.set_price("BTC", dec!(100));
        let eth = submit(&h, "ETH", Direction::Buy);
        let btc = submit(&h, "BTC", Direction::Buy);
        h.monitor.run_cycle().await;

        // ETH price vanishes and BTC hits its stop.
        h.gateway.clear_price("ETH");
        h.gateway.set_price("BTC", dec!(85));
        let summary = h.monitor.run_cycle().await;

        assert_eq!(summary.closed, vec![(btc, ExitReason::StopLoss)]);
        assert_eq!(status_of(&h, eth), SignalStatus::Open);
    }

    #[tokio::test]
    async fn test_status_counts() {
        let h = harness();
        h.gateway.set_price("ETH", dec!(100));
        submit(&h, "ETH", Direction::Buy);
        submit(&h, "SOL", Direction::Sell);
        h.monitor.run_cycle().await;

        let status = h.monitor.status().unwrap();
        assert!(!status.monitoring_active);
        assert_eq!(status.open_positions, 1);
        assert_eq!(status.pending_signals, 1);
        assert_eq!(status.check_interval_secs, 5);
        assert_eq!(status.cycles_completed, 1);
    }

    #[tokio::test]
    async fn test_start_wake_and_stop() {
        let h = harness();
        h.gateway.set_price("ETH", dec!(100));
        h.monitor.start().unwrap();
        assert!(matches!(h.monitor.start(), Err(EngineError::AlreadyRunning)));

        let id = submit(&h, "ETH", Direction::Buy);
        h.monitor.wake();
        for _ in 0..50 {
            if status_of(&h, id) == SignalStatus::Open {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status_of(&h, id), SignalStatus::Open);

        h.monitor.stop().await;
        assert!(!h.monitor.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_only_without_open_positions() {
        let h = harness();
        let mut last = None;
        let busy = CycleSummary {
            open_positions: 2,
            ..Default::default()
        };
        let idle = CycleSummary::default();

        assert!(!h.monitor.heartbeat(&busy, &mut last));
        assert!(h.monitor.status().unwrap().last_heartbeat.is_none());

        assert!(h.monitor.heartbeat(&idle, &mut last));
        assert!(h.monitor.status().unwrap().last_heartbeat.is_some());
        assert!(!h.monitor.heartbeat(&idle, &mut last));

        tokio::time::advance(h.monitor.config().heartbeat_interval()).await;
        assert!(!h.monitor.heartbeat(&busy, &mut last));
        assert!(h.monitor.heartbeat(&idle, &mut last));
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_loop_skips_heartbeat_while_positions_open() {
        let h = harness();
        h.gateway.set_price("ETH", dec!(100));
        submit(&h, "ETH", Direction::Buy);
        let summary = h.monitor.run_cycle().await;
        assert_eq!(summary.open_positions, 1);

        h.monitor.start().unwrap();
        tokio::time::sleep(Duration::from_secs(130)).await;
        let status = h.monitor.status().unwrap();
        assert!(status.cycles_completed > 2);
        assert!(status.last_heartbeat.is_none());

        // Venue goes flat; the next cycle closes the signal and is idle.
        h.gateway.set_position("ETH", Decimal::ZERO);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(h.monitor.status().unwrap().last_heartbeat.is_some());

        h.monitor.stop().await;
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: MonitorConfig = toml::from_str("check_interval_secs = 2").unwrap();
        assert_eq!(config.check_interval_secs, 2);
        assert_eq!(config.trail_percent, dec!(0.02));
        assert_eq!(config.heartbeat_secs, 60);
        assert_eq!(config.shutdown_timeout_secs, 10);
    }
}
