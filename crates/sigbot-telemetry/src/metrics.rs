//! Prometheus metrics for the lifecycle engine.
//!
//! # Panics
//!
//! Metric registration unwraps: a failure means duplicate metric names, a
//! startup bug. It can only happen on first access of each static.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, register_int_gauge,
    register_int_gauge_vec, Counter, CounterVec, Encoder, Histogram, IntGauge, IntGaugeVec,
    TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Signals accepted by submit-signal.
pub static SIGNALS_RECEIVED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigbot_signals_received_total",
        "Signals accepted for processing",
        &["symbol", "direction"]
    )
    .unwrap()
});

/// Pending signals rejected by the same-asset conflict policy.
pub static SIGNALS_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigbot_signals_rejected_total",
        "Pending signals not promoted",
        &["reason"]
    )
    .unwrap()
});

/// Positions opened.
pub static POSITIONS_OPENED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigbot_positions_opened_total",
        "Positions opened",
        &["symbol", "direction"]
    )
    .unwrap()
});

/// Positions closed, by exit reason.
pub static POSITIONS_CLOSED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigbot_positions_closed_total",
        "Positions closed",
        &["symbol", "reason"]
    )
    .unwrap()
});

/// Order placement attempts.
/// Labels: operation (open/close), outcome (filled/rejected/unknown)
pub static ORDER_ATTEMPTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigbot_order_attempts_total",
        "Order placement attempts",
        &["operation", "outcome"]
    )
    .unwrap()
});

/// Fills whose store write failed.
pub static PERSIST_AFTER_FILL_FAILURES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "sigbot_persist_after_fill_failures_total",
        "Exchange fills whose local record update failed"
    )
    .unwrap()
});

/// Signals by status.
pub static SIGNALS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "sigbot_signals",
        "Signals currently in each status",
        &["status"]
    )
    .unwrap()
});

/// Monitor cycle duration in milliseconds.
pub static CYCLE_DURATION_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "sigbot_cycle_duration_ms",
        "Monitor cycle duration in milliseconds",
        vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap()
});

/// Per-signal errors isolated by the monitor.
pub static CYCLE_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigbot_cycle_errors_total",
        "Errors while processing a single signal in a monitor cycle",
        &["phase"]
    )
    .unwrap()
});

/// Untracked live positions found by the last reconciliation.
pub static RECONCILE_DISCREPANCIES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "sigbot_reconcile_discrepancies",
        "Discrepancies reported by the last reconciliation"
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    pub fn signal_received(symbol: &str, direction: &str) {
        SIGNALS_RECEIVED_TOTAL
            .with_label_values(&[symbol, direction])
            .inc();
    }

    pub fn signal_rejected(reason: &str) {
        SIGNALS_REJECTED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn position_opened(symbol: &str, direction: &str) {
        POSITIONS_OPENED_TOTAL
            .with_label_values(&[symbol, direction])
            .inc();
    }

    pub fn position_closed(symbol: &str, reason: &str) {
        POSITIONS_CLOSED_TOTAL
            .with_label_values(&[symbol, reason])
            .inc();
    }

    pub fn order_attempt(operation: &str, outcome: &str) {
        ORDER_ATTEMPTS_TOTAL
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn persist_after_fill_failure() {
        PERSIST_AFTER_FILL_FAILURES_TOTAL.inc();
    }

    pub fn signal_counts(pending: usize, open: usize) {
        SIGNALS_BY_STATUS
            .with_label_values(&["pending"])
            .set(pending as i64);
        SIGNALS_BY_STATUS
            .with_label_values(&["open"])
            .set(open as i64);
    }

    pub fn cycle_duration(duration_ms: f64) {
        CYCLE_DURATION_MS.observe(duration_ms);
    }

    pub fn cycle_error(phase: &str) {
        CYCLE_ERRORS_TOTAL.with_label_values(&[phase]).inc();
    }

    pub fn reconcile_discrepancies(count: usize) {
        RECONCILE_DISCREPANCIES.set(count as i64);
    }
}

/// Encode the default registry in the Prometheus text format.
pub fn render_metrics() -> TelemetryResult<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_show_up_in_rendered_output() {
        Metrics::signal_received("ETH", "buy");
        Metrics::order_attempt("open", "filled");
        Metrics::signal_counts(2, 1);

        let text = render_metrics().unwrap();
        assert!(text.contains("sigbot_signals_received_total"));
        assert!(text.contains("sigbot_order_attempts_total"));
        assert!(text.contains(r#"sigbot_signals{status="pending"} 2"#));
    }

    #[test]
    fn test_close_reason_labels() {
        Metrics::position_closed("BTC", "stop_loss");
        let value = POSITIONS_CLOSED_TOTAL
            .with_label_values(&["BTC", "stop_loss"])
            .get();
        assert!(value >= 1.0);
    }
}
