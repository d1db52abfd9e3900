//! End-to-end lifecycle tests against the mock venue.
//!
//! - Signal intake through exit and journal replay
//! - Expiry override
//! - Startup reconciliation after a restart

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sigbot_core::{Price, SignalStatus};
use sigbot_engine::{Engine, ExitReason, InboundSignal, Monitor, MonitorConfig, SizingConfig};
use sigbot_exchange::MockGateway;
use sigbot_position::{PositionManager, RetryPolicy};
use sigbot_store::{MemorySignalStore, SignalStore};
use tempfile::TempDir;

fn engine(gateway: Arc<MockGateway>, store: Arc<MemorySignalStore>) -> Engine {
    let manager = Arc::new(PositionManager::new(
        gateway,
        store,
        RetryPolicy::new(3, Duration::ZERO),
    ));
    let monitor = Arc::new(Monitor::new(
        manager.clone(),
        MonitorConfig::default(),
        SizingConfig::default(),
    ));
    Engine::new(manager, monitor)
}

fn buy(symbol: &str, expires_in: chrono::Duration) -> InboundSignal {
    InboundSignal {
        direction: "buy".to_string(),
        symbol: symbol.to_string(),
        tp1: dec!(110),
        tp2: dec!(130),
        sl: dec!(90),
        expires_at: Utc::now() + expires_in,
        reference_price: None,
    }
}

#[tokio::test]
async fn test_signal_to_take_profit_survives_restart() {
    let dir = TempDir::new().unwrap();
    let journal = dir.path().join("signals.jsonl");
    let gateway = Arc::new(MockGateway::new());
    gateway.set_price("ETH", dec!(100));
    gateway.set_spec("ETH", 1, 2);

    let signal_id = {
        let store = Arc::new(MemorySignalStore::open(&journal).unwrap());
        let engine = engine(gateway.clone(), store.clone());

        let receipt = engine
            .submit_signal(buy("eth", chrono::Duration::hours(4)))
            .await
            .unwrap();
        assert_eq!(receipt.reference_price, Price::new(dec!(100)));

        let summary = engine.monitor().run_cycle().await;
        assert_eq!(summary.opened, 1);
        assert_eq!(gateway.position_size("ETH"), dec!(2));

        gateway.set_price("ETH", dec!(131));
        let summary = engine.monitor().run_cycle().await;
        assert_eq!(
            summary.closed,
            vec![(receipt.signal_id, ExitReason::TakeProfit2)]
        );
        assert_eq!(gateway.position_size("ETH"), Decimal::ZERO);
        receipt.signal_id
    };

    let reopened = MemorySignalStore::open(&journal).unwrap();
    let signal = reopened.get(signal_id).unwrap();
    assert_eq!(signal.status, SignalStatus::Closed);
    let details = signal.position.unwrap();
    assert_eq!(details.entry_price, Price::new(dec!(100)));
    assert_eq!(details.exit_price, Some(Price::new(dec!(131))));
    assert_eq!(details.pnl, Some(dec!(62)));
}

#[tokio::test]
async fn test_expired_signal_closes_on_next_cycle() {
    let gateway = Arc::new(MockGateway::new());
    let store = Arc::new(MemorySignalStore::new());
    gateway.set_price("BTC", dec!(100));
    let engine = engine(gateway.clone(), store.clone());

    let receipt = engine
        .submit_signal(buy("BTC", chrono::Duration::milliseconds(200)))
        .await
        .unwrap();
    engine.monitor().run_cycle().await;
    // Armed trailing state does not protect an expired position.
    gateway.set_price("BTC", dec!(112));
    engine.monitor().run_cycle().await;
    assert_eq!(store.get(receipt.signal_id).unwrap().status, SignalStatus::Open);

    tokio::time::sleep(Duration::from_millis(250)).await;
    let summary = engine.monitor().run_cycle().await;

    assert_eq!(summary.closed, vec![(receipt.signal_id, ExitReason::Expired)]);
    assert_eq!(store.get(receipt.signal_id).unwrap().status, SignalStatus::Closed);
}

#[tokio::test]
async fn test_startup_reconcile_after_liquidation() {
    let dir = TempDir::new().unwrap();
    let journal = dir.path().join("state").join("signals.jsonl");
    let gateway = Arc::new(MockGateway::new());
    gateway.set_price("SOL", dec!(100));

    let signal_id = {
        let store = Arc::new(MemorySignalStore::open(&journal).unwrap());
        let engine = engine(gateway.clone(), store);
        let receipt = engine
            .submit_signal(buy("SOL", chrono::Duration::hours(1)))
            .await
            .unwrap();
        engine.monitor().run_cycle().await;
        receipt.signal_id
    };

    // Liquidated while the process was down; an unrelated manual position exists.
    gateway.set_position("SOL", Decimal::ZERO);
    gateway.set_position("ARB", dec!(50));
    gateway.set_price("SOL", dec!(60));

    let store = Arc::new(MemorySignalStore::open(&journal).unwrap());
    let engine = engine(gateway.clone(), store.clone());
    let orders_before = gateway.order_count();

    let report = engine.reconcile().await.unwrap();

    assert_eq!(report.database_positions, 1);
    assert_eq!(report.closed_in_db, 1);
    assert_eq!(report.discrepancies.len(), 1);
    assert_eq!(gateway.order_count(), orders_before);
    assert_eq!(gateway.position_size("ARB"), dec!(50));

    let signal = store.get(signal_id).unwrap();
    assert_eq!(signal.status, SignalStatus::Closed);
    assert_eq!(
        signal.position.unwrap().exit_price,
        Some(Price::new(dec!(60)))
    );
}

#[tokio::test]
async fn test_manual_close_then_monitor_is_idempotent() {
    let gateway = Arc::new(MockGateway::new());
    let store = Arc::new(MemorySignalStore::new());
    gateway.set_price("ETH", dec!(100));
    let engine = engine(gateway.clone(), store.clone());

    let receipt = engine
        .submit_signal(buy("ETH", chrono::Duration::hours(1)))
        .await
        .unwrap();
    engine.monitor().run_cycle().await;

    let closed = engine.close_by_symbol("eth").await.unwrap();
    assert!(closed.placed_order);
    let orders = gateway.order_count();

    // Stop-loss level on the next tick must not place a second order.
    gateway.set_price("ETH", dec!(80));
    let summary = engine.monitor().run_cycle().await;
    assert!(summary.closed.is_empty());
    assert_eq!(gateway.order_count(), orders);

    // No open signal remains for the symbol.
    assert!(engine.close_by_symbol("ETH").await.is_err());
    assert_eq!(store.get(receipt.signal_id).unwrap().status, SignalStatus::Closed);
}
