//! Application wiring and lifecycle.

use std::sync::Arc;

use sigbot_engine::{Engine, Monitor};
use sigbot_exchange::{DynGateway, HyperliquidGateway, KeyManager};
use sigbot_position::PositionManager;
use sigbot_store::{DynStore, MemorySignalStore};
use tracing::{error, info, warn};

use crate::config::{AppConfig, TRADING_KEY_ENV};
use crate::error::AppResult;

pub struct Application {
    config: AppConfig,
    monitor: Arc<Monitor>,
    engine: Arc<Engine>,
}

impl Application {
    /// Build against the live venue and the configured store.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let key_source = config.key_source(std::env::var(TRADING_KEY_ENV).is_ok());
        let key_manager = Arc::new(KeyManager::load(key_source, None)?);
        if let Some(address) = key_manager.trading_address() {
            info!(%address, "Trading key loaded");
        }

        let gateway: DynGateway = Arc::new(HyperliquidGateway::new(&config.exchange, key_manager)?);

        let store: DynStore = match &config.store.journal_path {
            Some(path) => {
                let store = MemorySignalStore::open(path)?;
                info!(path = %path.display(), signals = store.len(), "Signal journal loaded");
                Arc::new(store)
            }
            None => {
                warn!("No journal configured, signals will not survive a restart");
                Arc::new(MemorySignalStore::new())
            }
        };

        Ok(Self::with_components(config, gateway, store))
    }

    /// Build from already constructed gateway and store.
    pub fn with_components(config: AppConfig, gateway: DynGateway, store: DynStore) -> Self {
        let manager = Arc::new(PositionManager::new(gateway, store, config.retry));
        let monitor = Arc::new(Monitor::new(
            manager.clone(),
            config.monitor.clone(),
            config.sizing.clone(),
        ));
        let engine = Arc::new(Engine::new(manager, monitor.clone()));
        Self {
            config,
            monitor,
            engine,
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Reconcile the store against the venue before trading starts.
    ///
    /// A failed reconciliation is logged; the monitor's per-cycle checks
    /// still catch external closes.
    pub async fn run_preflight(&self) -> AppResult<()> {
        match self.engine.reconcile().await {
            Ok(report) => {
                for discrepancy in &report.discrepancies {
                    warn!(%discrepancy, "Startup reconciliation discrepancy");
                }
                info!(
                    database_positions = report.database_positions,
                    actual_positions = report.actual_positions,
                    closed_in_db = report.closed_in_db,
                    "Startup reconciliation complete"
                );
            }
            Err(e) => error!(error = %e, "Startup reconciliation failed"),
        }
        Ok(())
    }

    /// Run the monitor and the API until ctrl-c.
    pub async fn run(self) -> AppResult<()> {
        self.monitor.start()?;

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        };

        let served =
            sigbot_api::run_server(self.engine.clone(), self.config.api.clone(), shutdown).await;

        info!("Stopping monitor");
        self.monitor.stop().await;
        served?;
        info!("Shutdown complete");
        Ok(())
    }
}
