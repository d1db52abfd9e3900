//! Application configuration.
//!
//! TOML file with per-section defaults, then environment overrides for
//! secrets and tunables.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sigbot_api::ApiConfig;
use sigbot_engine::{MonitorConfig, SizingConfig};
use sigbot_exchange::{GatewayConfig, KeySource};
use sigbot_position::RetryPolicy;

use crate::error::{AppError, AppResult};

/// Default config path, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment variable holding the hex trading key.
pub const TRADING_KEY_ENV: &str = "SIGBOT_TRADING_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub exchange: GatewayConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub keys: KeyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON Lines journal. `None` keeps signals in memory only.
    #[serde(default = "default_journal_path")]
    pub journal_path: Option<PathBuf>,
}

fn default_journal_path() -> Option<PathBuf> {
    Some(PathBuf::from("data/signals.jsonl"))
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            journal_path: default_journal_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Key file (hex, recommend 0600). Used when `SIGBOT_TRADING_KEY` is unset.
    #[serde(default)]
    pub trading_key_file: Option<PathBuf>,
}

impl AppConfig {
    /// Load from `path`, falling back to defaults when the file is absent,
    /// then apply environment overrides.
    pub fn load(path: &str) -> AppResult<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> AppResult<()> {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(address) = lookup("VAULT_ADDRESS") {
            self.exchange.account_address = Some(address.trim().to_string());
        }
        if lookup("TESTNET").is_some_and(|v| v.trim().eq_ignore_ascii_case("true")) {
            self.exchange.use_testnet();
        }
        if let Some(token) = lookup("SIGNAL_AUTH_TOKEN") {
            self.api.auth_token = token;
        }
        if let Some(raw) = lookup("TRAIL_PERCENT") {
            self.monitor.trail_percent = parse_decimal("TRAIL_PERCENT", &raw)?;
        }
        if let Some(raw) = lookup("VAULT_RISK_PERCENTAGE") {
            self.sizing.risk_percentage = parse_decimal("VAULT_RISK_PERCENTAGE", &raw)?;
        }
        self.validate()
    }

    fn validate(&self) -> AppResult<()> {
        if self.monitor.trail_percent <= Decimal::ZERO || self.monitor.trail_percent >= Decimal::ONE {
            return Err(AppError::Config(format!(
                "trail_percent must be in (0, 1), got {}",
                self.monitor.trail_percent
            )));
        }
        if self.sizing.risk_percentage <= Decimal::ZERO
            || self.sizing.risk_percentage > Decimal::ONE_HUNDRED
        {
            return Err(AppError::Config(format!(
                "risk_percentage must be in (0, 100], got {}",
                self.sizing.risk_percentage
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::Config("retry.max_attempts must be at least 1".into()));
        }
        Ok(())
    }

    /// Where to load the trading key from, if anywhere.
    pub fn key_source(&self, env_key_present: bool) -> Option<KeySource> {
        if env_key_present {
            return Some(KeySource::EnvVar {
                var_name: TRADING_KEY_ENV.to_string(),
            });
        }
        self.keys
            .trading_key_file
            .clone()
            .map(|path| KeySource::File { path })
    }
}

fn parse_decimal(key: &str, raw: &str) -> AppResult<Decimal> {
    Decimal::from_str(raw.trim()).map_err(|e| AppError::Config(format!("{key}={raw:?}: {e}")))
}
