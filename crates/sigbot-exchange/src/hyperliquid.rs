//! Hyperliquid REST adapter implementing [`ExchangeGateway`].
//!
//! Reads go through the info endpoint; orders and leverage updates are signed
//! L1 actions posted to `/exchange`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use chrono::Utc;
use dashmap::DashMap;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sigbot_core::{AssetSpec, Price, Size};
use tracing::{debug, info, warn};

use crate::error::{ExchangeError, ExchangeResult};
use crate::gateway::{
    AccountValue, BoxFuture, ExchangeGateway, LivePosition, OrderKind, OrderOutcome, OrderRequest,
};
use crate::info::InfoClient;
use crate::response::{decode_order_response, is_action_ok};
use crate::signer::{
    Action, ActionSignature, KeyManager, OrderAction, OrderTypeWire, OrderWire, Signer,
    SigningInput, UpdateLeverageAction,
};

pub const MAINNET_API_URL: &str = "https://api.hyperliquid.xyz";
pub const TESTNET_API_URL: &str = "https://api.hyperliquid-testnet.xyz";

// =============================================================================
// Configuration
// =============================================================================

/// Gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// REST base URL (`/info` and `/exchange` are appended).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Mainnet selects phantom agent source "a", testnet "b".
    #[serde(default = "default_is_mainnet")]
    pub is_mainnet: bool,

    /// Price offset applied to immediate orders (0.02 = 2%).
    #[serde(default = "default_slippage")]
    pub slippage: Decimal,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Vault / sub-account traded on behalf of. Defaults to the key's own address.
    #[serde(default)]
    pub account_address: Option<String>,
}

fn default_base_url() -> String {
    MAINNET_API_URL.to_string()
}

fn default_is_mainnet() -> bool {
    true
}

fn default_slippage() -> Decimal {
    Decimal::new(2, 2)
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            is_mainnet: default_is_mainnet(),
            slippage: default_slippage(),
            request_timeout_secs: default_request_timeout_secs(),
            account_address: None,
        }
    }
}

impl GatewayConfig {
    /// Switch to testnet endpoints and signing source.
    pub fn use_testnet(&mut self) {
        self.base_url = TESTNET_API_URL.to_string();
        self.is_mainnet = false;
    }
}

// =============================================================================
// Nonces
// =============================================================================

/// Millisecond nonces, strictly increasing even when called twice in one ms.
#[derive(Debug, Default)]
struct NonceCounter {
    last: AtomicU64,
}

impl NonceCounter {
    fn next(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(prev + 1)
    }
}

/// Body posted to `/exchange`.
#[derive(Debug, Serialize)]
struct ExchangeRequest<'a> {
    action: &'a Action,
    nonce: u64,
    signature: ActionSignature,
    #[serde(rename = "vaultAddress", skip_serializing_if = "Option::is_none")]
    vault_address: Option<&'a str>,
}

/// Limit price for an order: immediate orders cross the book by `slippage`.
pub fn order_limit_price(spec: &AssetSpec, request: &OrderRequest, slippage: Decimal) -> Price {
    let raw = match request.kind {
        OrderKind::Immediate if request.is_buy => request.price.offset_pct(slippage),
        OrderKind::Immediate => request.price.offset_pct(-slippage),
        OrderKind::Resting => request.price,
    };
    spec.round_price(raw)
}

// =============================================================================
// HyperliquidGateway
// =============================================================================

pub struct HyperliquidGateway {
    info: InfoClient,
    http: Client,
    exchange_url: String,
    signer: Option<Signer>,
    /// Address used for account queries.
    user_address: Option<String>,
    /// Vault signed for, when trading on behalf of one.
    vault: Option<(Address, String)>,
    slippage: Decimal,
    specs: DashMap<String, AssetSpec>,
    nonces: NonceCounter,
}

impl HyperliquidGateway {
    /// Build the gateway. Without a trading key it runs observation-only and
    /// every order is rejected.
    pub fn new(config: &GatewayConfig, key_manager: Arc<KeyManager>) -> ExchangeResult<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let base = config.base_url.trim_end_matches('/');
        let info = InfoClient::new(format!("{base}/info"), timeout)?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExchangeError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        let signer = match Signer::new(key_manager, config.is_mainnet) {
            Ok(signer) => Some(signer),
            Err(e) => {
                warn!(error = %e, "No trading key loaded, orders will be rejected");
                None
            }
        };

        let vault = match config.account_address.as_deref() {
            Some(raw) => {
                let address: Address = raw
                    .parse()
                    .map_err(|e| ExchangeError::Parse(format!("account address {raw:?}: {e}")))?;
                Some((address, raw.to_lowercase()))
            }
            None => None,
        };

        let user_address = vault.as_ref().map(|(_, s)| s.clone()).or_else(|| {
            signer
                .as_ref()
                .and_then(|s| s.trading_address())
                .map(|a| a.to_string().to_lowercase())
        });

        info!(
            base_url = %base,
            is_mainnet = config.is_mainnet,
            account = ?user_address,
            "Hyperliquid gateway initialized"
        );

        Ok(Self {
            info,
            http,
            exchange_url: format!("{base}/exchange"),
            signer,
            user_address,
            vault,
            slippage: config.slippage,
            specs: DashMap::new(),
            nonces: NonceCounter::default(),
        })
    }

    fn user(&self) -> ExchangeResult<&str> {
        self.user_address.as_deref().ok_or(ExchangeError::NoAccount)
    }

    /// Reload the asset universe into the spec cache.
    pub async fn refresh_specs(&self) -> ExchangeResult<usize> {
        let meta = self.info.meta().await?;
        let specs = meta.asset_specs();
        let count = specs.len();
        for spec in specs {
            self.specs.insert(spec.name.clone(), spec);
        }
        debug!(count, "Asset specs refreshed");
        Ok(count)
    }

    async fn lookup_spec(&self, symbol: &str) -> ExchangeResult<AssetSpec> {
        if let Some(spec) = self.specs.get(symbol) {
            return Ok(spec.clone());
        }
        self.refresh_specs().await?;
        self.specs
            .get(symbol)
            .map(|s| s.clone())
            .ok_or_else(|| ExchangeError::UnknownAsset(symbol.to_string()))
    }

    /// Sign and post an action, returning the raw JSON answer.
    async fn post_action(&self, action: Action) -> ExchangeResult<Value> {
        let signer = self
            .signer
            .as_ref()
            .ok_or(crate::signer::SignerError::NoTradingKey)?;

        let input = SigningInput {
            action,
            nonce: self.nonces.next(),
            vault_address: self.vault.as_ref().map(|(a, _)| *a),
        };
        let signature = signer.sign_action(&input).await?;

        let body = ExchangeRequest {
            action: &input.action,
            nonce: input.nonce,
            signature,
            vault_address: self.vault.as_ref().map(|(_, s)| s.as_str()),
        };

        let response = self
            .http
            .post(&self.exchange_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExchangeError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Api(format!("HTTP {status}: {text}")));
        }

        response
            .json()
            .await
            .map_err(|e| ExchangeError::Parse(format!("exchange response: {e}")))
    }

    async fn update_leverage(&self, spec: &AssetSpec, leverage: u32) -> ExchangeResult<()> {
        let action = Action::UpdateLeverage(UpdateLeverageAction::cross(spec.asset_id, leverage));
        let body = self.post_action(action).await?;
        if is_action_ok(&body) {
            Ok(())
        } else {
            Err(ExchangeError::Api(body.to_string()))
        }
    }

    async fn submit_order(&self, request: OrderRequest) -> OrderOutcome {
        let spec = match self.lookup_spec(&request.symbol).await {
            Ok(spec) => spec,
            Err(e) => return OrderOutcome::Rejected(e.to_string()),
        };

        if let (Some(leverage), false) = (request.leverage, request.reduce_only) {
            if let Err(e) = self.update_leverage(&spec, leverage).await {
                warn!(symbol = %request.symbol, leverage, error = %e, "Failed to set leverage");
            }
        }

        let size = spec.round_size(request.size);
        if size.is_zero() {
            return OrderOutcome::Rejected(format!(
                "size {} rounds to zero at {} decimals",
                request.size, spec.sz_decimals
            ));
        }
        let limit_px = order_limit_price(&spec, &request, self.slippage);

        let order_type = match request.kind {
            OrderKind::Immediate => OrderTypeWire::ioc(),
            OrderKind::Resting => OrderTypeWire::gtc(),
        };
        let wire = OrderWire {
            asset: spec.asset_id,
            is_buy: request.is_buy,
            limit_px: spec.format_price(limit_px),
            sz: spec.format_size(size),
            reduce_only: request.reduce_only,
            order_type,
        };

        info!(
            symbol = %request.symbol,
            is_buy = request.is_buy,
            size = %wire.sz,
            limit_px = %wire.limit_px,
            reduce_only = request.reduce_only,
            "Placing order"
        );

        match self.post_action(Action::Order(OrderAction::single(wire))).await {
            Ok(body) => decode_order_response(&body),
            Err(e) => OrderOutcome::Rejected(e.to_string()),
        }
    }
}

impl ExchangeGateway for HyperliquidGateway {
    fn current_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, Option<Price>> {
        Box::pin(async move {
            match self.info.all_mids().await {
                Ok(mids) => mids.get(symbol).copied(),
                Err(e) => {
                    warn!(symbol, error = %e, "Failed to fetch mid price");
                    None
                }
            }
        })
    }

    fn position<'a>(
        &'a self,
        symbol: &'a str,
    ) -> BoxFuture<'a, ExchangeResult<Option<LivePosition>>> {
        Box::pin(async move {
            let positions = self.positions().await?;
            Ok(positions.into_iter().find(|p| p.symbol == symbol))
        })
    }

    fn positions(&self) -> BoxFuture<'_, ExchangeResult<Vec<LivePosition>>> {
        Box::pin(async move {
            let state = self.info.clearinghouse_state(self.user()?).await?;
            state.live_positions()
        })
    }

    fn place_order(&self, request: OrderRequest) -> BoxFuture<'_, OrderOutcome> {
        Box::pin(self.submit_order(request))
    }

    fn account_value(&self) -> BoxFuture<'_, ExchangeResult<AccountValue>> {
        Box::pin(async move {
            let state = self.info.clearinghouse_state(self.user()?).await?;
            state.account_value()
        })
    }

    fn asset_spec<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, ExchangeResult<AssetSpec>> {
        Box::pin(self.lookup_spec(symbol))
    }

    fn min_size<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, ExchangeResult<Size>> {
        Box::pin(async move { Ok(self.lookup_spec(symbol).await?.min_size()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn key_manager() -> Arc<KeyManager> {
        Arc::new(KeyManager::from_bytes(&hex::decode(TEST_PRIVATE_KEY).unwrap(), None).unwrap())
    }

    #[test]
    fn test_config_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.base_url, MAINNET_API_URL);
        assert!(config.is_mainnet);
        assert_eq!(config.slippage, dec!(0.02));
        assert_eq!(config.request_timeout_secs, 10);
    }

    #[test]
    fn test_config_testnet() {
        let mut config = GatewayConfig::default();
        config.use_testnet();
        assert_eq!(config.base_url, TESTNET_API_URL);
        assert!(!config.is_mainnet);
    }

    #[test]
    fn test_nonces_strictly_increase() {
        let nonces = NonceCounter::default();
        let a = nonces.next();
        let b = nonces.next();
        let c = nonces.next();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_immediate_limit_price_applies_slippage() {
        let spec = AssetSpec::new("ETH", 1, 4);
        let buy = OrderRequest::open("ETH", true, Size::new(dec!(1)), Price::new(dec!(2000)), 2);
        let sell = OrderRequest::close("ETH", false, Size::new(dec!(1)), Price::new(dec!(2000)));

        assert_eq!(order_limit_price(&spec, &buy, dec!(0.02)).inner(), dec!(2040));
        assert_eq!(order_limit_price(&spec, &sell, dec!(0.02)).inner(), dec!(1960));
    }

    #[test]
    fn test_resting_limit_price_is_rounded_only() {
        let spec = AssetSpec::new("BTC", 0, 5);
        let mut request =
            OrderRequest::open("BTC", true, Size::new(dec!(0.001)), Price::new(dec!(97123.46)), 2);
        request.kind = OrderKind::Resting;

        assert_eq!(order_limit_price(&spec, &request, dec!(0.02)).inner(), dec!(97123));
    }

    #[test]
    fn test_user_address_prefers_vault() {
        let config = GatewayConfig {
            account_address: Some("0x1111111111111111111111111111111111111111".to_string()),
            ..GatewayConfig::default()
        };
        let gateway = HyperliquidGateway::new(&config, key_manager()).unwrap();
        assert_eq!(
            gateway.user().unwrap(),
            "0x1111111111111111111111111111111111111111"
        );
        assert!(gateway.vault.is_some());
    }

    #[test]
    fn test_user_address_falls_back_to_key() {
        let gateway = HyperliquidGateway::new(&GatewayConfig::default(), key_manager()).unwrap();
        assert!(gateway.user().unwrap().starts_with("0x"));
        assert!(gateway.vault.is_none());
    }

    #[test]
    fn test_observation_only_has_no_account() {
        let manager = Arc::new(KeyManager::load(None, None).unwrap());
        let gateway = HyperliquidGateway::new(&GatewayConfig::default(), manager).unwrap();
        assert!(matches!(gateway.user(), Err(ExchangeError::NoAccount)));
    }

    #[tokio::test]
    async fn test_observation_only_rejects_orders() {
        let manager = Arc::new(KeyManager::load(None, None).unwrap());
        let gateway = HyperliquidGateway::new(&GatewayConfig::default(), manager).unwrap();
        gateway
            .specs
            .insert("ETH".to_string(), AssetSpec::new("ETH", 1, 4));

        let request = OrderRequest::close("ETH", true, Size::new(dec!(0.1)), Price::new(dec!(2000)));
        let outcome = gateway.place_order(request).await;
        assert!(matches!(outcome, OrderOutcome::Rejected(_)));
    }

    #[test]
    fn test_bad_account_address_is_rejected() {
        let config = GatewayConfig {
            account_address: Some("not-an-address".to_string()),
            ..GatewayConfig::default()
        };
        assert!(matches!(
            HyperliquidGateway::new(&config, key_manager()),
            Err(ExchangeError::Parse(_))
        ));
    }
}
