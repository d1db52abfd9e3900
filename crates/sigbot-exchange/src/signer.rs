//! Signer for Hyperliquid L1 actions.
//!
//! Two stages:
//! 1. `action_hash` = keccak256(msgpack(action) + nonce + vault tag)
//! 2. EIP-712 signature over the phantom agent `{source, connectionId}`
//!
//! Msgpack field order must match the venue's reference encoding exactly,
//! so wire structs declare fields in that order.

use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::{keccak256, Address, PrimitiveSignature, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer as AlloySigner;
use alloy::sol;
use alloy::sol_types::eip712_domain;
use alloy::sol_types::SolStruct;
use serde::Serialize;
use thiserror::Error;
use zeroize::Zeroizing;

// =============================================================================
// KeySource and KeyManager
// =============================================================================

/// Source of the private key.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Load from environment variable (development).
    EnvVar { var_name: String },
    /// Load from file (production, recommend 0600 permissions).
    File { path: PathBuf },
}

/// Holds the trading key.
///
/// Keys are loaded once at startup. Never log key material.
pub struct KeyManager {
    trading_signer: Option<PrivateKeySigner>,
}

impl KeyManager {
    /// Load the trading key, verifying the derived address when one is expected.
    ///
    /// `None` as source gives an observation-only manager that cannot sign.
    pub fn load(
        trading_source: Option<KeySource>,
        expected_trading_address: Option<Address>,
    ) -> Result<Self, KeyError> {
        let Some(source) = trading_source else {
            return Ok(Self {
                trading_signer: None,
            });
        };

        let secret_bytes: Zeroizing<Vec<u8>> = match source {
            KeySource::EnvVar { ref var_name } => {
                let hex = Zeroizing::new(
                    std::env::var(var_name)
                        .map_err(|_| KeyError::EnvVarNotFound(var_name.clone()))?,
                );
                parse_hex_key(&hex)?
            }
            KeySource::File { ref path } => {
                let content = Zeroizing::new(std::fs::read_to_string(path)?);
                parse_hex_key(&content)?
            }
        };

        Self::from_bytes(&secret_bytes, expected_trading_address)
    }

    /// Build from raw key bytes.
    pub fn from_bytes(
        secret_bytes: &[u8],
        expected_address: Option<Address>,
    ) -> Result<Self, KeyError> {
        let signer = PrivateKeySigner::from_slice(secret_bytes)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;

        if let Some(expected) = expected_address {
            if signer.address() != expected {
                return Err(KeyError::AddressMismatch {
                    expected,
                    actual: signer.address(),
                });
            }
        }

        Ok(Self {
            trading_signer: Some(signer),
        })
    }

    pub fn trading_signer(&self) -> Option<&PrivateKeySigner> {
        self.trading_signer.as_ref()
    }

    pub fn trading_address(&self) -> Option<Address> {
        self.trading_signer.as_ref().map(|s| s.address())
    }
}

/// Parse a hex key (0x prefix and surrounding whitespace allowed).
fn parse_hex_key(hex_str: &str) -> Result<Zeroizing<Vec<u8>>, KeyError> {
    let trimmed = hex_str.trim().trim_start_matches("0x");
    Ok(Zeroizing::new(hex::decode(trimmed)?))
}

/// Key management errors.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Failed to decode hex: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: Address, actual: Address },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Wire Format Types
// =============================================================================

/// L1 action. Serialized without a tag, as the inner map.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Action {
    Order(OrderAction),
    UpdateLeverage(UpdateLeverageAction),
}

/// `{"type": "order", "orders": [...], "grouping": "na"}`
#[derive(Debug, Clone, Serialize)]
pub struct OrderAction {
    #[serde(rename = "type")]
    pub action_type: &'static str,
    pub orders: Vec<OrderWire>,
    pub grouping: &'static str,
}

impl OrderAction {
    pub fn single(order: OrderWire) -> Self {
        Self {
            action_type: "order",
            orders: vec![order],
            grouping: "na",
        }
    }
}

/// `{"type": "updateLeverage", "asset": 1, "isCross": true, "leverage": 2}`
#[derive(Debug, Clone, Serialize)]
pub struct UpdateLeverageAction {
    #[serde(rename = "type")]
    pub action_type: &'static str,
    pub asset: u32,
    #[serde(rename = "isCross")]
    pub is_cross: bool,
    pub leverage: u32,
}

impl UpdateLeverageAction {
    pub fn cross(asset: u32, leverage: u32) -> Self {
        Self {
            action_type: "updateLeverage",
            asset,
            is_cross: true,
            leverage,
        }
    }
}

/// Order wire format.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWire {
    /// Asset index
    #[serde(rename = "a")]
    pub asset: u32,

    /// Buy (true) or Sell (false)
    #[serde(rename = "b")]
    pub is_buy: bool,

    /// Limit price as string
    #[serde(rename = "p")]
    pub limit_px: String,

    /// Size as string
    #[serde(rename = "s")]
    pub sz: String,

    /// Reduce-only flag
    #[serde(rename = "r")]
    pub reduce_only: bool,

    /// Order type
    #[serde(rename = "t")]
    pub order_type: OrderTypeWire,
}

/// Order type wire format: `{"limit": {"tif": "Ioc"}}` or `{"limit": {"tif": "Gtc"}}`.
#[derive(Debug, Clone, Serialize)]
pub struct OrderTypeWire {
    pub limit: LimitOrderType,
}

impl OrderTypeWire {
    /// IOC (Immediate or Cancel) order.
    pub fn ioc() -> Self {
        Self {
            limit: LimitOrderType {
                tif: "Ioc".to_string(),
            },
        }
    }

    /// GTC (Good Till Cancel) order.
    pub fn gtc() -> Self {
        Self {
            limit: LimitOrderType {
                tif: "Gtc".to_string(),
            },
        }
    }
}

/// Limit order type.
#[derive(Debug, Clone, Serialize)]
pub struct LimitOrderType {
    /// Time in force: "Gtc", "Ioc"
    pub tif: String,
}

/// EIP-712 signature components as sent in the exchange request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionSignature {
    /// r component (hex with 0x prefix).
    pub r: String,
    /// s component (hex with 0x prefix).
    pub s: String,
    /// Recovery id (27 or 28).
    pub v: u8,
}

impl ActionSignature {
    /// Create from raw signature bytes (65 bytes: r(32) + s(32) + v(1)).
    ///
    /// Normalizes v from 0/1 to 27/28.
    pub fn from_bytes(bytes: &[u8; 65]) -> Self {
        let v_raw = bytes[64];
        let v = if v_raw < 27 { v_raw + 27 } else { v_raw };
        Self {
            r: format!("0x{}", hex::encode(&bytes[0..32])),
            s: format!("0x{}", hex::encode(&bytes[32..64])),
            v,
        }
    }
}

// =============================================================================
// SigningInput and action_hash
// =============================================================================

/// Signing input parameters.
#[derive(Debug, Clone)]
pub struct SigningInput {
    pub action: Action,
    pub nonce: u64,
    /// None = own account, Some = trading on behalf of a vault
    pub vault_address: Option<Address>,
}

impl SigningInput {
    /// keccak256(msgpack(action) ++ nonce_be8 ++ vault_tag)
    ///
    /// The vault tag is `0x00` without a vault and `0x01 ++ address` with one.
    pub fn action_hash(&self) -> Result<B256, SignerError> {
        let mut data = rmp_serde::to_vec_named(&self.action)
            .map_err(|e| SignerError::SerializationFailed(e.to_string()))?;

        data.extend_from_slice(&self.nonce.to_be_bytes());

        match &self.vault_address {
            None => data.push(0x00),
            Some(addr) => {
                data.push(0x01);
                data.extend_from_slice(addr.as_slice());
            }
        }

        Ok(keccak256(&data))
    }
}

// =============================================================================
// PhantomAgent and EIP-712 Signing
// =============================================================================

/// EIP-712 domain constants.
pub const EIP712_DOMAIN_NAME: &str = "Exchange";
pub const EIP712_DOMAIN_VERSION: &str = "1";
pub const EIP712_CHAIN_ID: u64 = 1337;
pub const EIP712_VERIFYING_CONTRACT: Address = Address::ZERO;

sol! {
    #[derive(Debug)]
    struct Agent {
        string source;
        bytes32 connectionId;
    }
}

/// Phantom agent (EIP-712 signing target).
#[derive(Debug, Clone)]
pub struct PhantomAgent {
    /// "a" (mainnet) or "b" (testnet)
    pub source: String,
    pub connection_id: B256,
}

impl PhantomAgent {
    pub fn new(action_hash: B256, is_mainnet: bool) -> Self {
        Self {
            source: if is_mainnet { "a" } else { "b" }.to_string(),
            connection_id: action_hash,
        }
    }

    /// EIP-712 hash of the agent under the exchange domain.
    pub fn signing_hash(&self) -> B256 {
        let domain = eip712_domain! {
            name: EIP712_DOMAIN_NAME,
            version: EIP712_DOMAIN_VERSION,
            chain_id: EIP712_CHAIN_ID,
            verifying_contract: EIP712_VERIFYING_CONTRACT,
        };

        let agent = Agent {
            source: self.source.clone(),
            connectionId: self.connection_id,
        };

        agent.eip712_signing_hash(&domain)
    }

    pub async fn sign<S: AlloySigner + Send + Sync>(
        &self,
        signer: &S,
    ) -> Result<PrimitiveSignature, alloy::signers::Error> {
        signer.sign_hash(&self.signing_hash()).await
    }
}

// =============================================================================
// Signer
// =============================================================================

/// Signing errors.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("No trading key available")]
    NoTradingKey,

    #[error("Signing failed: {0}")]
    SigningFailed(#[from] alloy::signers::Error),

    #[error("Action serialization failed: {0}")]
    SerializationFailed(String),
}

/// Signs L1 actions with the trading key.
pub struct Signer {
    key_manager: Arc<KeyManager>,
    is_mainnet: bool,
}

impl Signer {
    /// Fails with `NoTradingKey` for an observation-only key manager.
    pub fn new(key_manager: Arc<KeyManager>, is_mainnet: bool) -> Result<Self, SignerError> {
        if key_manager.trading_signer().is_none() {
            return Err(SignerError::NoTradingKey);
        }
        Ok(Self {
            key_manager,
            is_mainnet,
        })
    }

    pub async fn sign_action(&self, input: &SigningInput) -> Result<ActionSignature, SignerError> {
        let signer = self
            .key_manager
            .trading_signer()
            .ok_or(SignerError::NoTradingKey)?;

        let action_hash = input.action_hash()?;
        let phantom_agent = PhantomAgent::new(action_hash, self.is_mainnet);
        let signature = phantom_agent.sign(signer).await?;

        Ok(ActionSignature::from_bytes(&signature.as_bytes()))
    }

    pub fn trading_address(&self) -> Option<Address> {
        self.key_manager.trading_address()
    }

    pub fn is_mainnet(&self) -> bool {
        self.is_mainnet
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development key (DO NOT use in production)
    const TEST_PRIVATE_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn test_key_bytes() -> Vec<u8> {
        hex::decode(TEST_PRIVATE_KEY.trim_start_matches("0x")).unwrap()
    }

    fn sample_order() -> OrderWire {
        OrderWire {
            asset: 1,
            is_buy: true,
            limit_px: "2040".to_string(),
            sz: "0.05".to_string(),
            reduce_only: false,
            order_type: OrderTypeWire::ioc(),
        }
    }

    #[test]
    fn test_key_manager_from_bytes() {
        let manager = KeyManager::from_bytes(&test_key_bytes(), None).unwrap();
        assert!(manager.trading_signer().is_some());
        assert!(manager.trading_address().is_some());
    }

    #[test]
    fn test_key_manager_address_mismatch() {
        let result = KeyManager::from_bytes(&test_key_bytes(), Some(Address::ZERO));
        assert!(matches!(result, Err(KeyError::AddressMismatch { .. })));
    }

    #[test]
    fn test_key_manager_without_source_is_observation_only() {
        let manager = KeyManager::load(None, None).unwrap();
        assert!(manager.trading_signer().is_none());
        assert!(matches!(
            Signer::new(Arc::new(manager), true),
            Err(SignerError::NoTradingKey)
        ));
    }

    #[test]
    fn test_key_manager_missing_env_var() {
        let source = KeySource::EnvVar {
            var_name: "SIGBOT_TEST_KEY_THAT_DOES_NOT_EXIST".to_string(),
        };
        assert!(matches!(
            KeyManager::load(Some(source), None),
            Err(KeyError::EnvVarNotFound(_))
        ));
    }

    #[test]
    fn test_order_type_wire_serialization() {
        let json = serde_json::to_string(&OrderTypeWire::ioc()).unwrap();
        assert_eq!(json, r#"{"limit":{"tif":"Ioc"}}"#);

        let json = serde_json::to_string(&OrderTypeWire::gtc()).unwrap();
        assert_eq!(json, r#"{"limit":{"tif":"Gtc"}}"#);
    }

    #[test]
    fn test_order_action_wire_shape() {
        let action = Action::Order(OrderAction::single(sample_order()));
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(
            json,
            r#"{"type":"order","orders":[{"a":1,"b":true,"p":"2040","s":"0.05","r":false,"t":{"limit":{"tif":"Ioc"}}}],"grouping":"na"}"#
        );
    }

    #[test]
    fn test_update_leverage_wire_shape() {
        let action = Action::UpdateLeverage(UpdateLeverageAction::cross(3, 2));
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(
            json,
            r#"{"type":"updateLeverage","asset":3,"isCross":true,"leverage":2}"#
        );
    }

    #[test]
    fn test_action_hash_depends_on_vault_and_nonce() {
        let action = Action::Order(OrderAction::single(sample_order()));
        let base = SigningInput {
            action: action.clone(),
            nonce: 1_700_000_000_000,
            vault_address: None,
        };
        let other_nonce = SigningInput {
            nonce: base.nonce + 1,
            ..base.clone()
        };
        let with_vault = SigningInput {
            vault_address: Some(Address::repeat_byte(0x11)),
            ..base.clone()
        };

        let h = base.action_hash().unwrap();
        assert!(!h.is_zero());
        assert_ne!(h, other_nonce.action_hash().unwrap());
        assert_ne!(h, with_vault.action_hash().unwrap());
        assert_eq!(h, base.action_hash().unwrap());
    }

    #[test]
    fn test_signature_v_normalization() {
        let mut bytes = [0u8; 65];
        bytes[64] = 1;
        let sig = ActionSignature::from_bytes(&bytes);
        assert_eq!(sig.v, 28);
        assert!(sig.r.starts_with("0x"));
        assert_eq!(sig.r.len(), 66);

        bytes[64] = 27;
        assert_eq!(ActionSignature::from_bytes(&bytes).v, 27);
    }

    #[tokio::test]
    async fn test_sign_action_recovers_trading_address() {
        let manager = Arc::new(KeyManager::from_bytes(&test_key_bytes(), None).unwrap());
        let signer = Signer::new(manager.clone(), false).unwrap();

        let input = SigningInput {
            action: Action::Order(OrderAction::single(sample_order())),
            nonce: 1_700_000_000_000,
            vault_address: None,
        };

        let raw = PhantomAgent::new(input.action_hash().unwrap(), false)
            .sign(manager.trading_signer().unwrap())
            .await
            .unwrap();
        let recovered = raw
            .recover_address_from_prehash(
                &PhantomAgent::new(input.action_hash().unwrap(), false).signing_hash(),
            )
            .unwrap();
        assert_eq!(Some(recovered), signer.trading_address());

        let sig = signer.sign_action(&input).await.unwrap();
        assert!(sig.v == 27 || sig.v == 28);
    }
}
