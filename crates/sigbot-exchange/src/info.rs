//! HTTP client for the read-only info endpoint.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sigbot_core::{AssetSpec, Price};
use tracing::{debug, warn};

use crate::error::{ExchangeError, ExchangeResult};
use crate::user_state::ClearinghouseStateResponse;

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Request body for the info endpoint.
#[derive(Debug, Serialize)]
struct InfoRequest<'a> {
    #[serde(rename = "type")]
    request_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
}

/// `meta` response: the perp universe, indexed by asset id.
#[derive(Debug, Deserialize)]
pub struct MetaResponse {
    pub universe: Vec<UniverseEntry>,
}

#[derive(Debug, Deserialize)]
pub struct UniverseEntry {
    pub name: String,
    #[serde(rename = "szDecimals")]
    pub sz_decimals: u32,
    #[serde(rename = "maxLeverage", default)]
    pub max_leverage: Option<u32>,
}

impl MetaResponse {
    /// Asset specs keyed by symbol; the asset id is the universe index.
    pub fn asset_specs(&self) -> Vec<AssetSpec> {
        self.universe
            .iter()
            .enumerate()
            .map(|(idx, entry)| AssetSpec::new(entry.name.clone(), idx as u32, entry.sz_decimals))
            .collect()
    }
}

/// Client for the info endpoint.
pub struct InfoClient {
    client: Client,
    info_url: String,
}

impl InfoClient {
    /// Create a new info client.
    ///
    /// # Arguments
    /// * `info_url` - URL of the info endpoint (e.g., "https://api.hyperliquid.xyz/info")
    pub fn new(info_url: impl Into<String>, timeout: Duration) -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExchangeError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            info_url: info_url.into(),
        })
    }

    async fn post<T: DeserializeOwned>(&self, request: &InfoRequest<'_>) -> ExchangeResult<T> {
        let response = self
            .client
            .post(&self.info_url)
            .json(request)
            .send()
            .await
            .map_err(|e| ExchangeError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::HttpClient(format!("HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| ExchangeError::Parse(format!("{} response: {e}", request.request_type)))
    }

    /// Mid prices for every listed asset.
    pub async fn all_mids(&self) -> ExchangeResult<HashMap<String, Price>> {
        let raw: HashMap<String, String> = self
            .post(&InfoRequest {
                request_type: "allMids",
                user: None,
            })
            .await?;

        let mut mids = HashMap::with_capacity(raw.len());
        for (coin, px) in raw {
            match px.parse::<Price>() {
                Ok(price) => {
                    mids.insert(coin, price);
                }
                Err(e) => warn!(coin = %coin, raw = %px, error = %e, "Skipping unparsable mid"),
            }
        }
        debug!(count = mids.len(), "Fetched allMids");
        Ok(mids)
    }

    /// Perp universe metadata.
    pub async fn meta(&self) -> ExchangeResult<MetaResponse> {
        self.post(&InfoRequest {
            request_type: "meta",
            user: None,
        })
        .await
    }

    /// Positions and margin summary for `user`.
    pub async fn clearinghouse_state(&self, user: &str) -> ExchangeResult<ClearinghouseStateResponse> {
        self.post(&InfoRequest {
            request_type: "clearinghouseState",
            user: Some(user),
        })
        .await
    }
}
