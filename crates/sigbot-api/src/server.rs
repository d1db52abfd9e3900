//! HTTP server implementation using axum.

use std::future::Future;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use sigbot_engine::Engine;
use sigbot_telemetry::render_metrics;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ApiConfig;
use crate::dto::SignalBody;
use crate::error::ApiError;

/// Header carrying the shared auth token.
pub const AUTH_HEADER: &str = "x-auth-token";

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<Engine>,
    config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, config: ApiConfig) -> Self {
        Self {
            engine,
            config: Arc::new(config),
        }
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/signal", post(receive_signal))
        .route("/close-all-positions", post(close_all_positions))
        .route("/close-position/{symbol}", post(close_position))
        .route("/sync-positions", post(sync_positions))
        .route("/positions", get(positions))
        .route("/status", get(status))
        .route("/vault-balance", get(vault_balance))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Check the shared token.
fn check_token(headers: &HeaderMap, config: &ApiConfig) -> Result<(), ApiError> {
    if !config.auth_configured() {
        return Err(ApiError::AuthNotConfigured);
    }
    let provided = headers
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;
    if provided != config.auth_token {
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}

async fn home() -> Json<Value> {
    Json(json!({
        "service": "sigbot",
        "endpoints": [
            "POST /signal",
            "POST /close-all-positions",
            "POST /close-position/{symbol}",
            "POST /sync-positions",
            "GET /positions",
            "GET /status",
            "GET /vault-balance",
            "GET /health",
            "GET /metrics",
        ],
    }))
}

async fn receive_signal(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<SignalBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    check_token(&headers, &state.config)?;
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let inbound = body.into_inbound()?;
    let receipt = state.engine.submit_signal(inbound).await?;
    info!(signal_id = %receipt.signal_id, symbol = %receipt.symbol, "Signal accepted");

    Ok(Json(json!({
        "status": "success",
        "message": "Signal received and queued for processing",
        "signal_id": receipt.signal_id,
        "symbol": receipt.symbol,
        "signal_type": receipt.direction,
        "reference_price": receipt.reference_price,
    })))
}

async fn close_all_positions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    check_token(&headers, &state.config)?;
    let report = state.engine.close_all().await?;
    let message = format!(
        "Closed {} out of {} positions",
        report.closed_positions.len(),
        report.total_positions
    );
    Ok(Json(json!({
        "status": report.status,
        "message": message,
        "successful_closes": report.closed_positions.len(),
        "failed_closes": report.failed_positions.len(),
        "total_positions": report.total_positions,
        "closed_positions": report.closed_positions,
        "failed_positions": report.failed_positions,
    })))
}

async fn close_position(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(symbol): Path<String>,
) -> Result<Json<Value>, ApiError> {
    check_token(&headers, &state.config)?;
    let closed = state.engine.close_by_symbol(&symbol).await?;
    Ok(Json(json!({
        "status": "success",
        "message": format!("Successfully closed position for {}", closed.symbol),
        "signal_id": closed.signal_id,
        "symbol": closed.symbol,
        "exit_price": closed.exit_price,
        "placed_order": closed.placed_order,
    })))
}

async fn sync_positions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    check_token(&headers, &state.config)?;
    let report = state.engine.reconcile().await?;
    Ok(Json(json!({ "status": "success", "sync_results": report })))
}

async fn positions(State(state): State<AppState>) -> Result<Response, ApiError> {
    let summary = state.engine.positions_summary().await?;
    Ok(Json(summary).into_response())
}

async fn status(State(state): State<AppState>) -> Result<Response, ApiError> {
    let status = state.engine.monitoring_status()?;
    Ok(Json(status).into_response())
}

async fn vault_balance(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let balance = state
        .engine
        .account_balance()
        .await
        .map_err(|e| ApiError::Internal(format!("Could not retrieve vault balance: {e}")))?;
    Ok(Json(json!({
        "total_value": balance.total_value,
        "withdrawable": balance.withdrawable,
    })))
}

async fn health(State(state): State<AppState>) -> Response {
    let report = state.engine.health();
    let code = if report.store_reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report)).into_response()
}

async fn metrics() -> Result<Response, ApiError> {
    let body = render_metrics().map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// Run the HTTP server until `shutdown` resolves.
pub async fn run_server(
    engine: Arc<Engine>,
    config: ApiConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = config.addr();
    if !config.auth_configured() {
        tracing::warn!("No auth token configured, authenticated routes will return 500");
    }
    let app = create_router(AppState::new(engine, config));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Starting API server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use rust_decimal_macros::dec;
    use sigbot_engine::{Monitor, MonitorConfig, SizingConfig};
    use sigbot_exchange::MockGateway;
    use sigbot_position::{PositionManager, RetryPolicy};
    use sigbot_store::MemorySignalStore;
    use std::time::Duration;
    use tower::ServiceExt;

    const TOKEN: &str = "secret";

    struct Harness {
        gateway: Arc<MockGateway>,
        engine: Arc<Engine>,
        router: Router,
    }

    fn harness(token: &str) -> Harness {
        let gateway = Arc::new(MockGateway::new());
        let store = Arc::new(MemorySignalStore::new());
        let manager = Arc::new(PositionManager::new(
            gateway.clone(),
            store,
            RetryPolicy::new(1, Duration::ZERO),
        ));
        let monitor = Arc::new(Monitor::new(
            manager.clone(),
            MonitorConfig::default(),
            SizingConfig::default(),
        ));
        let engine = Arc::new(Engine::new(manager, monitor));
        let config = ApiConfig {
            auth_token: token.to_string(),
            ..ApiConfig::default()
        };
        Harness {
            gateway,
            router: create_router(AppState::new(engine.clone(), config)),
            engine,
        }
    }

    fn post(uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(AUTH_HEADER, token);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    const SIGNAL: &str = r#"{
        "Signal Message": "buy",
        "Token Mentioned": "eth",
        "TP1": 110, "TP2": 130, "SL": 90,
        "Max Exit Time": {"$date": "2099-01-01T00:00:00Z"},
        "Current Price": 100
    }"#;

    #[tokio::test]
    async fn test_signal_requires_token() {
        let h = harness(TOKEN);

        let missing = h.router.clone().oneshot(post("/signal", None, SIGNAL)).await.unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = h
            .router
            .clone()
            .oneshot(post("/signal", Some("nope"), SIGNAL))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unconfigured_token_is_server_error() {
        let h = harness("");
        let response = h
            .router
            .oneshot(post("/close-all-positions", Some("anything"), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_signal_accepted_and_listed_after_cycle() {
        let h = harness(TOKEN);
        h.gateway.set_price("ETH", dec!(100));

        let response = h
            .router
            .clone()
            .oneshot(post("/signal", Some(TOKEN), SIGNAL))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["symbol"], "ETH");
        assert_eq!(body["signal_type"], "buy");

        h.engine.monitor().run_cycle().await;

        let response = h.router.clone().oneshot(get_req("/positions")).await.unwrap();
        let body = json_body(response).await;
        assert_eq!(body["total_positions"], 1);
        assert_eq!(body["positions"][0]["symbol"], "ETH");
        assert_eq!(body["positions"][0]["is_long"], true);

        let response = h.router.oneshot(get_req("/status")).await.unwrap();
        let body = json_body(response).await;
        assert_eq!(body["open_positions"], 1);
        assert_eq!(body["monitoring_active"], false);
    }

    #[tokio::test]
    async fn test_malformed_signal_is_bad_request() {
        let h = harness(TOKEN);
        let response = h
            .router
            .clone()
            .oneshot(post("/signal", Some(TOKEN), r#"{"Signal Message": "buy"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bad_direction = SIGNAL.replace("\"buy\"", "\"hold\"");
        let response = h
            .router
            .oneshot(post("/signal", Some(TOKEN), &bad_direction))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_close_unknown_symbol_is_not_found() {
        let h = harness(TOKEN);
        let response = h
            .router
            .oneshot(post("/close-position/DOGE", Some(TOKEN), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_close_all_and_sync() {
        let h = harness(TOKEN);
        h.gateway.set_price("ETH", dec!(100));
        h.router
            .clone()
            .oneshot(post("/signal", Some(TOKEN), SIGNAL))
            .await
            .unwrap();
        h.engine.monitor().run_cycle().await;

        let response = h
            .router
            .clone()
            .oneshot(post("/close-all-positions", Some(TOKEN), ""))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["successful_closes"], 1);

        let response = h
            .router
            .oneshot(post("/sync-positions", Some(TOKEN), ""))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["sync_results"]["database_positions"], 0);
        assert_eq!(body["sync_results"]["actual_positions"], 0);
    }

    #[tokio::test]
    async fn test_public_endpoints() {
        let h = harness(TOKEN);

        let response = h.router.clone().oneshot(get_req("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");

        let response = h.router.clone().oneshot(get_req("/vault-balance")).await.unwrap();
        let body = json_body(response).await;
        assert_eq!(body["total_value"], "1000");

        let response = h.router.oneshot(get_req("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ApiConfig = toml::from_str("auth_token = \"abc\"").unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.addr(), "0.0.0.0:5000");
        assert!(config.auth_configured());
    }
}
