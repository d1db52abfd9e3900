//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use sigbot_engine::EngineError;
use sigbot_position::PositionError;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Server not configured for auth, set SIGNAL_AUTH_TOKEN")]
    AuthNotConfigured,

    #[error("Unauthorized: missing or invalid X-Auth-Token header")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::AuthNotConfigured | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Engine(e) => match e {
                EngineError::InvalidSignal(_) | EngineError::PriceUnavailable(_) => {
                    StatusCode::BAD_REQUEST
                }
                EngineError::NoOpenPosition(_) => StatusCode::NOT_FOUND,
                EngineError::Position(PositionError::PriceUnavailable(_)) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }
        (status, Json(json!({ "status": "error", "error": self.to_string() }))).into_response()
    }
}
