//! `MonitorError -> axum::response::Response`, giving every handler a plain
//! `Result<T, MonitorError>` return type. Error bodies are a uniform
//! `{"error": "..."}`, per §6's response-envelope rule.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::MonitorError;

impl IntoResponse for MonitorError {
    fn into_response(self) -> Response {
        let status = match &self {
            MonitorError::HandlerValidation(_) => StatusCode::BAD_REQUEST,
            MonitorError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MonitorError::Crypto(_) => StatusCode::BAD_REQUEST,
            MonitorError::UpstreamTransport(_) => StatusCode::BAD_GATEWAY,
            MonitorError::UpstreamSemantic(_) => StatusCode::BAD_GATEWAY,
            MonitorError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MonitorError::Probe(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
