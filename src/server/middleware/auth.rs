//! Shared-header authentication for the control API.
//!
//! Modeled after the teacher's `jwt_auth_middleware`
//! (`server/middleware/jwt_auth.rs`) shape — extract a header, reject with
//! 401 on mismatch — but checking a static token against configuration
//! instead of verifying a JWT, per the spec's "no authorization beyond a
//! shared header check" Non-goal.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::server::state::AppState;

const TOKEN_HEADER: &str = "x-monitor-token";

pub async fn monitor_token_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(token) if token == state.config.monitor_token => next.run(request).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({ "error": "missing or invalid X-Monitor-Token header" })),
        )
            .into_response(),
    }
}
