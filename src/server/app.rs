//! Router construction for the Control HTTP API.
//!
//! Grounded on the teacher's `build_app` (`server/app.rs`): CORS + trace
//! layers wrapping the router, a single auth middleware applied across the
//! whole surface, one `AppState` handed to every route via `.with_state`.

use axum::http::Method;
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::middleware::monitor_token_middleware;
use super::routes::{airgapped, dns, flags, licenses};
use super::state::AppState;

pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers(Any);

    let protected = Router::new()
        .route("/api/licenses/initialize/", post(licenses::initialize))
        .route("/api/licenses/activate/", post(licenses::activate))
        .route("/api/licenses/modify-seats/", post(licenses::modify_seats))
        .route("/api/licenses/deactivate/", post(licenses::deactivate))
        .route("/api/licenses/:workspace_id/workspace-delete/", post(licenses::workspace_delete))
        .route("/api/workspaces/:workspace_id/licenses/", get(licenses::get_license))
        .route("/api/workspaces/:workspace_id/subscriptions/", patch(licenses::sync_subscription))
        .route("/api/workspaces/:workspace_id/sync/", post(licenses::manual_sync))
        .route("/api/workspaces/licenses/", post(licenses::instance_has_paid_plan))
        .route("/api/products/workspace-products/:workspace_id/", post(licenses::workspace_products))
        .route("/api/feature-flags/", post(flags::evaluate))
        .route("/api/licenses/airgapped/activate/", post(airgapped::activate))
        .route("/api/dns/validate/", post(dns::validate))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), monitor_token_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
