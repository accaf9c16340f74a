//! License lifecycle endpoints (§4.5/§6): initialize, activate, seats,
//! deactivate, and the read/sync endpoints scoped to one workspace.
//!
//! Grounded on `fetch_latest_flags.go`'s `RefreshLicense` for the sync path
//! and on the original's license-CRUD fiber handlers (same package) for the
//! initialize/activate/deactivate/modify-seats shapes — this agent keeps
//! the same request/response fields but drives them through `sync::` and
//! `store::Store` instead of GORM calls.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MonitorError, MonitorResult};
use crate::remote::types::{ActivateRequest, MemberPayload, ModifySeatsRequest};
use crate::server::state::AppState;
use crate::store::repository::NewLicense;
use crate::store::License;
use crate::sync;

#[derive(Debug, Serialize)]
pub struct LicenseView {
    pub workspace_id: String,
    pub workspace_slug: String,
    pub product: String,
    pub product_type: String,
    pub seats: i64,
    pub free_seats: i64,
    pub is_cancelled: bool,
    pub is_airgapped: bool,
}

impl From<&License> for LicenseView {
    fn from(license: &License) -> Self {
        Self {
            workspace_id: license.workspace_id.clone(),
            workspace_slug: license.workspace_slug.clone(),
            product: license.product.clone(),
            product_type: license.product_type.clone(),
            seats: license.seats,
            free_seats: license.free_seats,
            is_cancelled: license.is_cancelled,
            is_airgapped: license.is_airgapped,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InitializeRequest {
    pub workspace_id: Uuid,
    pub workspace_slug: String,
}

/// `POST /api/licenses/initialize/` — resolve or create the workspace's
/// active License; matches "Workspace product query"'s "if absent, attempt
/// to create a free one" behavior.
pub async fn initialize(
    State(state): State<AppState>,
    Json(request): Json<InitializeRequest>,
) -> MonitorResult<Json<LicenseView>> {
    if let Some(existing) = state.store.find_license_by_workspace_id(request.workspace_id).await? {
        return Ok(Json(LicenseView::from(&existing)));
    }

    if state.remote.is_airgapped() {
        return Err(MonitorError::upstream_semantic(
            "free workspace initialization is not supported in air-gapped mode",
        ));
    }

    let payload = state
        .remote
        .initialize_free_workspace(&request.workspace_id.to_string(), &request.workspace_slug)
        .await?;

    let license = state
        .store
        .create_license(NewLicense {
            license_key: payload.license_key,
            instance_id: Uuid::parse_str(&payload.instance_id).unwrap_or(request.workspace_id),
            workspace_id: request.workspace_id,
            workspace_slug: request.workspace_slug,
            product: payload.product,
            product_type: payload.product_type,
            seats: payload.seats,
            free_seats: payload.free_seats,
            interval: payload.interval,
            is_offline_payment: payload.is_offline_payment,
            is_cancelled: payload.is_cancelled,
            subscription: payload.subscription,
            current_period_end_date: payload.current_period_end_date,
            trial_end_date: payload.trial_end_date,
            has_added_payment_method: payload.has_added_payment_method,
            has_activated_free_trial: payload.has_activated_free_trial,
            is_airgapped: false,
        })
        .await?;

    Ok(Json(LicenseView::from(&license)))
}

#[derive(Debug, Deserialize)]
pub struct ActivateApiRequest {
    pub workspace_id: Uuid,
    pub workspace_slug: String,
    pub license_key: String,
    #[serde(default)]
    pub members_list: Vec<MemberPayload>,
}

/// `POST /api/licenses/activate/` — paid activation: replace the
/// workspace's License with the upstream response, then fetch and store
/// Flags.
pub async fn activate(
    State(state): State<AppState>,
    Json(request): Json<ActivateApiRequest>,
) -> MonitorResult<Json<LicenseView>> {
    let payload = state
        .remote
        .activate_workspace(ActivateRequest {
            workspace_id: request.workspace_id.to_string(),
            workspace_slug: request.workspace_slug.clone(),
            license_key: request.license_key,
            members_list: request.members_list.clone(),
        })
        .await?;

    let license = state
        .store
        .create_license(NewLicense {
            license_key: payload.license_key,
            instance_id: Uuid::parse_str(&payload.instance_id).unwrap_or(request.workspace_id),
            workspace_id: request.workspace_id,
            workspace_slug: request.workspace_slug,
            product: payload.product,
            product_type: payload.product_type,
            seats: payload.seats,
            free_seats: payload.free_seats,
            interval: payload.interval,
            is_offline_payment: payload.is_offline_payment,
            is_cancelled: payload.is_cancelled,
            subscription: payload.subscription,
            current_period_end_date: payload.current_period_end_date,
            trial_end_date: payload.trial_end_date,
            has_added_payment_method: payload.has_added_payment_method,
            has_activated_free_trial: payload.has_activated_free_trial,
            is_airgapped: false,
        })
        .await?;

    if !license.is_free() {
        let response = state.remote.fetch_flags(&license.license_key, &state.config.app_version).await?;
        state.store.upsert_flags(license.id(), &response.app_version, &response.envelope).await?;
    }

    Ok(Json(LicenseView::from(&license)))
}

#[derive(Debug, Deserialize)]
pub struct ModifySeatsApiRequest {
    pub license_key: String,
    pub seats: i64,
}

/// `POST /api/licenses/modify-seats/` — proxy a quantity change upstream;
/// on success update `license.seats` locally.
pub async fn modify_seats(
    State(state): State<AppState>,
    Json(request): Json<ModifySeatsApiRequest>,
) -> MonitorResult<Json<LicenseView>> {
    let payload = state
        .remote
        .modify_seats(ModifySeatsRequest {
            license_key: request.license_key.clone(),
            seats: request.seats,
        })
        .await?;

    let existing = state
        .store
        .find_license_by_workspace_id(Uuid::parse_str(&payload.workspace_id).unwrap_or_default())
        .await?
        .ok_or_else(|| MonitorError::validation("no license found for this workspace"))?;

    let updated = state
        .store
        .update_license(
            existing.id(),
            &existing.product,
            &existing.product_type,
            payload.seats,
            payload.free_seats,
            &existing.interval,
            existing.is_offline_payment,
            existing.is_cancelled,
            &existing.subscription,
            existing.current_period_end_date.as_deref(),
            existing.trial_end_date.as_deref(),
            existing.has_added_payment_method,
            existing.has_activated_free_trial,
        )
        .await?;

    Ok(Json(LicenseView::from(&updated)))
}

#[derive(Debug, Deserialize)]
pub struct DeactivateApiRequest {
    pub workspace_id: Uuid,
}

/// `POST /api/licenses/deactivate/`.
pub async fn deactivate(
    State(state): State<AppState>,
    Json(request): Json<DeactivateApiRequest>,
) -> MonitorResult<Json<LicenseView>> {
    let license = state
        .store
        .find_license_by_workspace_id(request.workspace_id)
        .await?
        .ok_or_else(|| MonitorError::validation("no license found for this workspace"))?;

    let free_license = sync::deactivate(&state.store, state.remote.as_ref(), &license).await?;
    Ok(Json(LicenseView::from(&free_license)))
}

/// `POST /api/licenses/<workspaceId>/workspace-delete/` — verify the
/// workspace is on the FREE plan before allowing the caller to proceed
/// with deletion.
pub async fn workspace_delete(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
) -> MonitorResult<Json<serde_json::Value>> {
    let license = state.store.find_license_by_workspace_id(workspace_id).await?;
    let is_free = license.as_ref().map(License::is_free).unwrap_or(true);

    if !is_free {
        return Err(MonitorError::validation(
            "workspace has an active paid license and cannot be deleted",
        ));
    }

    Ok(Json(serde_json::json!({ "can_delete": true })))
}

/// `GET /api/workspaces/<workspaceId>/licenses/`.
pub async fn get_license(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
) -> MonitorResult<Json<LicenseView>> {
    let license = state
        .store
        .find_license_by_workspace_id(workspace_id)
        .await?
        .ok_or_else(|| MonitorError::validation("no license found for this workspace"))?;
    Ok(Json(LicenseView::from(&license)))
}

/// `PATCH /api/workspaces/<workspaceId>/subscriptions/` — subscription
/// sync, same path as the background synchronizer but triggered on demand
/// for one workspace.
pub async fn sync_subscription(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
) -> MonitorResult<Json<LicenseView>> {
    manual_sync(State(state), Path(workspace_id)).await
}

/// `POST /api/workspaces/<workspaceId>/sync/` — forced §4.4 refresh for one
/// workspace. On upstream failure, synthesizes a response from the stored
/// License so the caller can proceed read-only.
pub async fn manual_sync(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
) -> MonitorResult<Json<LicenseView>> {
    let license = state
        .store
        .find_license_by_workspace_id(workspace_id)
        .await?
        .ok_or_else(|| MonitorError::validation("no license found for this workspace"))?;

    match sync::refresh_one(&state.store, state.remote.as_ref(), &license, &state.config.app_version).await {
        Ok(updated) => Ok(Json(LicenseView::from(&updated))),
        Err(_) => Ok(Json(LicenseView::from(&license))),
    }
}

/// `POST /api/workspaces/licenses/` — instance-wide paid-plan probe: does
/// any workspace served by this instance hold a non-FREE license?
pub async fn instance_has_paid_plan(State(state): State<AppState>) -> MonitorResult<Json<serde_json::Value>> {
    let licenses = state.store.list_licenses().await?;
    let has_paid = licenses.iter().any(|l| !l.is_free());
    Ok(Json(serde_json::json!({ "has_paid_plan": has_paid })))
}

#[derive(Debug, Deserialize)]
pub struct WorkspaceProductsRequest {
    pub workspace_slug: String,
}

/// `POST /api/products/workspace-products/<workspaceId>/` — the workspace
/// product-query bullet of §4.5. If no License exists yet for the
/// workspace, attempt to create a free one (same fallback as `initialize`)
/// rather than erroring.
pub async fn workspace_products(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Json(request): Json<WorkspaceProductsRequest>,
) -> MonitorResult<Json<LicenseView>> {
    if let Some(existing) = state.store.find_license_by_workspace_id(workspace_id).await? {
        return Ok(Json(LicenseView::from(&existing)));
    }

    if state.remote.is_airgapped() {
        return Err(MonitorError::upstream_semantic(
            "free workspace initialization is not supported in air-gapped mode",
        ));
    }

    let payload = state
        .remote
        .initialize_free_workspace(&workspace_id.to_string(), &request.workspace_slug)
        .await?;

    let license = state
        .store
        .create_license(NewLicense {
            license_key: payload.license_key,
            instance_id: Uuid::parse_str(&payload.instance_id).unwrap_or(workspace_id),
            workspace_id,
            workspace_slug: request.workspace_slug,
            product: payload.product,
            product_type: payload.product_type,
            seats: payload.seats,
            free_seats: payload.free_seats,
            interval: payload.interval,
            is_offline_payment: payload.is_offline_payment,
            is_cancelled: payload.is_cancelled,
            subscription: payload.subscription,
            current_period_end_date: payload.current_period_end_date,
            trial_end_date: payload.trial_end_date,
            has_added_payment_method: payload.has_added_payment_method,
            has_activated_free_trial: payload.has_activated_free_trial,
            is_airgapped: false,
        })
        .await?;

    Ok(Json(LicenseView::from(&license)))
}
