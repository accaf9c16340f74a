//! Wire types for the upstream control-plane API.
//!
//! Field names mirror the original Go `WorkspaceActivationResponse` /
//! `StatusPayload` / `SeatUpdatePayload` shapes closely enough that the
//! payloads this crate sends and receives are byte-compatible with the
//! reference implementation.

use serde::{Deserialize, Serialize};

use crate::crypto::EncryptedEnvelope;
use crate::healthcheck::{HealthCheckStatus, ServiceStatus};

/// One member entry as exchanged with upstream (`members_list`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberPayload {
    pub user_id: String,
    pub user_role: i64,
}

/// The License-shaped payload returned by activate/sync/initialize calls.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LicensePayload {
    pub instance_id: String,
    pub license_key: String,
    pub workspace_id: String,
    pub workspace_slug: String,
    pub product: String,
    pub product_type: String,
    pub seats: i64,
    pub free_seats: i64,
    pub interval: String,
    pub is_offline_payment: bool,
    pub is_cancelled: bool,
    pub subscription: String,
    pub current_period_end_date: Option<String>,
    pub trial_end_date: Option<String>,
    pub has_added_payment_method: bool,
    pub has_activated_free_trial: bool,
    #[serde(default)]
    pub members_list: Vec<MemberPayload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncRequest {
    pub license_key: String,
    pub members_list: Vec<MemberPayload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivateRequest {
    pub workspace_id: String,
    pub workspace_slug: String,
    pub license_key: String,
    pub members_list: Vec<MemberPayload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeactivateRequest {
    pub workspace_id: String,
    pub license_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModifySeatsRequest {
    pub license_key: String,
    pub seats: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlagsRequest {
    pub license_key: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlagsResponse {
    #[serde(flatten)]
    pub envelope: EncryptedEnvelope,
    pub app_version: String,
}

/// One entry in the status-report batch posted to `/api/v2/monitor/`.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatusEntry {
    pub service_name: String,
    pub status: &'static str,
    pub status_code: u16,
}

impl From<&HealthCheckStatus> for ServiceStatusEntry {
    fn from(status: &HealthCheckStatus) -> Self {
        Self {
            service_name: status.service_name.clone(),
            status: match status.status {
                ServiceStatus::Reachable => "REACHABLE",
                ServiceStatus::NotReachable => "NOT_REACHABLE",
            },
            status_code: status.status_code,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusPayload {
    pub statuses: Vec<ServiceStatusEntry>,
}
