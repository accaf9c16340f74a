//! Upstream control-plane access, networked and air-gapped.
//!
//! Grounded on the original Go `IPrimeMonitorApi` interface
//! (`monitor/lib/api/api.go`) and its air-gapped counterpart
//! (`apps/monitor/lib/api/airgapped_api.go`): one trait, two
//! implementations, selected at start-up by `Config::airgapped`. Mirrors
//! the teacher's `Base*` trait-plus-impl dependency-injection convention
//! (`kernel/traits.rs`).

pub mod airgapped;
pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::error::MonitorResult;
use types::{
    ActivateRequest, DeactivateRequest, FlagsResponse, LicensePayload, ModifySeatsRequest,
    StatusPayload, SyncRequest,
};

pub use airgapped::AirgappedApi;
pub use client::NetworkedApi;

/// Everything the synchronizer and control API need from the upstream
/// control plane, whether reached over the network or through the
/// air-gapped file adapter.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// `true` for the air-gapped adapter; used by handlers that must refuse
    /// operations unsupported without network access.
    fn is_airgapped(&self) -> bool;

    async fn post_service_status(&self, payload: StatusPayload) -> MonitorResult<()>;

    async fn initialize_free_workspace(
        &self,
        workspace_id: &str,
        workspace_slug: &str,
    ) -> MonitorResult<LicensePayload>;

    async fn activate_workspace(&self, request: ActivateRequest) -> MonitorResult<LicensePayload>;

    async fn sync_license(&self, request: SyncRequest) -> MonitorResult<LicensePayload>;

    async fn deactivate_license(&self, request: DeactivateRequest) -> MonitorResult<LicensePayload>;

    async fn modify_seats(&self, request: ModifySeatsRequest) -> MonitorResult<LicensePayload>;

    async fn fetch_flags(&self, license_key: &str, version: &str) -> MonitorResult<FlagsResponse>;
}
