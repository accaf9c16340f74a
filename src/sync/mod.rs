//! License & feature-flag synchronizer.
//!
//! Grounded on `UpdateFlagsHandler`/`RefreshLicense`
//! (`monitor/cli/pkg/handlers/fetch_latest_flags.go`): one sequential pass
//! over every stored License, each refreshed inside its own transaction in
//! the order license write -> member replace -> flag refresh. Seat
//! reconciliation (§4.4.1) supersedes the original's simpler
//! "replace-all-members" `RefreshLicenseUsers`, as recorded in the design
//! notes.

mod seats;

pub use seats::{reconcile_seats, MemberDecision};

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{MonitorError, MonitorResult};
use crate::remote::types::{DeactivateRequest, MemberPayload, SyncRequest};
use crate::remote::RemoteApi;
use crate::store::repository::{MemberInput, NewLicense};
use crate::store::{License, Store};

const VERIFICATION_FAILED_THRESHOLD_DAYS: i64 = 7;

/// Run one refresh cycle over every stored License, sequentially.
///
/// Matches §5's ordering rule: synchronization across licenses is
/// sequential, never concurrent, to avoid local-store write contention.
pub async fn refresh_all(store: &Store, remote: &dyn RemoteApi, app_version: &str) -> MonitorResult<()> {
    let licenses = store.list_licenses().await?;

    for license in licenses {
        if let Err(err) = refresh_one(store, remote, &license, app_version).await {
            warn!(
                license_key = %license.license_key,
                workspace_slug = %license.workspace_slug,
                error = %err,
                "failed to refresh license"
            );
        }
    }

    Ok(())
}

/// Refresh a single License: sync with upstream, replace members, and (for
/// paid plans) refresh Flags. Returns the refreshed License.
pub async fn refresh_one(
    store: &Store,
    remote: &dyn RemoteApi,
    license: &License,
    app_version: &str,
) -> MonitorResult<License> {
    let members = store.user_licenses_for_license(license.id()).await?;
    let member_payload: Vec<MemberPayload> = members
        .iter()
        .map(|m| MemberPayload {
            user_id: m.user_id.clone(),
            user_role: m.role,
        })
        .collect();

    let sync_request = SyncRequest {
        license_key: license.license_key.clone(),
        members_list: member_payload,
    };

    match remote.sync_license(sync_request).await {
        Ok(payload) => {
            let updated = store
                .update_license(
                    license.id(),
                    &payload.product,
                    &payload.product_type,
                    payload.seats,
                    payload.free_seats,
                    &payload.interval,
                    payload.is_offline_payment,
                    payload.is_cancelled,
                    &payload.subscription,
                    payload.current_period_end_date.as_deref(),
                    payload.trial_end_date.as_deref(),
                    payload.has_added_payment_method,
                    payload.has_activated_free_trial,
                )
                .await?;

            if !remote.is_airgapped() {
                let decisions = reconcile_seats(&updated, &members, &payload.members_list);
                let member_inputs: Vec<(MemberInput, bool)> = decisions
                    .into_iter()
                    .map(|d| {
                        (
                            MemberInput {
                                user_id: d.user_id,
                                role: d.role,
                            },
                            d.is_active,
                        )
                    })
                    .collect();
                store
                    .replace_user_licenses(updated.id(), &member_inputs)
                    .await?;
            }

            if !updated.is_free() {
                refresh_flags(store, remote, &updated, app_version).await?;
            }

            info!(license_key = %updated.license_key, "license refreshed");
            Ok(updated)
        }
        Err(err) => handle_sync_failure(store, remote, license, err).await,
    }
}

/// On upstream sync failure: downgrade to FREE if the license has gone
/// unverified past the threshold, otherwise leave it unchanged and surface
/// a synthetic "not verified" error.
async fn handle_sync_failure(
    store: &Store,
    remote: &dyn RemoteApi,
    license: &License,
    upstream_err: MonitorError,
) -> MonitorResult<License> {
    let should_deactivate = if remote.is_airgapped() {
        license
            .current_period_end_date
            .as_deref()
            .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
            .is_some_and(|end| end.with_timezone(&Utc) < Utc::now())
    } else {
        license
            .last_verified_at
            .as_deref()
            .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
            .is_some_and(|last| {
                Utc::now().signed_duration_since(last.with_timezone(&Utc)).num_days()
                    > VERIFICATION_FAILED_THRESHOLD_DAYS
            })
    };

    if should_deactivate && !license.is_free() && license.last_verified_at.is_some() {
        return downgrade_license(store, license).await;
    }

    Err(MonitorError::upstream_semantic(format!(
        "license {} not verified: {upstream_err}",
        license.license_key
    )))
}

/// Rewrite a License to the FREE downgrade state and delete its
/// UserLicenses/Flags, per §4.4's downgrade invariants.
pub async fn downgrade_license(store: &Store, license: &License) -> MonitorResult<License> {
    let updated = store
        .update_license(
            license.id(),
            "Plane Free",
            "FREE",
            0,
            12,
            "MONTHLY",
            false,
            false,
            "",
            None,
            None,
            false,
            false,
        )
        .await?;
    store.replace_user_licenses(license.id(), &[]).await?;
    store.delete_flags_for_license(license.id()).await?;
    warn!(license_key = %license.license_key, "license downgraded to FREE after verification lapse");
    Ok(updated)
}

/// Fetch and store the latest Flags row for a paid license. The flags
/// endpoint is keyed by the running agent's own version, not the license's
/// plan — matches the original's `APP_VERSION`-keyed lookup
/// (`feature_flag_handler.go`), not a per-license field.
async fn refresh_flags(
    store: &Store,
    remote: &dyn RemoteApi,
    license: &License,
    app_version: &str,
) -> MonitorResult<()> {
    let response = remote.fetch_flags(&license.license_key, app_version).await?;
    store
        .upsert_flags(license.id(), &response.app_version, &response.envelope)
        .await?;
    Ok(())
}

/// Deactivate a license: call upstream, and on success delete the local
/// rows and store the returned FREE license. On local commit failure after
/// a successful upstream deactivate, attempt to re-activate upstream to
/// restore the prior state (best-effort; failure is reported but not
/// retried further).
pub async fn deactivate(store: &Store, remote: &dyn RemoteApi, license: &License) -> MonitorResult<License> {
    let upstream_response = remote
        .deactivate_license(DeactivateRequest {
            workspace_id: license.workspace_id.clone(),
            license_key: license.license_key.clone(),
        })
        .await?;

    let new_license = NewLicense {
        license_key: upstream_response.license_key.clone(),
        instance_id: Uuid::parse_str(&upstream_response.instance_id).unwrap_or_else(|_| Uuid::new_v4()),
        workspace_id: license.workspace_id(),
        workspace_slug: license.workspace_slug.clone(),
        product: upstream_response.product.clone(),
        product_type: upstream_response.product_type.clone(),
        seats: upstream_response.seats,
        free_seats: upstream_response.free_seats,
        interval: upstream_response.interval.clone(),
        is_offline_payment: upstream_response.is_offline_payment,
        is_cancelled: upstream_response.is_cancelled,
        subscription: upstream_response.subscription.clone(),
        current_period_end_date: upstream_response.current_period_end_date.clone(),
        trial_end_date: upstream_response.trial_end_date.clone(),
        has_added_payment_method: upstream_response.has_added_payment_method,
        has_activated_free_trial: upstream_response.has_activated_free_trial,
        is_airgapped: remote.is_airgapped(),
    };

    let commit_result = async {
        store.delete_license(license.id()).await?;
        store.create_license(new_license).await
    }
    .await;

    match commit_result {
        Ok(new_license) => Ok(new_license),
        Err(commit_err) => {
            warn!(license_key = %license.license_key, error = %commit_err, "local deactivate commit failed, attempting best-effort re-activation upstream");
            if let Err(reactivate_err) = remote
                .activate_workspace(crate::remote::types::ActivateRequest {
                    workspace_id: license.workspace_id.clone(),
                    workspace_slug: license.workspace_slug.clone(),
                    license_key: license.license_key.clone(),
                    members_list: Vec::new(),
                })
                .await
            {
                warn!(error = %reactivate_err, "best-effort re-activation after failed deactivate commit also failed");
            }
            Err(commit_err)
        }
    }
}
