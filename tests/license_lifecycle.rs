//! End-to-end scenarios driven against an in-memory store and a stubbed
//! upstream, one test per numbered scenario.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use uuid::Uuid;

use monitor_core::config::Config;
use monitor_core::error::{MonitorError, MonitorResult};
use monitor_core::remote::types::{
    ActivateRequest, DeactivateRequest, FlagsResponse, LicensePayload, MemberPayload,
    ModifySeatsRequest, StatusPayload, SyncRequest,
};
use monitor_core::remote::RemoteApi;
use monitor_core::server::routes::{flags, licenses};
use monitor_core::server::state::AppState;
use monitor_core::store::repository::{MemberInput, NewLicense};
use monitor_core::store::{init_pool, Store};
use monitor_core::sync;

struct StubRemote {
    activate_response: Option<LicensePayload>,
    sync_response: Option<Result<LicensePayload, String>>,
    flags_response: Option<FlagsResponse>,
}

impl StubRemote {
    fn new() -> Self {
        Self {
            activate_response: None,
            sync_response: None,
            flags_response: None,
        }
    }
}

#[async_trait]
impl RemoteApi for StubRemote {
    fn is_airgapped(&self) -> bool {
        false
    }

    async fn post_service_status(&self, _payload: StatusPayload) -> MonitorResult<()> {
        Ok(())
    }

    async fn initialize_free_workspace(&self, _workspace_id: &str, _workspace_slug: &str) -> MonitorResult<LicensePayload> {
        unimplemented!()
    }

    async fn activate_workspace(&self, _request: ActivateRequest) -> MonitorResult<LicensePayload> {
        Ok(self.activate_response.clone().expect("activate_response not configured"))
    }

    async fn sync_license(&self, _request: SyncRequest) -> MonitorResult<LicensePayload> {
        match self.sync_response.clone().expect("sync_response not configured") {
            Ok(payload) => Ok(payload),
            Err(message) => Err(MonitorError::upstream_semantic(message)),
        }
    }

    async fn deactivate_license(&self, _request: DeactivateRequest) -> MonitorResult<LicensePayload> {
        unimplemented!()
    }

    async fn modify_seats(&self, _request: ModifySeatsRequest) -> MonitorResult<LicensePayload> {
        unimplemented!()
    }

    async fn fetch_flags(&self, _license_key: &str, _version: &str) -> MonitorResult<FlagsResponse> {
        Ok(self.flags_response.clone().expect("flags_response not configured"))
    }
}

fn test_config() -> Config {
    Config {
        prime_host: "https://prime.example".to_string(),
        app_domain: "example.plane.so".to_string(),
        app_version: "v1.0.0".to_string(),
        machine_signature: "sig".to_string(),
        instance_id: Some(Uuid::new_v4().to_string()),
        deploy_platform: None,
        port: 8080,
        private_key_b64: String::new(),
        monitor_token: "secret".to_string(),
        db_path: ":memory:".to_string(),
        airgapped: false,
    }
}

async fn test_store() -> Store {
    Store::new(init_pool(":memory:").await.unwrap())
}

/// Scenario 1: fresh paid activation populates License, UserLicense, and
/// Flags rows from the upstream response.
#[tokio::test]
async fn fresh_paid_activation_populates_license_member_and_flags() {
    let store = test_store().await;
    let config = Arc::new(test_config());

    let workspace_id = Uuid::new_v4();
    let mut remote = StubRemote::new();
    remote.activate_response = Some(LicensePayload {
        instance_id: Uuid::new_v4().to_string(),
        license_key: "K".to_string(),
        workspace_id: workspace_id.to_string(),
        workspace_slug: "acme".to_string(),
        product: "Plane Pro".to_string(),
        product_type: "PRO".to_string(),
        seats: 5,
        free_seats: 25,
        interval: "MONTHLY".to_string(),
        ..Default::default()
    });
    remote.flags_response = Some(FlagsResponse {
        envelope: monitor_core::crypto::EncryptedEnvelope {
            aes_key: "a".into(),
            nonce: "b".into(),
            cipher_text: "c".into(),
            tag: "d".into(),
        },
        app_version: config.app_version.clone(),
    });

    let state = AppState {
        store: store.clone(),
        remote: Arc::new(remote),
        config: config.clone(),
    };

    let request = licenses::ActivateApiRequest {
        workspace_id,
        workspace_slug: "acme".to_string(),
        license_key: "K".to_string(),
        members_list: vec![MemberPayload {
            user_id: Uuid::new_v4().to_string(),
            user_role: 15,
        }],
    };

    let response = licenses::activate(axum::extract::State(state), axum::Json(request))
        .await
        .unwrap()
        .0;

    assert_eq!(response.product_type, "PRO");
    assert_eq!(response.seats, 5);

    let license = store.find_license_by_workspace_id(workspace_id).await.unwrap().unwrap();
    assert!(store.latest_flags_for_license(license.id()).await.unwrap().is_some());
}

/// Scenario 2: a sync response with seats=1 and two billed members leaves
/// only one of them active, and the outcome is idempotent on replay.
#[tokio::test]
async fn seat_starvation_is_idempotent_on_replay() {
    let store = test_store().await;

    let u1 = Uuid::new_v4();
    let u2 = Uuid::new_v4();
    let license = store
        .create_license(NewLicense {
            seats: 1,
            ..NewLicense::free(Uuid::new_v4(), Uuid::new_v4(), "starved")
        })
        .await
        .unwrap();
    let license = store
        .update_license(
            license.id(),
            "Plane Pro",
            "PRO",
            1,
            5,
            "MONTHLY",
            false,
            false,
            "",
            None,
            None,
            false,
            false,
        )
        .await
        .unwrap();
    store
        .replace_user_licenses(license.id(), &[(MemberInput { user_id: u1, role: 15 }, true)])
        .await
        .unwrap();

    let mut remote = StubRemote::new();
    remote.sync_response = Some(Ok(LicensePayload {
        product: "Plane Pro".to_string(),
        product_type: "PRO".to_string(),
        seats: 1,
        free_seats: 5,
        interval: "MONTHLY".to_string(),
        members_list: vec![
            MemberPayload { user_id: u1.to_string(), user_role: 15 },
            MemberPayload { user_id: u2.to_string(), user_role: 15 },
        ],
        ..Default::default()
    }));
    remote.flags_response = Some(FlagsResponse {
        envelope: monitor_core::crypto::EncryptedEnvelope {
            aes_key: "a".into(),
            nonce: "b".into(),
            cipher_text: "c".into(),
            tag: "d".into(),
        },
        app_version: "v1".to_string(),
    });

    for _ in 0..2 {
        sync::refresh_one(&store, &remote, &license, "v1").await.unwrap();
        let members = store.user_licenses_for_license(license.id()).await.unwrap();
        assert_eq!(members.len(), 2);
        let m1 = members.iter().find(|m| m.user_id() == u1).unwrap();
        let m2 = members.iter().find(|m| m.user_id() == u2).unwrap();
        assert!(m1.is_active);
        assert!(!m2.is_active);
    }
}

/// Scenario 3: a License unverified for more than the grace window is
/// downgraded to FREE when upstream sync fails, clearing members and flags.
#[tokio::test]
async fn grace_window_expiry_downgrades_to_free() {
    let store = test_store().await;

    let license = store
        .create_license(NewLicense {
            product: "Plane Pro".to_string(),
            product_type: "PRO".to_string(),
            seats: 3,
            ..NewLicense::free(Uuid::new_v4(), Uuid::new_v4(), "lapsed")
        })
        .await
        .unwrap();

    let stale = (Utc::now() - ChronoDuration::days(8)).to_rfc3339();
    sqlx::query("UPDATE licenses SET last_verified_at = ?1 WHERE id = ?2")
        .bind(&stale)
        .bind(license.id().to_string())
        .execute(store.pool())
        .await
        .unwrap();
    let license = store.find_license_by_id(license.id()).await.unwrap().unwrap();

    store
        .replace_user_licenses(license.id(), &[(MemberInput { user_id: Uuid::new_v4(), role: 15 }, true)])
        .await
        .unwrap();
    store
        .upsert_flags(
            license.id(),
            "v1",
            &monitor_core::crypto::EncryptedEnvelope {
                aes_key: "a".into(),
                nonce: "b".into(),
                cipher_text: "c".into(),
                tag: "d".into(),
            },
        )
        .await
        .unwrap();

    let mut remote = StubRemote::new();
    remote.sync_response = Some(Err("upstream unreachable".to_string()));

    let result = sync::refresh_one(&store, &remote, &license, "v1").await.unwrap();

    assert_eq!(result.product_type, "FREE");
    assert_eq!(result.seats, 0);
    assert_eq!(result.free_seats, 12);
    assert!(store.user_licenses_for_license(license.id()).await.unwrap().is_empty());
    assert!(store.latest_flags_for_license(license.id()).await.unwrap().is_none());
}

/// Scenario 6: evaluating a feature flag for a FREE workspace returns a
/// `false` default with no decryption attempted.
#[tokio::test]
async fn feature_flag_eval_defaults_false_for_free_plan() {
    let store = test_store().await;
    let config = Arc::new(test_config());

    let license = store
        .create_license(NewLicense::free(Uuid::new_v4(), Uuid::new_v4(), "freeplan"))
        .await
        .unwrap();
    let user_id = Uuid::new_v4();
    store
        .replace_user_licenses(license.id(), &[(MemberInput { user_id, role: 15 }, true)])
        .await
        .unwrap();

    let state = AppState {
        store,
        remote: Arc::new(StubRemote::new()),
        config,
    };

    let query = flags::FeatureFlagQuery {
        workspace_slug: "freeplan".to_string(),
        user_id: user_id.to_string(),
        feature_key: "x".to_string(),
    };

    let response = flags::evaluate(axum::extract::State(state), axum::Json(query)).await.unwrap();
    assert_eq!(response.0.values, serde_json::json!({ "x": false }));
}
