//! Feature-flag evaluation (§4.5): four lookup modes by which of
//! `workspace_slug`/`user_id`/`feature_key` are present, always `200 OK`
//! with an empty/false answer on any non-existence path — never a 404.
//!
//! Grounded on `feature_flag_handler.go`'s four `handle*FeatureFlag(s)`
//! functions, which differ only in whether a single key or the whole
//! decrypted map is returned and whether a UserLicense gates the answer.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::crypto;
use crate::error::{MonitorError, MonitorResult};
use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FeatureFlagQuery {
    #[serde(default)]
    pub workspace_slug: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub feature_key: String,
}

#[derive(Debug, Serialize)]
pub struct FeatureFlagResponse {
    pub values: Value,
}

fn single_false(feature_key: &str) -> Json<FeatureFlagResponse> {
    Json(FeatureFlagResponse {
        values: json!({ feature_key: false }),
    })
}

fn empty_map() -> Json<FeatureFlagResponse> {
    Json(FeatureFlagResponse { values: json!({}) })
}

pub async fn evaluate(
    State(state): State<AppState>,
    Json(query): Json<FeatureFlagQuery>,
) -> MonitorResult<Json<FeatureFlagResponse>> {
    if query.workspace_slug.is_empty() {
        return Err(MonitorError::validation("workspace_slug is required"));
    }

    let want_single = !query.feature_key.is_empty();
    let want_user = !query.user_id.is_empty();

    let Ok(Some(license)) = state.store.find_license_by_workspace_slug(&query.workspace_slug).await else {
        return Ok(if want_single { single_false(&query.feature_key) } else { empty_map() });
    };

    if want_user {
        let Ok(user_id) = uuid::Uuid::parse_str(&query.user_id) else {
            return Ok(if want_single { single_false(&query.feature_key) } else { empty_map() });
        };
        let Ok(Some(membership)) = state.store.user_license_for_user(license.id(), user_id).await else {
            return Ok(if want_single { single_false(&query.feature_key) } else { empty_map() });
        };
        if !membership.is_active || license.is_free() {
            return Ok(if want_single { single_false(&query.feature_key) } else { empty_map() });
        }
    }

    let Ok(Some(flags)) = state
        .store
        .flags_for_license(license.id(), &state.config.app_version)
        .await
    else {
        return Ok(if want_single { single_false(&query.feature_key) } else { empty_map() });
    };

    let envelope = flags.into_envelope();
    let Ok(pem) = state.config.private_key_pem() else {
        return Ok(if want_single { single_false(&query.feature_key) } else { empty_map() });
    };
    let Ok(private_key) = crypto::parse_private_key(&pem) else {
        return Ok(if want_single { single_false(&query.feature_key) } else { empty_map() });
    };
    let Ok(decrypted): Result<Value, _> = crypto::decrypt_envelope(&envelope, &private_key) else {
        return Ok(if want_single { single_false(&query.feature_key) } else { empty_map() });
    };

    Ok(if want_single {
        let value = decrypted.get(&query.feature_key).cloned().unwrap_or(Value::Bool(false));
        Json(FeatureFlagResponse {
            values: json!({ query.feature_key: value }),
        })
    } else {
        Json(FeatureFlagResponse { values: decrypted })
    })
}
