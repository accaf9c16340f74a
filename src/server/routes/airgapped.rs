//! Air-gapped activation file upload (§4.5's "Airgapped activation upload").
//!
//! Grounded on `GetAirgappedActivationHandler`/`PopulateDatabaseWithFilePayload`
//! (`airgapped_activation.go`): a multipart form with `activation_file`,
//! `workspace_id`, `workspace_slug`, `members_list`, validated in the exact
//! order the original checks it before any write.

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::crypto::{self, EncryptedEnvelope};
use crate::error::{MonitorError, MonitorResult};
use crate::remote::types::MemberPayload;
use crate::server::state::AppState;
use crate::store::repository::{MemberInput, NewLicense};

#[derive(Debug, Deserialize)]
struct AirgappedLicensePayload {
    license_key: String,
    product: String,
    product_type: String,
    seats: i64,
    free_seats: i64,
    interval: String,
    is_offline_payment: bool,
    is_cancelled: bool,
    #[serde(default)]
    subscription: String,
    current_period_end_date: Option<String>,
    trial_end_date: Option<String>,
    #[serde(default)]
    has_added_payment_method: bool,
    #[serde(default)]
    has_activated_free_trial: bool,
    flags: EncryptedEnvelope,
    version: String,
}

struct UploadFields {
    workspace_id: String,
    workspace_slug: String,
    members_list: String,
    file_content_type: Option<String>,
    file_bytes: Vec<u8>,
}

async fn collect_fields(mut multipart: Multipart) -> MonitorResult<UploadFields> {
    let mut workspace_id = String::new();
    let mut workspace_slug = String::new();
    let mut members_list = "[]".to_string();
    let mut file_content_type = None;
    let mut file_bytes = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| MonitorError::validation(format!("malformed multipart body: {err}")))?
    {
        match field.name().unwrap_or_default() {
            "workspace_id" => {
                workspace_id = field.text().await.unwrap_or_default();
            }
            "workspace_slug" => {
                workspace_slug = field.text().await.unwrap_or_default();
            }
            "members_list" => {
                members_list = field.text().await.unwrap_or_default();
            }
            "activation_file" => {
                file_content_type = field.content_type().map(|s| s.to_string());
                file_bytes = field
                    .bytes()
                    .await
                    .map_err(|err| MonitorError::validation(format!("failed to read file: {err}")))?
                    .to_vec();
            }
            _ => {}
        }
    }

    Ok(UploadFields {
        workspace_id,
        workspace_slug,
        members_list,
        file_content_type,
        file_bytes,
    })
}

pub async fn activate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> MonitorResult<Json<serde_json::Value>> {
    let fields = collect_fields(multipart).await?;

    if fields.workspace_id.is_empty() || fields.workspace_slug.is_empty() || fields.members_list == "[]" {
        return Err(MonitorError::validation("no workspace id, slug or members list provided"));
    }

    if fields.file_bytes.is_empty() {
        return Err(MonitorError::validation(
            "no file uploaded. please upload the activation file.",
        ));
    }

    if fields.file_content_type.as_deref() != Some("application/json") {
        return Err(MonitorError::validation(
            "unsupported file type. please upload a .json file.",
        ));
    }

    std::fs::write(format!("{}.json", fields.workspace_id), &fields.file_bytes)
        .map_err(|err| MonitorError::upstream_transport(format!("failed to persist activation file: {err}")))?;

    let envelope: EncryptedEnvelope = serde_json::from_slice(&fields.file_bytes)
        .map_err(|err| MonitorError::crypto(format!("failed to parse the file: {err}")))?;
    let pem = state
        .config
        .private_key_pem()
        .map_err(|err| MonitorError::configuration(err.to_string()))?;
    let private_key = crypto::parse_private_key(&pem)?;
    let plaintext = crypto::decrypt_envelope_bytes(&envelope, &private_key)?;
    let raw_json = String::from_utf8(plaintext)
        .map_err(|err| MonitorError::crypto(format!("decrypted payload is not utf-8: {err}")))?;
    let fixed = crate::remote::airgapped::fix_timestamp_format(&raw_json);

    let payload: AirgappedLicensePayload = serde_json::from_str(&fixed)
        .map_err(|err| MonitorError::crypto(format!("failed to parse the file: {err}")))?;

    let members: Vec<MemberPayload> = serde_json::from_str(&fields.members_list)
        .map_err(|err| MonitorError::validation(format!("failed to parse the members list: {err}")))?;

    let workspace_id = Uuid::parse_str(&fields.workspace_id)
        .map_err(|err| MonitorError::validation(format!("invalid workspace id: {err}")))?;
    let instance_id = Uuid::parse_str(&state.config.instance_id.clone().unwrap_or_default())
        .unwrap_or_else(|_| Uuid::new_v4());

    let member_inputs: Vec<MemberInput> = members
        .iter()
        .map(|m| {
            Ok(MemberInput {
                user_id: Uuid::parse_str(&m.user_id)
                    .map_err(|err| MonitorError::validation(format!("invalid member user id: {err}")))?,
                role: m.user_role,
            })
        })
        .collect::<MonitorResult<Vec<_>>>()?;

    let new_license = NewLicense {
        license_key: payload.license_key,
        instance_id,
        workspace_id,
        workspace_slug: fields.workspace_slug,
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
        is_airgapped: true,
    };

    state
        .store
        .create_airgapped_license(new_license, &payload.version, &payload.flags, &member_inputs)
        .await?;

    Ok(Json(json!({ "message": "Workspace activated successfully" })))
}
