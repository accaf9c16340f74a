//! File-backed `RemoteApi` for air-gapped deployments.
//!
//! Ported from `AirgappedPrimeApi` (`apps/monitor/lib/api/airgapped_api.go`):
//! activation/sync reads `<workspace_id>_<app_version>.json` from disk,
//! decrypts it with the configured private key, repairs the timestamp
//! quirk described below, and treats the result as the upstream payload.
//! Everything else the real API offers (seat changes, proration, payment
//! links) has no air-gapped meaning and returns a classified error, exactly
//! as the original's stub methods do.

use async_trait::async_trait;

use crate::crypto::{self, EncryptedEnvelope};
use crate::error::{MonitorError, MonitorResult};

use super::types::{
    ActivateRequest, DeactivateRequest, FlagsResponse, LicensePayload, ModifySeatsRequest,
    StatusPayload, SyncRequest,
};
use super::RemoteApi;

pub struct AirgappedApi {
    private_key_pem: String,
    app_version: String,
    data_dir: String,
}

impl AirgappedApi {
    pub fn new(private_key_pem: impl Into<String>, app_version: impl Into<String>, data_dir: impl Into<String>) -> Self {
        Self {
            private_key_pem: private_key_pem.into(),
            app_version: app_version.into(),
            data_dir: data_dir.into(),
        }
    }

    fn activation_file_path(&self, workspace_id: &str) -> String {
        format!("{}/{workspace_id}_{}.json", self.data_dir, self.app_version)
    }

    /// Decrypt the raw activation-file bytes and repair its timestamp
    /// quirk, returning the resulting license payload.
    pub fn decrypt_activation_payload(&self, raw_bytes: &[u8]) -> MonitorResult<LicensePayload> {
        let envelope: EncryptedEnvelope = serde_json::from_slice(raw_bytes)
            .map_err(|err| MonitorError::crypto(format!("malformed activation file: {err}")))?;
        let private_key = crypto::parse_private_key(&self.private_key_pem)?;
        let plaintext = crypto::decrypt_envelope_bytes(&envelope, &private_key)?;

        let raw_json = String::from_utf8(plaintext)
            .map_err(|err| MonitorError::crypto(format!("decrypted payload is not utf-8: {err}")))?;
        let fixed = fix_timestamp_format(&raw_json);

        serde_json::from_str(&fixed)
            .map_err(|err| MonitorError::crypto(format!("failed to parse fixed payload: {err}")))
    }

    fn read_and_decrypt(&self, workspace_id: &str) -> MonitorResult<LicensePayload> {
        let path = self.activation_file_path(workspace_id);
        let raw_bytes = std::fs::read(&path)
            .map_err(|err| MonitorError::upstream_transport(format!("failed to read activation file {path}: {err}")))?;
        self.decrypt_activation_payload(&raw_bytes)
    }
}

/// Rewrite `"None"` to `null` and repair `YYYY-MM-DD HH:MM:SS` timestamps
/// (space-separated date/time) to `YYYY-MM-DDTHH:MM:SS` inside quoted JSON
/// strings, matching the original's `fixTimestampFormat` exactly — same
/// fixed offsets (4, 7, 10, 13, 16) and the same 19-character minimum
/// length check.
pub fn fix_timestamp_format(raw: &str) -> String {
    let replaced = raw.replace("\"None\"", "null");
    let bytes = replaced.as_bytes();
    let mut result = String::with_capacity(replaced.len());
    let mut i = 0usize;

    while i < bytes.len() {
        let Some(start_rel) = replaced[i..].find('"') else {
            result.push_str(&replaced[i..]);
            break;
        };
        let start = i + start_rel;
        result.push_str(&replaced[i..=start]);

        let Some(end_rel) = replaced[start + 1..].find('"') else {
            result.push_str(&replaced[start + 1..]);
            break;
        };
        let end = start + 1 + end_rel;
        let content = &replaced[start + 1..end];

        if looks_like_space_separated_timestamp(content) {
            let fixed_content = format!("{}T{}", &content[..10], &content[11..]);
            result.push_str(&fixed_content);
        } else {
            result.push_str(content);
        }
        result.push('"');

        i = end + 1;
    }

    result
}

fn looks_like_space_separated_timestamp(content: &str) -> bool {
    let bytes = content.as_bytes();
    bytes.len() >= 19
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes[10] == b' '
        && bytes[13] == b':'
        && bytes[16] == b':'
}

#[async_trait]
impl RemoteApi for AirgappedApi {
    fn is_airgapped(&self) -> bool {
        true
    }

    async fn post_service_status(&self, _payload: StatusPayload) -> MonitorResult<()> {
        Ok(())
    }

    async fn initialize_free_workspace(
        &self,
        _workspace_id: &str,
        _workspace_slug: &str,
    ) -> MonitorResult<LicensePayload> {
        Err(MonitorError::upstream_semantic(
            "free workspace initialization is not supported in air-gapped mode",
        ))
    }

    async fn activate_workspace(&self, _request: ActivateRequest) -> MonitorResult<LicensePayload> {
        Err(MonitorError::upstream_semantic(
            "activation is not supported in air-gapped mode; upload the license file instead",
        ))
    }

    async fn sync_license(&self, request: SyncRequest) -> MonitorResult<LicensePayload> {
        // The original keys the activation file by workspace id, not
        // license key; license_key here doubles as the workspace id for
        // callers that only have the license context.
        self.read_and_decrypt(&request.license_key)
    }

    async fn deactivate_license(&self, request: DeactivateRequest) -> MonitorResult<LicensePayload> {
        let path = self.activation_file_path(&request.workspace_id);
        let _ = std::fs::remove_file(&path);

        Ok(LicensePayload {
            instance_id: request.workspace_id.clone(),
            workspace_id: request.workspace_id,
            license_key: generate_mock_license_key(),
            product: "FREE".to_string(),
            product_type: "FREE".to_string(),
            seats: 1,
            free_seats: 12,
            interval: "month".to_string(),
            ..Default::default()
        })
    }

    async fn modify_seats(&self, _request: ModifySeatsRequest) -> MonitorResult<LicensePayload> {
        Err(MonitorError::upstream_semantic(
            "seat changes are not supported in air-gapped mode",
        ))
    }

    async fn fetch_flags(&self, _license_key: &str, _version: &str) -> MonitorResult<FlagsResponse> {
        Err(MonitorError::upstream_semantic(
            "feature flags are not supported in air-gapped mode",
        ))
    }
}

fn generate_mock_license_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixes_space_separated_timestamp_inside_quotes() {
        let input = r#"{"current_period_end_date":"2024-05-01 12:34:56+00:00","trial_end_date":"None"}"#;
        let fixed = fix_timestamp_format(input);
        assert!(fixed.contains("\"2024-05-01T12:34:56+00:00\""));
        assert!(fixed.contains("\"trial_end_date\":null"));
    }

    #[test]
    fn leaves_non_timestamp_strings_untouched() {
        let input = r#"{"workspace_slug":"acme"}"#;
        assert_eq!(fix_timestamp_format(input), input);
    }

    #[test]
    fn is_idempotent_on_already_fixed_input() {
        let once = fix_timestamp_format(r#"{"d":"2024-05-01 12:34:56+00:00"}"#);
        let twice = fix_timestamp_format(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn does_not_touch_keys_only_string_values() {
        // A key can't itself contain this shape in realistic payloads, but
        // guard the scan handles back-to-back quoted segments correctly.
        let input = r#"{"a":"short","b":"2024-05-01 12:34:56Z"}"#;
        let fixed = fix_timestamp_format(input);
        assert!(fixed.contains("\"short\""));
        assert!(fixed.contains("\"2024-05-01T12:34:56Z\""));
    }
}
