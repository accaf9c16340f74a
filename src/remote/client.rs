//! Networked implementation of `RemoteApi`, talking to the upstream
//! control-plane over HTTP.
//!
//! Header set and response-status handling follow §6 exactly: 2xx succeeds,
//! 3xx surfaces the raw body as an error, 4xx decodes `{message, error}` and
//! surfaces `error`, anything else is reported as "unexpected status".
//! Grounded on the original Go `PrimeMonitorApi.prepareRequest`/`doRequest`
//! (`monitor/lib/api/api.go`), adapted from its ad hoc header map to
//! `reqwest::RequestBuilder::header` calls.

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::error::{MonitorError, MonitorResult};

use super::types::{
    ActivateRequest, DeactivateRequest, FlagsRequest, FlagsResponse, LicensePayload,
    MemberPayload, ModifySeatsRequest, StatusPayload, SyncRequest,
};
use super::RemoteApi;

const API_PREFIX: &str = "/api/v2";

pub struct NetworkedApi {
    client: reqwest::Client,
    host: String,
    instance_id: String,
    machine_signature: String,
    app_version: String,
    client_name: String,
}

impl NetworkedApi {
    pub fn new(host: impl Into<String>, instance_id: impl Into<String>, machine_signature: impl Into<String>, app_version: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            host: host.into(),
            instance_id: instance_id.into(),
            machine_signature: machine_signature.into(),
            app_version: app_version.into(),
            client_name: "Prime-Monitor".to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.host)
    }

    async fn post_json<Req, Res>(&self, path: &str, body: &Req) -> MonitorResult<Res>
    where
        Req: Serialize,
        Res: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(self.url(path))
            .header("X-Instance-Id", &self.instance_id)
            .header("X-Machine-Signature", &self.machine_signature)
            .header("X-Client", &self.client_name)
            .header("X-License-Version", &self.app_version)
            .json(body)
            .send()
            .await?;

        handle_response(response).await
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[allow(dead_code)]
    message: Option<String>,
    error: Option<String>,
}

async fn handle_response<Res>(response: reqwest::Response) -> MonitorResult<Res>
where
    Res: for<'de> Deserialize<'de>,
{
    let status = response.status().as_u16();
    let body_text = response.text().await.unwrap_or_default();

    match status {
        200..=299 => serde_json::from_str(&body_text)
            .map_err(|err| MonitorError::upstream_semantic(format!("malformed response body: {err}"))),
        300..=399 => Err(MonitorError::upstream_semantic(body_text)),
        400..=499 => {
            let message = serde_json::from_str::<ErrorBody>(&body_text)
                .ok()
                .and_then(|body| body.error)
                .unwrap_or(body_text);
            Err(MonitorError::upstream_semantic(message))
        }
        other => Err(MonitorError::upstream_semantic(format!(
            "unexpected status code: {other}"
        ))),
    }
}

#[async_trait]
impl RemoteApi for NetworkedApi {
    fn is_airgapped(&self) -> bool {
        false
    }

    async fn post_service_status(&self, payload: StatusPayload) -> MonitorResult<()> {
        let _: serde_json::Value = self.post_json("/monitor/", &payload).await?;
        Ok(())
    }

    async fn initialize_free_workspace(
        &self,
        workspace_id: &str,
        workspace_slug: &str,
    ) -> MonitorResult<LicensePayload> {
        #[derive(Serialize)]
        struct Request<'a> {
            workspace_id: &'a str,
            workspace_slug: &'a str,
        }
        self.post_json(
            "/licenses/initialize/",
            &Request {
                workspace_id,
                workspace_slug,
            },
        )
        .await
    }

    async fn activate_workspace(&self, request: ActivateRequest) -> MonitorResult<LicensePayload> {
        self.post_json("/licenses/activate/", &request).await
    }

    async fn sync_license(&self, request: SyncRequest) -> MonitorResult<LicensePayload> {
        self.post_json("/licenses/sync/", &request).await
    }

    async fn deactivate_license(&self, request: DeactivateRequest) -> MonitorResult<LicensePayload> {
        self.post_json("/licenses/deactivate/", &request).await
    }

    async fn modify_seats(&self, request: ModifySeatsRequest) -> MonitorResult<LicensePayload> {
        self.post_json("/modify-subscriptions/", &request).await
    }

    async fn fetch_flags(&self, license_key: &str, version: &str) -> MonitorResult<FlagsResponse> {
        self.post_json(
            "/flags/",
            &FlagsRequest {
                license_key: license_key.to_string(),
                version: version.to_string(),
            },
        )
        .await
    }
}

/// Helper used by the synchronizer to build the upstream member list from
/// local store rows without leaking `store::models` types into `remote`.
pub fn members_payload(members: &[(String, i64)]) -> Vec<MemberPayload> {
    members
        .iter()
        .map(|(user_id, role)| MemberPayload {
            user_id: user_id.clone(),
            user_role: *role,
        })
        .collect()
}
