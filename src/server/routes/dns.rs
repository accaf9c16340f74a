//! DNS validation endpoint: resolves A/CNAME/TXT/MX records for a host.
//!
//! Not present in the original Go implementation (which leaves DNS checks
//! to the surrounding infra); grounded on the healthcheck engine's own
//! reachability-probing spirit (`healthcheck/probe.rs`) and implemented
//! with `hickory-resolver`, the ecosystem's standard async resolver, since
//! the teacher has no DNS dependency of its own to borrow from.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use serde::{Deserialize, Serialize};

use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DnsValidateRequest {
    #[serde(default)]
    pub host: String,
}

#[derive(Debug, Default, Serialize)]
pub struct DnsValidateResponse {
    pub a: Vec<String>,
    pub cname: Vec<String>,
    pub txt: Vec<String>,
    pub mx: Vec<String>,
}

pub async fn validate(
    State(_state): State<AppState>,
    Json(request): Json<DnsValidateRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    if request.host.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "host is required" })),
        );
    }

    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

    let mut response = DnsValidateResponse::default();

    if let Ok(lookup) = resolver.lookup_ip(request.host.as_str()).await {
        response.a = lookup.iter().map(|ip| ip.to_string()).collect();
    }
    if let Ok(lookup) = resolver.txt_lookup(request.host.as_str()).await {
        response.txt = lookup.iter().map(|txt| txt.to_string()).collect();
    }
    if let Ok(lookup) = resolver.mx_lookup(request.host.as_str()).await {
        response.mx = lookup
            .iter()
            .map(|mx| format!("{} {}", mx.preference(), mx.exchange()))
            .collect();
    }
    if let Ok(lookup) = resolver
        .lookup(
            request.host.as_str(),
            hickory_resolver::proto::rr::RecordType::CNAME,
        )
        .await
    {
        response.cname = lookup.iter().map(|rdata| rdata.to_string()).collect();
    }

    let empty = response.a.is_empty() && response.cname.is_empty() && response.txt.is_empty() && response.mx.is_empty();
    if empty {
        return (
            StatusCode::PRECONDITION_FAILED,
            Json(serde_json::json!({ "error": "no dns records found for host" })),
        );
    }

    (StatusCode::OK, Json(serde_json::to_value(response).unwrap()))
}
