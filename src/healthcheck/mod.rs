//! Concurrent, per-service health probing with confirm-tries, max-retries,
//! timeout, and majority-based reachability decisions.
//!
//! Ported line-for-line in spirit from the original Go implementation
//! (`monitor/lib/healthcheck/healthcheck.go`,
//! `monitor/lib/healthcheck/healthcheck_methods.go`): service discovery via
//! `SERVICE_<METHOD>_<NAME>` environment variables, one task per discovered
//! service, sequential confirm-tries within a service's retry loop, and the
//! exact five-branch `should_retry` decision tree.

mod discovery;
mod probe;

pub use discovery::{discover_services, ServiceData, TestMethod};
pub use probe::{http_probe, tcp_probe};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HealthCheckError {
    #[error("the key passed is not valid, as there are fewer blocks than required")]
    InvalidKeyBlockLength,

    #[error("the test id ({0}) does not match any available test strategy yet")]
    InvalidTestId(String),

    #[error("expecting a hostname, but none provided")]
    HostnameAbsent,

    #[error("the test strategy for service ({0}) does not exist")]
    UnknownTestMethod(String),
}

/// Reachability outcome of a single probe attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Reachable,
    NotReachable,
}

/// Final, aggregated status for one discovered service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckStatus {
    pub service_name: String,
    pub status: ServiceStatus,
    pub status_code: u16,
}

/// Policy parameters for the retry/confirm protocol.
#[derive(Debug, Clone, Copy)]
pub struct HealthCheckOptions {
    /// Number of outer retry iterations.
    pub max_retries: u32,
    /// Number of probes per iteration used to decide reachability.
    pub confirm_tries: u32,
    pub retry_duration: Duration,
    pub timeout_duration: Duration,
}

impl Default for HealthCheckOptions {
    fn default() -> Self {
        Self {
            max_retries: 5,
            confirm_tries: 3,
            retry_duration: Duration::from_secs(2),
            timeout_duration: Duration::from_secs(5),
        }
    }
}

/// Accumulated result of one health-check pass across all discovered
/// services: `{statuses[], errors[]}` as specified in §4.3.
#[derive(Debug, Clone, Default)]
pub struct AccumulatedHealthCheck {
    pub statuses: Vec<HealthCheckStatus>,
    pub errors: Vec<String>,
}

/// Deterministic decision of whether a service's retry loop should iterate
/// again, given the boolean reachability sequence observed so far.
///
/// Exactly the five-branch decision tree from §4.3 / the original Go
/// `ShouldRetry`:
/// - last result false => retry
/// - `|R| == 1` (and last true) => accept
/// - second-to-last false => retry
/// - otherwise => retry iff `count(true) < |R| / 2`
///
/// Panics if `results` is empty — the spec states this case is "undefined
/// (never called)".
pub fn should_retry(results: &[bool]) -> bool {
    assert!(!results.is_empty(), "should_retry called with empty results");

    let last = *results.last().unwrap();
    if !last {
        return true;
    }

    if results.len() == 1 {
        return false;
    }

    let second_to_last = results[results.len() - 2];
    if !second_to_last {
        return true;
    }

    let true_count = results.iter().filter(|r| **r).count();
    true_count < results.len() / 2
}

/// Concurrent, retry/confirm-aware health-check engine.
pub struct HealthCheckEngine {
    http_client: reqwest::Client,
}

impl Default for HealthCheckEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthCheckEngine {
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
        }
    }

    /// Run one health-check pass over every `SERVICE_`-prefixed environment
    /// variable, probing all services concurrently, and return the
    /// accumulated statuses and errors.
    ///
    /// A single engine error (e.g. an unknown test method) cancels the
    /// in-flight probe batch, matching §4.3's aggregation contract.
    pub async fn get_accumulated_health_check(
        &self,
        token: CancellationToken,
        options: HealthCheckOptions,
    ) -> AccumulatedHealthCheck {
        if token.is_cancelled() {
            return AccumulatedHealthCheck::default();
        }

        let services = match discover_services(std::env::vars()) {
            Ok(services) => services,
            Err(err) => {
                return AccumulatedHealthCheck {
                    statuses: Vec::new(),
                    errors: vec![err.to_string()],
                }
            }
        };

        let (status_tx, mut status_rx) = mpsc::unbounded_channel();
        let (error_tx, mut error_rx) = mpsc::unbounded_channel();
        let batch_cancel = token.child_token();

        let mut handles = Vec::new();
        for (service_name, service_data) in services {
            let status_tx = status_tx.clone();
            let error_tx = error_tx.clone();
            let batch_cancel = batch_cancel.clone();
            let client = self.http_client.clone();

            handles.push(tokio::spawn(async move {
                let result = run_with_retries(
                    &client,
                    batch_cancel.clone(),
                    &service_name,
                    &service_data,
                    options,
                )
                .await;
                match result {
                    Ok(status) => {
                        let _ = status_tx.send(status);
                    }
                    Err(err) => {
                        batch_cancel.cancel();
                        let _ = error_tx.send(err.to_string());
                    }
                }
            }));
        }
        drop(status_tx);
        drop(error_tx);

        for handle in handles {
            let _ = handle.await;
        }

        let mut statuses = Vec::new();
        while let Ok(status) = status_rx.try_recv() {
            statuses.push(status);
        }
        let mut errors = Vec::new();
        while let Ok(err) = error_rx.try_recv() {
            errors.push(err);
        }

        AccumulatedHealthCheck { statuses, errors }
    }
}

async fn run_with_retries(
    client: &reqwest::Client,
    token: CancellationToken,
    service_name: &str,
    service_data: &ServiceData,
    options: HealthCheckOptions,
) -> Result<HealthCheckStatus, HealthCheckError> {
    let mut healthy = false;
    let mut failure_status: u16 = 0;

    for _retry in 0..options.max_retries {
        if token.is_cancelled() {
            break;
        }

        let mut results = Vec::with_capacity(options.confirm_tries as usize);
        for _confirm in 0..options.confirm_tries {
            let probe_result = match service_data.test_method {
                TestMethod::Http => {
                    probe::http_probe(client, service_data, options.timeout_duration).await
                }
                TestMethod::Tcp => {
                    probe::tcp_probe(service_data, options.timeout_duration).await
                }
            };

            match probe_result {
                Ok((reachable, status_code)) => {
                    results.push(reachable);
                    if !reachable {
                        failure_status = status_code;
                    }
                }
                Err(err) => {
                    warn!(service = %service_name, error = %err, "probe error, treating as unreachable");
                    results.push(false);
                }
            }

            tokio::time::sleep(options.retry_duration).await;
        }

        healthy = !should_retry(&results);
        if healthy {
            break;
        }
    }

    if healthy {
        Ok(HealthCheckStatus {
            service_name: service_name.to_string(),
            status: ServiceStatus::Reachable,
            status_code: 200,
        })
    } else {
        if failure_status == 0 {
            failure_status = 500;
        }
        Ok(HealthCheckStatus {
            service_name: service_name.to_string(),
            status: ServiceStatus::NotReachable,
            status_code: failure_status,
        })
    }
}

/// Convenience wrapper used by callers that already have a pre-built service
/// map (e.g. tests) rather than reading from the process environment.
pub async fn run_health_check_for_services(
    engine: &HealthCheckEngine,
    services: HashMap<String, ServiceData>,
    options: HealthCheckOptions,
    token: CancellationToken,
) -> AccumulatedHealthCheck {
    let (status_tx, mut status_rx) = mpsc::unbounded_channel();
    let (error_tx, mut error_rx) = mpsc::unbounded_channel();
    let client = Arc::new(engine.http_client.clone());
    let batch_cancel = token.child_token();

    let mut handles = Vec::new();
    for (service_name, service_data) in services {
        let status_tx = status_tx.clone();
        let error_tx = error_tx.clone();
        let batch_cancel = batch_cancel.clone();
        let client = client.clone();

        handles.push(tokio::spawn(async move {
            let result = run_with_retries(&client, batch_cancel.clone(), &service_name, &service_data, options).await;
            match result {
                Ok(status) => {
                    let _ = status_tx.send(status);
                }
                Err(err) => {
                    batch_cancel.cancel();
                    let _ = error_tx.send(err.to_string());
                }
            }
        }));
    }
    drop(status_tx);
    drop(error_tx);

    for handle in handles {
        let _ = handle.await;
    }

    let mut statuses = Vec::new();
    while let Ok(status) = status_rx.try_recv() {
        statuses.push(status);
    }
    let mut errors = Vec::new();
    while let Ok(err) = error_rx.try_recv() {
        errors.push(err);
    }

    AccumulatedHealthCheck { statuses, errors }
}
