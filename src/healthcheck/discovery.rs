//! `SERVICE_<METHOD>_<NAME>` environment variable discovery.
//!
//! Ported from the original Go `GetServiceFromEnvironment` /
//! `ParseKeyValue` (`monitor/lib/healthcheck/healthcheck.go`): every
//! environment variable prefixed `SERVICE_` names one service to probe, with
//! the test method embedded in the key and the host/port/path embedded in
//! the value.

use std::collections::HashMap;

use super::HealthCheckError;

const BLOCK_PART_LENGTH: usize = 3;
const PARSE_DELIMITER: char = '_';

/// Which probe strategy to run against a discovered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestMethod {
    Http,
    Tcp,
}

impl TestMethod {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_uppercase().as_str() {
            "HTTP" => Some(Self::Http),
            "TCP" => Some(Self::Tcp),
            _ => None,
        }
    }
}

/// Host/port/path/method resolved for one discovered service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceData {
    pub host_name: String,
    pub port: String,
    pub path: String,
    pub test_method: TestMethod,
}

/// Build the service map from an iterator of `(key, value)` environment
/// variable pairs (usually `std::env::vars()`), keeping only the
/// `SERVICE_`-prefixed ones.
///
/// Returns the first parse error encountered, matching the original's
/// eager-return-on-error behavior.
pub fn discover_services(
    vars: impl Iterator<Item = (String, String)>,
) -> Result<HashMap<String, ServiceData>, HealthCheckError> {
    let mut services = HashMap::new();

    for (key, value) in vars {
        if let Some(stripped) = key.strip_prefix("SERVICE_") {
            let _ = stripped;
            let (name, data) = parse_key_value(&key, &value)?;
            services.insert(name, data);
        }
    }

    Ok(services)
}

/// Parse one `SERVICE_<METHOD>_<NAME>` key and its `host[:port][/path]`
/// value into a `(name, ServiceData)` pair.
fn parse_key_value(key: &str, value: &str) -> Result<(String, ServiceData), HealthCheckError> {
    let blocks: Vec<&str> = key.split(PARSE_DELIMITER).collect();
    if blocks.len() < BLOCK_PART_LENGTH {
        return Err(HealthCheckError::InvalidKeyBlockLength);
    }

    let service_name = blocks[BLOCK_PART_LENGTH - 1].to_string();
    let test_method_raw = blocks[1].to_uppercase();
    let test_method = TestMethod::parse(&test_method_raw)
        .ok_or_else(|| HealthCheckError::InvalidTestId(test_method_raw.clone()))?;

    let mut url_components = value.splitn(2, '/');
    let host_port = url_components.next().unwrap_or("");
    let rest_path = url_components.next();

    let mut value_blocks = host_port.splitn(2, ':');
    let host_name = value_blocks.next().unwrap_or("").to_string();
    let port = value_blocks.next().unwrap_or("").to_string();

    if host_name.is_empty() {
        return Err(HealthCheckError::HostnameAbsent);
    }

    let path = match rest_path {
        Some(rest) => format!("/{rest}"),
        None => "/".to_string(),
    };

    Ok((
        service_name,
        ServiceData {
            host_name,
            port,
            path,
            test_method,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Iterator<Item = (String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn parses_host_port_and_path() {
        let (name, data) = parse_key_value("SERVICE_HTTP_web", "web:9000/test").unwrap();
        assert_eq!(name, "web");
        assert_eq!(data.host_name, "web");
        assert_eq!(data.port, "9000");
        assert_eq!(data.path, "/test");
        assert_eq!(data.test_method, TestMethod::Http);
    }

    #[test]
    fn defaults_path_to_root_when_absent() {
        let (_, data) = parse_key_value("SERVICE_TCP_redis", "redis:6379").unwrap();
        assert_eq!(data.path, "/");
        assert_eq!(data.test_method, TestMethod::Tcp);
    }

    #[test]
    fn rejects_unknown_test_method() {
        let err = parse_key_value("SERVICE_FOO_web", "web:9000").unwrap_err();
        assert_eq!(err, HealthCheckError::InvalidTestId("FOO".to_string()));
    }

    #[test]
    fn rejects_missing_hostname() {
        let err = parse_key_value("SERVICE_HTTP_web", "").unwrap_err();
        assert_eq!(err, HealthCheckError::HostnameAbsent);
    }

    #[test]
    fn rejects_too_few_key_blocks() {
        let err = parse_key_value("SERVICE_HTTP", "web:9000").unwrap_err();
        assert_eq!(err, HealthCheckError::InvalidKeyBlockLength);
    }

    #[test]
    fn ignores_non_service_prefixed_vars() {
        let discovered = discover_services(vars(&[
            ("PATH", "/usr/bin"),
            ("SERVICE_HTTP_api", "api:8080/health"),
        ]))
        .unwrap();
        assert_eq!(discovered.len(), 1);
        assert!(discovered.contains_key("api"));
    }
}
