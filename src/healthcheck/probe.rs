//! HTTP and TCP probe strategies.
//!
//! Ported from the original Go `HttpHealthCheckMethod` / `TcpHealthCheckMethod`
//! (`monitor/lib/healthcheck/healthcheck_methods.go`). A timed-out HTTP
//! request is treated as "not reachable" rather than as an error, matching
//! the original's `os.IsTimeout` branch.

use std::net::ToSocketAddrs;
use std::time::Duration;

use super::discovery::ServiceData;

/// `(reachable, status_code)` on success; timeouts are folded into
/// `(false, 0)` rather than surfaced as an error.
pub async fn http_probe(
    client: &reqwest::Client,
    service: &ServiceData,
    timeout: Duration,
) -> Result<(bool, u16), String> {
    let url = build_http_url(service);

    let response = client.get(&url).timeout(timeout).send().await;

    match response {
        Ok(resp) => {
            let status = resp.status().as_u16();
            Ok((is_valid_status(status), status))
        }
        Err(err) if err.is_timeout() => Ok((false, 0)),
        Err(err) => Err(err.to_string()),
    }
}

/// `(reachable, 0)` — the original TCP probe carries no status code, only a
/// dial success/failure.
pub async fn tcp_probe(service: &ServiceData, timeout: Duration) -> Result<(bool, u16), String> {
    let host_name = service.host_name.clone();
    let port: u16 = service.port.parse().unwrap_or(0);
    let addr = format!("{host_name}:{port}");

    let connect = tokio::time::timeout(timeout, tokio::net::TcpStream::connect(addr.clone()));

    match connect.await {
        Ok(Ok(_stream)) => Ok((true, 0)),
        Ok(Err(_)) => Ok((false, 0)),
        Err(_elapsed) => Ok((false, 0)),
    }
}

fn build_http_url(service: &ServiceData) -> String {
    let mut url = format!("http://{}", service.host_name);
    if !service.port.is_empty() {
        url.push(':');
        url.push_str(&service.port);
    }
    let path = if service.path.starts_with('/') {
        service.path.clone()
    } else {
        format!("/{}", service.path)
    };
    url.push_str(&path);
    url
}

/// 200 <= status < 399 is considered valid, matching the original's
/// `IsValidStatus`.
fn is_valid_status(status: u16) -> bool {
    (200..399).contains(&status)
}

/// Used by the DNS validation control-API endpoint to confirm a hostname
/// resolves before accepting it; unrelated to the retry-driven probes above
/// but shares this module's networking concerns.
pub fn resolves(host_name: &str) -> bool {
    format!("{host_name}:0").to_socket_addrs().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::healthcheck::discovery::TestMethod;

    fn service(host: &str, port: &str, path: &str) -> ServiceData {
        ServiceData {
            host_name: host.to_string(),
            port: port.to_string(),
            path: path.to_string(),
            test_method: TestMethod::Http,
        }
    }

    #[test]
    fn builds_url_with_port_and_path() {
        let svc = service("web", "9000", "/test");
        assert_eq!(build_http_url(&svc), "http://web:9000/test");
    }

    #[test]
    fn builds_url_without_port() {
        let svc = service("web", "", "/");
        assert_eq!(build_http_url(&svc), "http://web/");
    }

    #[test]
    fn valid_status_range_matches_original() {
        assert!(is_valid_status(200));
        assert!(is_valid_status(204));
        assert!(is_valid_status(398));
        assert!(!is_valid_status(399));
        assert!(!is_valid_status(404));
        assert!(!is_valid_status(500));
        assert!(!is_valid_status(199));
    }

    #[tokio::test]
    async fn tcp_probe_fails_fast_against_closed_port() {
        let svc = service("127.0.0.1", "1", "/");
        let (reachable, _) = tcp_probe(&svc, Duration::from_millis(200)).await.unwrap();
        assert!(!reachable);
    }
}
