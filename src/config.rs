//! Application configuration loaded from environment variables.
//!
//! Follows the teacher's `config.rs`: `dotenvy::dotenv()` in development,
//! then `env::var(...).context(...)` for every required variable so a
//! missing value fails fast with a descriptive chain.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::env;
use std::str::FromStr;

/// One of the platforms the agent may be deployed under. Only required when
/// `INSTANCE_ID` is absent and must be obtained from the upstream
/// initialize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployPlatform {
    Kubernetes,
    DockerCompose,
    Coolify,
}

impl FromStr for DeployPlatform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "KUBERNETES" => Ok(Self::Kubernetes),
            "DOCKER_COMPOSE" => Ok(Self::DockerCompose),
            "COOLIFY" => Ok(Self::Coolify),
            other => bail!("DEPLOY_PLATFORM must be one of KUBERNETES/DOCKER_COMPOSE/COOLIFY, got {other}"),
        }
    }
}

/// Agent-wide configuration, loaded once at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    pub prime_host: String,
    pub app_domain: String,
    pub app_version: String,
    pub machine_signature: String,
    pub instance_id: Option<String>,
    pub deploy_platform: Option<DeployPlatform>,
    pub port: u16,
    pub private_key_b64: String,
    pub monitor_token: String,
    pub db_path: String,
    pub airgapped: bool,
}

impl Config {
    /// Decode the base64-wrapped PEM private key used for RSA-OAEP envelope
    /// unwrap. Stored as base64 in the environment so the PEM's embedded
    /// newlines survive shell/orchestrator quoting.
    pub fn private_key_pem(&self) -> Result<String> {
        let bytes = STANDARD
            .decode(&self.private_key_b64)
            .context("MONITOR_PRIVATE_KEY is not valid base64")?;
        String::from_utf8(bytes).context("MONITOR_PRIVATE_KEY does not decode to utf-8 PEM text")
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let instance_id = env::var("INSTANCE_ID").ok().filter(|s| !s.is_empty());
        let deploy_platform = match env::var("DEPLOY_PLATFORM").ok() {
            Some(raw) => Some(raw.parse::<DeployPlatform>()?),
            None => None,
        };

        if instance_id.is_none() && deploy_platform.is_none() {
            bail!("INSTANCE_ID must be set, or DEPLOY_PLATFORM must be set so the instance can be initialized from upstream");
        }

        Ok(Self {
            prime_host: env::var("PRIME_HOST")
                .unwrap_or_else(|_| "https://prime.plane.so".to_string()),
            app_domain: env::var("APP_DOMAIN").context("APP_DOMAIN must be set")?,
            app_version: env::var("APP_VERSION").context("APP_VERSION must be set")?,
            machine_signature: env::var("MACHINE_SIGNATURE")
                .context("MACHINE_SIGNATURE must be set")?,
            instance_id,
            deploy_platform,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            private_key_b64: env::var("MONITOR_PRIVATE_KEY")
                .context("MONITOR_PRIVATE_KEY must be set (base64-encoded PEM)")?,
            monitor_token: env::var("MONITOR_TOKEN")
                .context("MONITOR_TOKEN must be set (shared header for control API)")?,
            db_path: env::var("MONITOR_DB_PATH").unwrap_or_else(|_| "monitor.db".to_string()),
            airgapped: env::var("MONITOR_AIRGAPPED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_platform_parses_known_values() {
        assert_eq!(
            "KUBERNETES".parse::<DeployPlatform>().unwrap(),
            DeployPlatform::Kubernetes
        );
        assert_eq!(
            "DOCKER_COMPOSE".parse::<DeployPlatform>().unwrap(),
            DeployPlatform::DockerCompose
        );
        assert!("BARE_METAL".parse::<DeployPlatform>().is_err());
    }
}
