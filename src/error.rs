//! Discriminated error kinds surfaced across module boundaries.
//!
//! Mirrors the teacher's `common/auth/errors.rs` shape: a single
//! `thiserror`-derived enum per concern, with `#[from]` conversions for the
//! library errors each layer wraps.

use thiserror::Error;

/// Stable, discriminated error kind for the monitor agent.
///
/// Each variant corresponds to one of the error kinds named in the
/// specification's error handling design: configuration, crypto, upstream
/// transport, upstream semantic, store, probe, and handler validation.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("upstream transport error: {0}")]
    UpstreamTransport(String),

    #[error("upstream error: {0}")]
    UpstreamSemantic(String),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("probe error: {0}")]
    Probe(String),

    #[error("validation error: {0}")]
    HandlerValidation(String),
}

impl MonitorError {
    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }

    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::HandlerValidation(msg.into())
    }

    pub fn upstream_transport(msg: impl Into<String>) -> Self {
        Self::UpstreamTransport(msg.into())
    }

    pub fn upstream_semantic(msg: impl Into<String>) -> Self {
        Self::UpstreamSemantic(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        Self::UpstreamTransport(err.to_string())
    }
}

pub type MonitorResult<T> = Result<T, MonitorError>;
