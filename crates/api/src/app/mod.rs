//! HTTP application wiring (axum router + service wiring).
//!
//! - `services.rs`: store/coordinator wiring
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: query parameters and response bodies
//! - `errors.rs`: consistent error responses

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use thiserror::Error;

use pollbridge_core::{ConfigError, PollConfig, StoreError};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub const ENV_BIND: &str = "POLLBRIDGE_BIND";
pub const ENV_STATUS_ON_TIMEOUT: &str = "POLLBRIDGE_STATUS_ON_TIMEOUT";
pub const ENV_REDIS_URL: &str = "REDIS_URL";

const DEFAULT_BIND: &str = "0.0.0.0:8080";

/// Status used when a job is still pending once the wait budget is spent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PendingStatus {
    /// 202 with a `{"jobId", "status"}` body.
    #[default]
    Accepted,
    /// 204; the job id travels only in the `x-job-id` header.
    NoContent,
}

impl PendingStatus {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim() {
            "202" => Ok(Self::Accepted),
            "204" => Ok(Self::NoContent),
            other => Err(ConfigError::InvalidValue {
                var: ENV_STATUS_ON_TIMEOUT,
                value: other.to_string(),
                reason: "expected 202 or 204".to_string(),
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid bind address {value:?}: {source}")]
    Bind {
        value: String,
        source: std::net::AddrParseError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Host-level settings layered over the coordinator's `PollConfig`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub pending_status: PendingStatus,
    pub poll: PollConfig,
    pub redis_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            pending_status: PendingStatus::default(),
            poll: PollConfig::default(),
            redis_url: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, StartupError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StartupError> {
        let raw_bind = lookup(ENV_BIND).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = raw_bind
            .parse()
            .map_err(|source| StartupError::Bind { value: raw_bind.clone(), source })?;

        let pending_status = match lookup(ENV_STATUS_ON_TIMEOUT) {
            Some(raw) => PendingStatus::parse(&raw)?,
            None => PendingStatus::default(),
        };

        Ok(Self {
            bind,
            pending_status,
            poll: PollConfig::from_lookup(&lookup)?,
            redis_url: lookup(ENV_REDIS_URL).filter(|url| !url.trim().is_empty()),
        })
    }

    pub fn with_pending_status(mut self, status: PendingStatus) -> Self {
        self.pending_status = status;
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<services::AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", routes::router())
        .layer(Extension(services))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.pending_status, PendingStatus::Accepted);
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn reads_host_settings() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_BIND, "127.0.0.1:9000"),
            (ENV_STATUS_ON_TIMEOUT, "204"),
            (ENV_REDIS_URL, "redis://cache:6379"),
        ]))
        .unwrap();

        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.pending_status, PendingStatus::NoContent);
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));
    }

    #[test]
    fn rejects_unsupported_timeout_status() {
        let err = AppConfig::from_lookup(lookup(&[(ENV_STATUS_ON_TIMEOUT, "200")])).unwrap_err();
        assert!(matches!(err, StartupError::Config(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn rejects_bad_bind_address() {
        let err = AppConfig::from_lookup(lookup(&[(ENV_BIND, "not-an-addr")])).unwrap_err();
        assert!(matches!(err, StartupError::Bind { .. }));
    }
}
