//! Coordinator configuration.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::error::ConfigError;

pub const ENV_PENDING_TTL_SECS: &str = "POLLBRIDGE_PENDING_TTL_SECS";
pub const ENV_READY_TTL_SECS: &str = "POLLBRIDGE_READY_TTL_SECS";
pub const ENV_WAIT_MS_DEFAULT: &str = "POLLBRIDGE_WAIT_MS_DEFAULT";
pub const ENV_MAX_WAIT_MS: &str = "POLLBRIDGE_MAX_WAIT_MS";
pub const ENV_POLL_INTERVAL_MS: &str = "POLLBRIDGE_POLL_INTERVAL_MS";
pub const ENV_MAX_ENTRIES: &str = "POLLBRIDGE_MAX_ENTRIES";
pub const ENV_KEY_PREFIX: &str = "POLLBRIDGE_KEY_PREFIX";

/// Lifetimes of the two envelope kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ttls {
    /// How long an accepted job may stay unfinished before it counts as abandoned.
    pub pending: Duration,
    /// How long a finished result survives unconsumed.
    pub ready: Duration,
}

impl Default for Ttls {
    fn default() -> Self {
        Self {
            pending: Duration::from_secs(300),
            ready: Duration::from_secs(300),
        }
    }
}

/// Poll coordinator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Default TTLs applied to every namespace without an override.
    pub ttls: Ttls,
    /// Wait budget used when a request does not ask for one.
    pub wait_ms_default: u64,
    /// Upper bound for any requested wait budget.
    pub max_wait_ms: u64,
    /// Sleep between two probes of the bounded waiter.
    pub poll_interval: Duration,
    /// Entry bound of the in-memory envelope store.
    pub max_entries: usize,
    /// Optional global prefix for store keys.
    pub key_prefix: Option<String>,
    /// Per-namespace TTL overrides.
    pub namespace_ttls: HashMap<String, Ttls>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            ttls: Ttls::default(),
            wait_ms_default: 3_000,
            max_wait_ms: 30_000,
            poll_interval: Duration::from_millis(50),
            max_entries: 10_000,
            key_prefix: None,
            namespace_ttls: HashMap::new(),
        }
    }
}

impl PollConfig {
    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.ttls.pending = ttl;
        self
    }

    pub fn with_ready_ttl(mut self, ttl: Duration) -> Self {
        self.ttls.ready = ttl;
        self
    }

    pub fn with_wait_bounds(mut self, default_ms: u64, max_ms: u64) -> Self {
        self.wait_ms_default = default_ms;
        self.max_wait_ms = max_ms;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_namespace_ttls(mut self, namespace: impl Into<String>, ttls: Ttls) -> Self {
        self.namespace_ttls.insert(namespace.into(), ttls);
        self
    }

    /// Load from `POLLBRIDGE_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using an arbitrary variable lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(secs) = parse_var::<u64>(&lookup, ENV_PENDING_TTL_SECS)? {
            config.ttls.pending = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, ENV_READY_TTL_SECS)? {
            config.ttls.ready = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_WAIT_MS_DEFAULT)? {
            config.wait_ms_default = ms;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_MAX_WAIT_MS)? {
            config.max_wait_ms = ms;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_POLL_INTERVAL_MS)? {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(max) = parse_var::<usize>(&lookup, ENV_MAX_ENTRIES)? {
            config.max_entries = max;
        }
        if let Some(prefix) = lookup(ENV_KEY_PREFIX).filter(|p| !p.trim().is_empty()) {
            config.key_prefix = Some(prefix);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings under which the coordinator could not keep its promises.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wait_ms_default > self.max_wait_ms {
            return Err(ConfigError::Inconsistent(format!(
                "wait_ms_default ({}) exceeds max_wait_ms ({})",
                self.wait_ms_default, self.max_wait_ms
            )));
        }
        if self.max_entries == 0 {
            return Err(ConfigError::Inconsistent("max_entries must be positive".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Inconsistent("poll_interval must be positive".into()));
        }

        let max_wait = self.max_wait();
        let all = std::iter::once(("<default>", &self.ttls))
            .chain(self.namespace_ttls.iter().map(|(ns, t)| (ns.as_str(), t)));
        for (namespace, ttls) in all {
            if ttls.pending.is_zero() || ttls.ready.is_zero() {
                return Err(ConfigError::Inconsistent(format!(
                    "ttls for {namespace} must be positive"
                )));
            }
            // A kickoff waits up to max_wait before answering; its record must outlive that.
            if ttls.pending <= max_wait {
                return Err(ConfigError::Inconsistent(format!(
                    "pending ttl for {namespace} ({:?}) must exceed max wait ({:?})",
                    ttls.pending, max_wait
                )));
            }
        }
        Ok(())
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    /// Apply the default and the `[0, max_wait_ms]` clamp to a requested budget.
    pub fn clamp_wait(&self, requested_ms: Option<u64>) -> Duration {
        let ms = requested_ms.unwrap_or(self.wait_ms_default).min(self.max_wait_ms);
        Duration::from_millis(ms)
    }

    pub fn ttls_for(&self, namespace: &str) -> Ttls {
        self.namespace_ttls.get(namespace).copied().unwrap_or(self.ttls)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let value = raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
        var,
        value: raw.clone(),
        reason: e.to_string(),
    })?;
    debug!(var, value = %raw.trim(), "config override");
    Ok(Some(value))
}
