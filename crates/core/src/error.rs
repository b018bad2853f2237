//! Error model shared by the coordinator, its stores and its hosts.

use thiserror::Error;

use crate::id::JobId;

/// Result type used by the poll coordinator.
pub type PollResult<T> = Result<T, PollError>;

/// Failure to construct a domain value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An identifier was invalid (blank, or containing the key separator).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

/// Envelope store failure.
///
/// An in-process store only produces these when a lock is poisoned; external
/// stores produce them when the backing service cannot be reached.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("envelope store unavailable: {0}")]
    Unavailable(String),

    #[error("envelope could not be (de)serialized: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

/// Failure of a single coordinator call.
///
/// "Still pending" is deliberately absent: it is a regular outcome, see
/// [`crate::Outcome::Pending`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PollError {
    /// No record for the job: never issued, already consumed, or expired.
    #[error("Unknown job id: {job_id}")]
    UnknownJob { job_id: JobId },

    /// The envelope store could not be used for the whole wait budget.
    #[error("infrastructure unavailable: {0}")]
    InfrastructureUnavailable(#[from] StoreError),

    /// The computation could not be handed to the executor.
    #[error("failed to schedule computation: {0}")]
    Spawn(String),
}

impl PollError {
    pub fn unknown_job(job_id: JobId) -> Self {
        Self::UnknownJob { job_id }
    }

    pub fn is_unknown_job(&self) -> bool {
        matches!(self, PollError::UnknownJob { .. })
    }
}

/// Invalid or inconsistent configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
}
