//! Job identifiers and the generators that mint them.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::key::KEY_SEPARATOR;

/// Identifier of one polled job invocation.
///
/// Ids are opaque text on the wire: hosts may hand back any id they were given,
/// so parsing accepts non-UUID strings. Blank ids and ids containing
/// [`KEY_SEPARATOR`] are rejected; the latter could address another
/// namespace's key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Wrap an existing identifier.
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::invalid_id("JobId: must not be blank"));
        }
        if value.contains(KEY_SEPARATOR) {
            return Err(DomainError::invalid_id(format!(
                "JobId: must not contain '{KEY_SEPARATOR}'"
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for JobId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for JobId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<Uuid> for JobId {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of fresh job identifiers.
///
/// Implementations must return ids that stay unique for at least the lifetime
/// of any outstanding job. There is no collision detection downstream.
pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> JobId;
}

/// Default generator: UUIDv7 (millisecond timestamp + random tail).
///
/// Ids sort by creation time, and the random tail keeps ids minted in the same
/// millisecond distinct.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn new_id(&self) -> JobId {
        JobId::from(Uuid::now_v7())
    }
}

/// Any closure producing strings can mint ids (handy for deterministic tests).
///
/// A blank string from the closure falls back to a UUIDv7 so the generator
/// stays total.
impl<F> IdGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn new_id(&self) -> JobId {
        JobId::new(self()).unwrap_or_else(|_| UuidIdGenerator.new_id())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn blank_ids_are_rejected() {
        assert!(JobId::new("").is_err());
        assert!("   ".parse::<JobId>().is_err());
        assert_eq!("abc".parse::<JobId>().unwrap().as_str(), "abc");
    }

    #[test]
    fn ids_with_key_separator_are_rejected() {
        assert!(matches!(JobId::new("b:c"), Err(DomainError::InvalidId(_))));
        assert!(":".parse::<JobId>().is_err());
    }

    #[test]
    fn closure_ids_with_separator_fall_back_to_uuid() {
        let generator = || "ns:forged".to_string();
        assert!(!generator.new_id().as_str().contains(KEY_SEPARATOR));
    }

    #[test]
    fn uuid_generator_produces_distinct_ids() {
        let generator = UuidIdGenerator;
        let ids: HashSet<JobId> = (0..10_000).map(|_| generator.new_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn uuid_generator_ids_are_time_ordered() {
        let generator = UuidIdGenerator;
        let first = generator.new_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = generator.new_id();
        assert!(first < second);
    }

    #[test]
    fn closures_act_as_generators() {
        let generator = || "job-1".to_string();
        assert_eq!(generator.new_id().as_str(), "job-1");

        let blank = || String::new();
        assert!(!blank.new_id().as_str().is_empty());
    }
}
