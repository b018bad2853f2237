//! The request shape the coordinator consumes and the outcome it produces.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::id::JobId;

/// Per-request parameters, passed explicitly into every coordinator call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    /// Job handle from an earlier response. `None` starts new work.
    pub client_job_id: Option<JobId>,
    /// Requested wait budget. `None` means "use the configured default".
    pub wait_ms: Option<u64>,
}

impl RequestView {
    pub fn kickoff(wait_ms: u64) -> Self {
        Self {
            client_job_id: None,
            wait_ms: Some(wait_ms),
        }
    }

    pub fn poll(job_id: JobId, wait_ms: u64) -> Self {
        Self {
            client_job_id: Some(job_id),
            wait_ms: Some(wait_ms),
        }
    }

    /// Build from loosely-typed transport values.
    ///
    /// A blank job id counts as absent, so the call becomes a kickoff. A
    /// non-blank id that is not a valid `JobId` is an error rather than a
    /// kickoff, so a malformed poll never starts new work.
    pub fn from_parts(job: Option<&str>, wait_ms: Option<u64>) -> Result<Self, DomainError> {
        let client_job_id = match job {
            Some(raw) if !raw.trim().is_empty() => Some(JobId::new(raw)?),
            _ => None,
        };
        Ok(Self { client_job_id, wait_ms })
    }

    pub fn is_poll(&self) -> bool {
        self.client_job_id.is_some()
    }
}

/// Result of one coordinator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The computation finished and this call consumed its result.
    Ready(T),
    /// Not finished within the wait budget; poll again with `job_id`.
    Pending { job_id: JobId },
}

impl<T> Outcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Outcome::Ready(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_job_means_kickoff() {
        assert!(!RequestView::from_parts(None, Some(10)).unwrap().is_poll());
        assert!(!RequestView::from_parts(Some(""), Some(10)).unwrap().is_poll());
        assert!(!RequestView::from_parts(Some("  "), None).unwrap().is_poll());
        assert!(RequestView::from_parts(Some("abc"), None).unwrap().is_poll());
    }

    #[test]
    fn malformed_job_is_rejected_not_kicked_off() {
        assert!(RequestView::from_parts(Some("other:job"), Some(10)).is_err());
    }

    #[test]
    fn only_ready_outcomes_are_ready() {
        let pending: Outcome<u8> = Outcome::Pending {
            job_id: JobId::new("x").unwrap(),
        };
        assert!(!pending.is_ready());
        assert!(Outcome::Ready(3).is_ready());
    }
}
