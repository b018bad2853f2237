//! Query parameters and response bodies.

use serde::{Deserialize, Serialize};

use pollbridge_core::{DomainError, JobId, RequestView};

/// Raw `?job=&waitMs=` parameters.
///
/// Both stay strings so a malformed value never rejects the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollParams {
    pub job: Option<String>,
    #[serde(rename = "waitMs")]
    pub wait_ms: Option<String>,
}

impl PollParams {
    /// A blank `job` means kickoff; a non-blank job that is not a valid id is
    /// an error. A negative `waitMs` means no wait. A missing, blank or
    /// non-numeric `waitMs` leaves the wait unset so the configured default
    /// applies.
    pub fn into_request_view(self) -> Result<RequestView, DomainError> {
        let wait_ms = self.wait_ms.as_deref().and_then(parse_wait_ms);
        RequestView::from_parts(self.job.as_deref(), wait_ms)
    }
}

fn parse_wait_ms(raw: &str) -> Option<u64> {
    let value: i64 = raw.trim().parse().ok()?;
    Some(value.max(0).unsigned_abs())
}

/// Body of a 202 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingResponse {
    pub job_id: JobId,
    pub status: String,
}

impl PendingResponse {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            status: "pending".to_string(),
        }
    }
}

/// RFC 7807 problem body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
}
