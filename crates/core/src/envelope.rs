//! The value stored per job key.

use serde::{Deserialize, Serialize};

use crate::id::JobId;

/// State of one job as recorded in the envelope store.
///
/// A key moves `absent -> Pending -> Ready -> absent` and never back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Envelope<T> {
    /// Work accepted, result not yet written.
    Pending { job_id: JobId },
    /// Work finished; the payload is opaque to the store.
    Ready { payload: T },
}

impl<T> Envelope<T> {
    pub fn pending(job_id: JobId) -> Self {
        Self::Pending { job_id }
    }

    pub fn ready(payload: T) -> Self {
        Self::Ready { payload }
    }

    /// Consume the envelope, keeping the payload only if it is ready.
    pub fn into_payload(self) -> Option<T> {
        match self {
            Envelope::Ready { payload } => Some(payload),
            Envelope::Pending { .. } => None,
        }
    }
}
