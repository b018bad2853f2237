use std::sync::Arc;
use std::time::Duration;

use pollbridge_core::{Envelope, JobId, StoreError};

/// Expiring key/value store holding at most one envelope per key.
///
/// Every operation acts on one key atomically: concurrent readers observe
/// either the previous record or the new one, never a partial write. Callers
/// only ever receive copies; the store owns all records.
///
/// Expired records behave exactly like absent ones.
pub trait EnvelopeStore<T>: Send + Sync {
    /// Insert or overwrite `key` with `Pending { job_id }`.
    fn write_pending(&self, key: &str, job_id: &JobId, ttl: Duration) -> Result<(), StoreError>;

    /// Insert or overwrite `key` with `Ready { payload }`.
    fn write_ready(&self, key: &str, payload: T, ttl: Duration) -> Result<(), StoreError>;

    /// Replace a live `Pending { job_id }` at `key` with `Ready { payload }`.
    ///
    /// Returns `false` without writing when the record is absent, expired, or
    /// not the pending record of `job_id`, so a completion that outlived its
    /// record never resurrects the key.
    fn complete(&self, key: &str, job_id: &JobId, payload: T, ttl: Duration) -> Result<bool, StoreError>;

    /// Snapshot of the record at `key`.
    fn read(&self, key: &str) -> Result<Option<Envelope<T>>, StoreError>;

    /// Read and remove the record at `key` in one atomic step.
    fn take(&self, key: &str) -> Result<Option<Envelope<T>>, StoreError>;

    /// Remove and return the record only if it is `Ready`.
    ///
    /// A `Pending` record is returned as a snapshot and left in place. Of any
    /// number of concurrent callers on the same ready key, exactly one gets
    /// `Ready`; the rest see `None`.
    fn take_if_ready(&self, key: &str) -> Result<Option<Envelope<T>>, StoreError>;

    /// Unconditionally remove the record at `key`.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

impl<T, S> EnvelopeStore<T> for Arc<S>
where
    S: EnvelopeStore<T> + ?Sized,
{
    fn write_pending(&self, key: &str, job_id: &JobId, ttl: Duration) -> Result<(), StoreError> {
        (**self).write_pending(key, job_id, ttl)
    }

    fn write_ready(&self, key: &str, payload: T, ttl: Duration) -> Result<(), StoreError> {
        (**self).write_ready(key, payload, ttl)
    }

    fn complete(&self, key: &str, job_id: &JobId, payload: T, ttl: Duration) -> Result<bool, StoreError> {
        (**self).complete(key, job_id, payload, ttl)
    }

    fn read(&self, key: &str) -> Result<Option<Envelope<T>>, StoreError> {
        (**self).read(key)
    }

    fn take(&self, key: &str) -> Result<Option<Envelope<T>>, StoreError> {
        (**self).take(key)
    }

    fn take_if_ready(&self, key: &str) -> Result<Option<Envelope<T>>, StoreError> {
        (**self).take_if_ready(key)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }
}
