use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use tracing::debug;

use pollbridge_core::{Clock, Envelope, JobId, StoreError, SystemClock};

use super::r#trait::EnvelopeStore;

/// How many of the oldest records each write inspects for expiry.
const SWEEP_SAMPLE: usize = 16;

#[derive(Debug, Clone)]
struct StoredRecord<T> {
    envelope: Envelope<T>,
    inserted_at: Instant,
    ttl: Duration,
    /// Write sequence; matches the `order` entry that is currently live.
    seq: u64,
}

impl<T> StoredRecord<T> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > self.ttl
    }
}

#[derive(Debug)]
struct Inner<T> {
    records: HashMap<String, StoredRecord<T>>,
    /// Write order. Overwritten or removed keys leave stale entries behind,
    /// recognised by a sequence mismatch and dropped lazily.
    order: VecDeque<(String, u64)>,
    next_seq: u64,
    evicted: u64,
    expired: u64,
}

impl<T> Inner<T> {
    fn new() -> Self {
        Self {
            records: HashMap::new(),
            order: VecDeque::new(),
            next_seq: 0,
            evicted: 0,
            expired: 0,
        }
    }

    fn is_live(&self, key: &str, seq: u64) -> bool {
        self.records.get(key).is_some_and(|r| r.seq == seq)
    }

    fn insert(&mut self, key: &str, envelope: Envelope<T>, now: Instant, ttl: Duration) -> bool {
        let seq = self.next_seq;
        self.next_seq += 1;
        let record = StoredRecord {
            envelope,
            inserted_at: now,
            ttl,
            seq,
        };
        self.order.push_back((key.to_owned(), seq));
        self.records.insert(key.to_owned(), record).is_none()
    }

    /// Remove `key` if its record has expired. Returns whether a live record remains.
    fn expire_key(&mut self, key: &str, now: Instant) -> bool {
        match self.records.get(key) {
            Some(record) if record.is_expired(now) => {
                self.records.remove(key);
                self.expired += 1;
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Drop expired and stale entries from the front of the write order,
    /// stopping at the first live record or after `sample` entries.
    fn sweep(&mut self, now: Instant, sample: usize) {
        for _ in 0..sample {
            let Some((key, seq)) = self.order.pop_front() else {
                break;
            };
            if !self.is_live(&key, seq) {
                continue;
            }
            if self.expire_key(&key, now) {
                self.order.push_front((key, seq));
                break;
            }
        }
    }

    fn evict_overflow(&mut self, max_entries: usize) {
        while self.records.len() > max_entries {
            let Some((key, seq)) = self.order.pop_front() else {
                break;
            };
            if self.is_live(&key, seq) {
                self.records.remove(&key);
                self.evicted += 1;
                debug!(key = %key, "evicted oldest envelope");
            }
        }
    }

    /// Keep the write order proportional to the live record count.
    fn compact(&mut self) {
        if self.order.len() > self.records.len() * 2 + SWEEP_SAMPLE {
            let records = &self.records;
            self.order
                .retain(|(key, seq)| records.get(key).is_some_and(|r| r.seq == *seq));
        }
    }
}

/// Snapshot of store occupancy and housekeeping counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub entries: usize,
    pub pending: usize,
    pub ready: usize,
    pub evicted: u64,
    pub expired: u64,
}

/// Process-local envelope store.
///
/// TTLs run from the last write and are enforced lazily on access plus a small
/// sampled sweep on every write. When `max_entries` is exceeded the
/// least-recently-written record is evicted; an evicted job behaves as if it
/// had expired.
#[derive(Debug)]
pub struct InMemoryEnvelopeStore<T> {
    inner: RwLock<Inner<T>>,
    clock: Arc<dyn Clock>,
    max_entries: usize,
}

impl<T> InMemoryEnvelopeStore<T> {
    pub fn new(max_entries: usize) -> Self {
        Self::with_clock(max_entries, Arc::new(SystemClock))
    }

    pub fn with_clock(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(Inner::new()),
            clock,
            max_entries: max_entries.max(1),
        }
    }

    pub fn arc(max_entries: usize) -> Arc<Self> {
        Arc::new(Self::new(max_entries))
    }

    /// Number of stored records, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.read_lock().map(|inner| inner.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every expired record now. Returns how many were dropped.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let mut inner = self.write_lock()?;
        let before = inner.records.len();
        inner.records.retain(|_, record| !record.is_expired(now));
        let dropped = before - inner.records.len();
        inner.expired += dropped as u64;
        inner.compact();
        Ok(dropped)
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let now = self.clock.now();
        let inner = self.read_lock()?;
        let mut stats = StoreStats {
            evicted: inner.evicted,
            expired: inner.expired,
            ..StoreStats::default()
        };
        for record in inner.records.values().filter(|r| !r.is_expired(now)) {
            stats.entries += 1;
            match record.envelope {
                Envelope::Pending { .. } => stats.pending += 1,
                Envelope::Ready { .. } => stats.ready += 1,
            }
        }
        Ok(stats)
    }

    fn read_lock(&self) -> Result<RwLockReadGuard<'_, Inner<T>>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::unavailable("lock poisoned"))
    }

    fn write_lock(&self) -> Result<RwLockWriteGuard<'_, Inner<T>>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::unavailable("lock poisoned"))
    }

    fn put(&self, key: &str, envelope: Envelope<T>, ttl: Duration) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut inner = self.write_lock()?;
        inner.sweep(now, SWEEP_SAMPLE);
        if inner.insert(key, envelope, now, ttl) {
            inner.evict_overflow(self.max_entries);
        }
        inner.compact();
        Ok(())
    }
}

impl<T> EnvelopeStore<T> for InMemoryEnvelopeStore<T>
where
    T: Clone + Send + Sync,
{
    fn write_pending(&self, key: &str, job_id: &JobId, ttl: Duration) -> Result<(), StoreError> {
        self.put(key, Envelope::pending(job_id.clone()), ttl)
    }

    fn write_ready(&self, key: &str, payload: T, ttl: Duration) -> Result<(), StoreError> {
        self.put(key, Envelope::ready(payload), ttl)
    }

    fn complete(&self, key: &str, job_id: &JobId, payload: T, ttl: Duration) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let mut inner = self.write_lock()?;
        if !inner.expire_key(key, now) {
            return Ok(false);
        }
        let owns_record = matches!(
            inner.records.get(key).map(|r| &r.envelope),
            Some(Envelope::Pending { job_id: pending }) if pending == job_id
        );
        if !owns_record {
            return Ok(false);
        }
        inner.insert(key, Envelope::ready(payload), now, ttl);
        inner.compact();
        Ok(true)
    }

    fn read(&self, key: &str) -> Result<Option<Envelope<T>>, StoreError> {
        let now = self.clock.now();
        let inner = self.read_lock()?;
        Ok(inner
            .records
            .get(key)
            .filter(|r| !r.is_expired(now))
            .map(|r| r.envelope.clone()))
    }

    fn take(&self, key: &str) -> Result<Option<Envelope<T>>, StoreError> {
        let now = self.clock.now();
        let mut inner = self.write_lock()?;
        if !inner.expire_key(key, now) {
            return Ok(None);
        }
        Ok(inner.records.remove(key).map(|r| r.envelope))
    }

    fn take_if_ready(&self, key: &str) -> Result<Option<Envelope<T>>, StoreError> {
        let now = self.clock.now();
        let mut inner = self.write_lock()?;
        if !inner.expire_key(key, now) {
            return Ok(None);
        }
        if let Some(Envelope::Pending { job_id }) = inner.records.get(key).map(|r| &r.envelope) {
            return Ok(Some(Envelope::pending(job_id.clone())));
        }
        Ok(inner.records.remove(key).map(|r| r.envelope))
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.write_lock()?;
        inner.records.remove(key);
        Ok(())
    }
}
