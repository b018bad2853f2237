//! Redis-backed envelope store (optional).
//!
//! Envelopes are stored as JSON strings with a `PX` expiry, so TTLs are
//! enforced by Redis itself. `take` maps to `GETDEL`; the conditional
//! operations run as Lua scripts, which Redis executes atomically.

use std::time::Duration;

use redis::Commands;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{error, instrument};

use pollbridge_core::{Envelope, JobId, StoreError};

use super::r#trait::EnvelopeStore;

/// Remove the record only when it is ready; always return what was there.
const TAKE_IF_READY_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then return false end
local ok, env = pcall(cjson.decode, raw)
if ok and env.state == 'ready' then
  redis.call('DEL', KEYS[1])
end
return raw
"#;

/// Swap `Pending{ARGV[1]}` for the ready envelope in ARGV[2] with PX ARGV[3].
const COMPLETE_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then return 0 end
local ok, env = pcall(cjson.decode, raw)
if not ok or env.state ~= 'pending' or env.job_id ~= ARGV[1] then return 0 end
redis.call('SET', KEYS[1], ARGV[2], 'PX', ARGV[3])
return 1
"#;

pub struct RedisEnvelopeStore {
    client: redis::Client,
    take_if_ready: redis::Script,
    complete: redis::Script,
}

impl core::fmt::Debug for RedisEnvelopeStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RedisEnvelopeStore")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl RedisEnvelopeStore {
    /// Connect lazily to `redis_url` (e.g. "redis://localhost:6379").
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url.as_ref()).map_err(unavailable)?;
        Ok(Self {
            client,
            take_if_ready: redis::Script::new(TAKE_IF_READY_SCRIPT),
            complete: redis::Script::new(COMPLETE_SCRIPT),
        })
    }

    fn connection(&self) -> Result<redis::Connection, StoreError> {
        self.client.get_connection().map_err(|e| {
            error!(error = %e, "redis connection failed");
            unavailable(e)
        })
    }

    fn set_px(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query::<()>(&mut conn)
            .map_err(unavailable)
    }
}

fn unavailable(e: redis::RedisError) -> StoreError {
    StoreError::unavailable(e.to_string())
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn encode<T: Serialize>(envelope: &Envelope<T>) -> Result<String, StoreError> {
    serde_json::to_string(envelope).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(raw: Option<String>) -> Result<Option<Envelope<T>>, StoreError> {
    raw.map(|raw| serde_json::from_str(&raw).map_err(|e| StoreError::Serialization(e.to_string())))
        .transpose()
}

impl<T> EnvelopeStore<T> for RedisEnvelopeStore
where
    T: Serialize + DeserializeOwned,
{
    #[instrument(skip(self), err)]
    fn write_pending(&self, key: &str, job_id: &JobId, ttl: Duration) -> Result<(), StoreError> {
        let value = encode(&Envelope::<T>::pending(job_id.clone()))?;
        self.set_px(key, value, ttl)
    }

    #[instrument(skip(self, payload), err)]
    fn write_ready(&self, key: &str, payload: T, ttl: Duration) -> Result<(), StoreError> {
        let value = encode(&Envelope::ready(payload))?;
        self.set_px(key, value, ttl)
    }

    #[instrument(skip(self, payload), err)]
    fn complete(&self, key: &str, job_id: &JobId, payload: T, ttl: Duration) -> Result<bool, StoreError> {
        let value = encode(&Envelope::ready(payload))?;
        let mut conn = self.connection()?;
        let swapped: i64 = self
            .complete
            .key(key)
            .arg(job_id.as_str())
            .arg(value)
            .arg(ttl_millis(ttl))
            .invoke(&mut conn)
            .map_err(unavailable)?;
        Ok(swapped == 1)
    }

    fn read(&self, key: &str) -> Result<Option<Envelope<T>>, StoreError> {
        let mut conn = self.connection()?;
        let raw: Option<String> = conn.get(key).map_err(unavailable)?;
        decode(raw)
    }

    fn take(&self, key: &str) -> Result<Option<Envelope<T>>, StoreError> {
        let mut conn = self.connection()?;
        let raw: Option<String> = redis::cmd("GETDEL")
            .arg(key)
            .query(&mut conn)
            .map_err(unavailable)?;
        decode(raw)
    }

    fn take_if_ready(&self, key: &str) -> Result<Option<Envelope<T>>, StoreError> {
        let mut conn = self.connection()?;
        let raw: Option<String> = self
            .take_if_ready
            .key(key)
            .invoke(&mut conn)
            .map_err(unavailable)?;
        decode(raw)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        conn.del::<_, ()>(key).map_err(unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(30);

    fn store() -> RedisEnvelopeStore {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        RedisEnvelopeStore::new(url).unwrap()
    }

    fn key(name: &str) -> String {
        format!("pollbridge-test:{name}:{}", unique_suffix())
    }

    fn unique_suffix() -> u128 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    }

    #[test]
    fn ttl_is_at_least_one_millisecond() {
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_secs(2)), 2_000);
    }

    #[test]
    fn unreachable_server_is_unavailable() {
        let store = RedisEnvelopeStore::new("redis://127.0.0.1:1").unwrap();
        let err = EnvelopeStore::<String>::read(&store, "k").unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    #[ignore = "requires a running Redis (REDIS_URL)"]
    fn take_if_ready_consumes_only_ready() {
        let store = store();
        let key = key("ready");
        let job = JobId::new("j1").unwrap();

        EnvelopeStore::<String>::write_pending(&store, &key, &job, TTL).unwrap();
        let seen: Option<Envelope<String>> = store.take_if_ready(&key).unwrap();
        assert_eq!(seen, Some(Envelope::pending(job.clone())));

        assert!(store.complete(&key, &job, "OK".to_string(), TTL).unwrap());
        let taken: Option<Envelope<String>> = store.take_if_ready(&key).unwrap();
        assert_eq!(taken, Some(Envelope::ready("OK".to_string())));
        let again: Option<Envelope<String>> = store.read(&key).unwrap();
        assert!(again.is_none());
    }

    #[test]
    #[ignore = "requires a running Redis (REDIS_URL)"]
    fn complete_ignores_missing_record() {
        let store = store();
        let key = key("late");
        let job = JobId::new("j2").unwrap();
        assert!(!store.complete(&key, &job, "late".to_string(), TTL).unwrap());
    }
}
