//! Envelope store boundary and its implementations.
//!
//! The store is the only shared mutable resource of the coordinator; its own
//! per-key atomicity is the sole concurrency-control boundary the rest of the
//! system relies on.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod r#trait;

pub use in_memory::{InMemoryEnvelopeStore, StoreStats};
#[cfg(feature = "redis")]
pub use redis_store::RedisEnvelopeStore;
pub use r#trait::EnvelopeStore;
