//! Domain vocabulary of the poll coordinator: ids, keys, envelopes, requests and config.
//!
//! This crate contains **pure domain** primitives (no storage or threading).

pub mod clock;
pub mod config;
pub mod envelope;
pub mod error;
pub mod id;
pub mod key;
pub mod request;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PollConfig, Ttls};
pub use envelope::Envelope;
pub use error::{ConfigError, DomainError, PollError, PollResult, StoreError};
pub use id::{IdGenerator, JobId, UuidIdGenerator};
pub use key::{KeyBuilder, NamespacedKeyBuilder, KEY_SEPARATOR};
pub use request::{Outcome, RequestView};
