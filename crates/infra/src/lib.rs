//! Infrastructure layer: envelope stores, the async executor, the bounded
//! waiter and the poll coordinator that drives them.

pub mod coordinator;
pub mod runner;
pub mod store;
pub mod waiter;


pub use coordinator::PollCoordinator;
pub use runner::{AsyncRunner, Computation, ManualRunner, OnSuccess, RunnerStats, ThreadRunner};
pub use store::{EnvelopeStore, InMemoryEnvelopeStore, StoreStats};
#[cfg(feature = "redis")]
pub use store::RedisEnvelopeStore;
pub use waiter::{BoundedWaiter, Probe};
