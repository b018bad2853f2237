//! Bounded waiter: probe-and-sleep until a result is ready or the budget runs out.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use pollbridge_core::StoreError;

/// What one probe of the store observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    /// The result was consumed by this probe.
    Ready(T),
    /// The job is still running.
    Pending,
    /// The record is gone: consumed by another caller, expired or evicted.
    Gone,
}

/// Repeatedly invokes a consume probe until it settles or the budget elapses.
///
/// The store has no subscription primitive, so this is plain polling: a result
/// can be observed up to one `interval` late.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedWaiter {
    interval: Duration,
}

impl Default for BoundedWaiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

impl BoundedWaiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Probe until `Ready` or `Gone`, sleeping `interval` between attempts.
    ///
    /// Returns `Probe::Pending` once the budget is spent. A zero budget probes
    /// exactly once. Probe errors are retried; an error is returned only if
    /// every probe within the budget failed.
    pub fn wait_ready<T>(
        &self,
        budget: Duration,
        mut probe: impl FnMut() -> Result<Probe<T>, StoreError>,
    ) -> Result<Probe<T>, StoreError> {
        let deadline = Instant::now() + budget;
        let mut last_error = None;
        let mut reached_store = false;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match probe() {
                Ok(Probe::Pending) => reached_store = true,
                Ok(settled) => {
                    trace!(attempts, "probe settled");
                    return Ok(settled);
                }
                Err(error) => {
                    debug!(attempts, error = %error, "probe failed; retrying within budget");
                    last_error = Some(error);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(self.interval.min(deadline - now));
        }

        trace!(attempts, ?budget, "wait budget exhausted");
        match last_error {
            Some(error) if !reached_store => Err(error),
            _ => Ok(Probe::Pending),
        }
    }
}
