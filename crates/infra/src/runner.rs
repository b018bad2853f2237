//! Async executor: runs computations off the request path.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, warn};

use pollbridge_core::PollError;

/// A unit of slow work. Errors are reported, never delivered.
pub type Computation<T> = Box<dyn FnOnce() -> anyhow::Result<T> + Send + 'static>;

/// Continuation invoked with the result of a successful computation.
pub type OnSuccess<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// Schedules a computation and returns immediately.
///
/// `on_success` runs on whatever thread ran the computation. A computation
/// that fails or panics is logged and dropped: its job never becomes ready,
/// and pollers see it as unknown once the pending record expires.
pub trait AsyncRunner<T>: Send + Sync {
    fn run(&self, compute: Computation<T>, on_success: OnSuccess<T>) -> Result<(), PollError>;
}

/// Runner statistics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunnerStats {
    pub spawned: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub panicked: u64,
}

#[derive(Debug, Default)]
struct Counters {
    spawned: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

/// Runs every computation on its own named OS thread.
#[derive(Debug, Clone)]
pub struct ThreadRunner {
    name: String,
    counters: Arc<Counters>,
}

impl Default for ThreadRunner {
    fn default() -> Self {
        Self::new("pollbridge-job")
    }
}

impl ThreadRunner {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn stats(&self) -> RunnerStats {
        RunnerStats {
            spawned: self.counters.spawned.load(Ordering::Relaxed),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
        }
    }
}

impl<T: Send + 'static> AsyncRunner<T> for ThreadRunner {
    fn run(&self, compute: Computation<T>, on_success: OnSuccess<T>) -> Result<(), PollError> {
        let counters = self.counters.clone();
        thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || execute(compute, on_success, &counters))
            .map_err(|e| PollError::Spawn(e.to_string()))?;
        self.counters.spawned.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn execute<T>(compute: Computation<T>, on_success: OnSuccess<T>, counters: &Counters) {
    match panic::catch_unwind(AssertUnwindSafe(compute)) {
        Ok(Ok(payload)) => {
            on_success(payload);
            counters.succeeded.fetch_add(1, Ordering::Relaxed);
            debug!("computation finished");
        }
        Ok(Err(error)) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            warn!(error = %error, "computation failed; job stays pending until its ttl lapses");
        }
        Err(panic) => {
            counters.panicked.fetch_add(1, Ordering::Relaxed);
            warn!(panic = %panic_message(panic.as_ref()), "computation panicked; job stays pending until its ttl lapses");
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Queues computations until the caller releases them one by one.
///
/// Lets tests pin down "not finished yet" without sleeping.
pub struct ManualRunner<T> {
    queue: Mutex<VecDeque<(Computation<T>, OnSuccess<T>)>>,
}

impl<T> ManualRunner<T> {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn queued(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Run the oldest queued computation on the calling thread.
    ///
    /// Returns `false` when nothing was queued.
    pub fn run_next(&self) -> bool {
        let next = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        match next {
            Some((compute, on_success)) => {
                execute(compute, on_success, &Counters::default());
                true
            }
            None => false,
        }
    }
}

impl<T> Default for ManualRunner<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> core::fmt::Debug for ManualRunner<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ManualRunner").field("queued", &self.queued()).finish()
    }
}

impl<T: Send> AsyncRunner<T> for ManualRunner<T> {
    fn run(&self, compute: Computation<T>, on_success: OnSuccess<T>) -> Result<(), PollError> {
        self.queue
            .lock()
            .map_err(|_| PollError::Spawn("manual runner queue poisoned".into()))?
            .push_back((compute, on_success));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    fn computation<T>(f: impl FnOnce() -> anyhow::Result<T> + Send + 'static) -> Computation<T> {
        Box::new(f)
    }

    fn continuation<T>(f: impl FnOnce(T) + Send + 'static) -> OnSuccess<T> {
        Box::new(f)
    }

    fn wait_for(condition: impl Fn() -> bool) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("condition not reached");
    }

    #[test]
    fn run_returns_before_computation_finishes() {
        let runner = ThreadRunner::default();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<u32>();

        runner
            .run(
                computation(move || {
                    release_rx.recv()?;
                    Ok(42u32)
                }),
                continuation(move |v| {
                    let _ = done_tx.send(v);
                }),
            )
            .unwrap();

        assert!(done_rx.try_recv().is_err());
        release_tx.send(()).unwrap();
        assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
        wait_for(|| runner.stats().succeeded == 1);
        assert_eq!(runner.stats().spawned, 1);
    }

    #[test]
    fn failures_are_swallowed() {
        let runner = ThreadRunner::new("failing");
        let (tx, rx) = mpsc::channel::<u32>();

        runner
            .run(
                computation(|| Err(anyhow::anyhow!("catalog offline"))),
                continuation(move |v| {
                    let _ = tx.send(v);
                }),
            )
            .unwrap();

        wait_for(|| runner.stats().failed == 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn panics_are_contained() {
        let runner = ThreadRunner::new("panicking");
        runner
            .run(
                computation::<u32>(|| panic!("boom")),
                continuation(|_| {}),
            )
            .unwrap();

        wait_for(|| runner.stats().panicked == 1);
        assert_eq!(runner.stats().succeeded, 0);
    }

    #[test]
    fn manual_runner_defers_until_released() {
        let runner = ManualRunner::new();
        let (tx, rx) = mpsc::channel();

        runner
            .run(
                computation(|| Ok("late")),
                continuation(move |v| tx.send(v).unwrap()),
            )
            .unwrap();
        assert_eq!(runner.queued(), 1);
        assert!(rx.try_recv().is_err());

        assert!(runner.run_next());
        assert_eq!(rx.try_recv().unwrap(), "late");
        assert!(!runner.run_next());
    }
}
