//! Poll coordinator: decides, per request, between starting work, waiting for
//! in-flight work, and handing out a finished result exactly once.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use pollbridge_core::{
    Envelope, IdGenerator, JobId, KeyBuilder, NamespacedKeyBuilder, Outcome, PollConfig, PollError,
    PollResult, RequestView, StoreError, UuidIdGenerator,
};

use crate::runner::{AsyncRunner, Computation, OnSuccess, ThreadRunner};
use crate::store::EnvelopeStore;
use crate::waiter::{BoundedWaiter, Probe};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Kickoff,
    Poll,
}

/// Bridges slow computations to a request/response protocol with bounded waits.
///
/// A request without a job id kicks off the computation and waits up to its
/// budget; a request with a job id polls that job. A ready result is removed
/// from the store by the call that returns it, so it is delivered at most once.
pub struct PollCoordinator<T, S: ?Sized> {
    store: Arc<S>,
    runner: Arc<dyn AsyncRunner<T>>,
    ids: Arc<dyn IdGenerator>,
    keys: Arc<dyn KeyBuilder>,
    waiter: BoundedWaiter,
    config: PollConfig,
}

impl<T, S: ?Sized> core::fmt::Debug for PollCoordinator<T, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PollCoordinator")
            .field("waiter", &self.waiter)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T, S> PollCoordinator<T, S>
where
    T: Send + 'static,
    S: EnvelopeStore<T> + ?Sized + 'static,
{
    /// Coordinator with the default collaborators: one thread per computation,
    /// UUIDv7 ids, and `[prefix:]namespace:jobId` keys.
    pub fn new(store: Arc<S>, config: PollConfig) -> Self {
        let keys = match &config.key_prefix {
            Some(prefix) => NamespacedKeyBuilder::with_prefix(prefix.clone()),
            None => NamespacedKeyBuilder::new(),
        };
        Self {
            store,
            runner: Arc::new(ThreadRunner::default()),
            ids: Arc::new(UuidIdGenerator),
            keys: Arc::new(keys),
            waiter: BoundedWaiter::new(config.poll_interval),
            config,
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn AsyncRunner<T>>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_key_builder(mut self, keys: Arc<dyn KeyBuilder>) -> Self {
        self.keys = keys;
        self
    }

    /// Serve one request for the logical operation `namespace`.
    ///
    /// `compute` only runs on kickoff (no job id in `request`), and then
    /// exactly once. Polls ignore it.
    ///
    /// Returns `Outcome::Ready` with the payload this call consumed, or
    /// `Outcome::Pending` with the job id to poll later. Fails with
    /// `PollError::UnknownJob` when a polled job has no record.
    #[instrument(
        skip(self, compute, request),
        fields(namespace = %namespace, job_id = ?request.client_job_id, wait_ms = ?request.wait_ms)
    )]
    pub fn handle<F>(&self, namespace: &str, compute: F, request: &RequestView) -> PollResult<Outcome<T>>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let budget = self.config.clamp_wait(request.wait_ms);
        match &request.client_job_id {
            Some(job_id) => {
                let key = self.keys.build(namespace, job_id);
                self.consume_or_wait(&key, job_id, budget, Origin::Poll)
            }
            None => self.kickoff(namespace, Box::new(compute), budget),
        }
    }

    fn kickoff(&self, namespace: &str, compute: Computation<T>, budget: Duration) -> PollResult<Outcome<T>> {
        let job_id = self.ids.new_id();
        let key = self.keys.build(namespace, &job_id);
        let ttls = self.config.ttls_for(namespace);

        self.store.write_pending(&key, &job_id, ttls.pending)?;

        let on_success = {
            let store = Arc::clone(&self.store);
            let key = key.clone();
            let job_id = job_id.clone();
            let hook: OnSuccess<T> = Box::new(move |payload| {
                match store.complete(&key, &job_id, payload, ttls.ready) {
                    Ok(true) => debug!(job_id = %job_id, "result recorded"),
                    Ok(false) => debug!(job_id = %job_id, "record gone before completion; result dropped"),
                    Err(e) => error!(job_id = %job_id, error = %e, "failed to record result"),
                }
            });
            hook
        };

        if let Err(e) = self.runner.run(compute, on_success) {
            error!(job_id = %job_id, error = %e, "could not schedule computation");
            if let Err(cleanup) = self.store.delete(&key) {
                warn!(job_id = %job_id, error = %cleanup, "failed to drop orphaned pending record");
            }
            return Err(e);
        }

        info!(job_id = %job_id, namespace, "job kicked off");
        self.consume_or_wait(&key, &job_id, budget, Origin::Kickoff)
    }

    fn consume_or_wait(
        &self,
        key: &str,
        job_id: &JobId,
        budget: Duration,
        origin: Origin,
    ) -> PollResult<Outcome<T>> {
        match self.store.take_if_ready(key) {
            Ok(Some(Envelope::Ready { payload })) => {
                debug!(job_id = %job_id, "ready on first probe");
                return Ok(Outcome::Ready(payload));
            }
            Ok(Some(Envelope::Pending { .. })) if budget.is_zero() => {
                return Ok(self.still_pending(job_id));
            }
            Ok(Some(Envelope::Pending { .. })) => {}
            Ok(None) => return self.missing(job_id, origin),
            Err(e) if budget.is_zero() => return Err(self.unavailable(job_id, e)),
            Err(e) => warn!(job_id = %job_id, error = %e, "store probe failed; retrying within wait budget"),
        }

        let waited = self.waiter.wait_ready(budget, || {
            Ok(match self.store.take_if_ready(key)? {
                Some(Envelope::Ready { payload }) => Probe::Ready(payload),
                Some(Envelope::Pending { .. }) => Probe::Pending,
                None => Probe::Gone,
            })
        });
        match waited {
            Ok(Probe::Ready(payload)) => {
                debug!(job_id = %job_id, "ready within wait budget");
                return Ok(Outcome::Ready(payload));
            }
            // Consumed by a concurrent poller, or expired while waiting.
            Ok(Probe::Gone) => return self.missing(job_id, origin),
            Ok(Probe::Pending) => {}
            Err(e) => return Err(self.unavailable(job_id, e)),
        }

        // The budget is spent; report what the store holds now without consuming a pending record.
        match self.store.take_if_ready(key) {
            Ok(Some(Envelope::Ready { payload })) => Ok(Outcome::Ready(payload)),
            Ok(Some(Envelope::Pending { .. })) => Ok(self.still_pending(job_id)),
            Ok(None) => self.missing(job_id, origin),
            Err(e) => Err(self.unavailable(job_id, e)),
        }
    }

    fn still_pending(&self, job_id: &JobId) -> Outcome<T> {
        debug!(job_id = %job_id, "still pending");
        Outcome::Pending {
            job_id: job_id.clone(),
        }
    }

    fn missing(&self, job_id: &JobId, origin: Origin) -> PollResult<Outcome<T>> {
        match origin {
            Origin::Poll => {
                debug!(job_id = %job_id, "unknown job");
                Err(PollError::unknown_job(job_id.clone()))
            }
            // Only reachable if the fresh record was evicted; the client learns that on its next poll.
            Origin::Kickoff => {
                warn!(job_id = %job_id, "pending record vanished right after kickoff");
                Ok(self.still_pending(job_id))
            }
        }
    }

    fn unavailable(&self, job_id: &JobId, e: StoreError) -> PollError {
        error!(job_id = %job_id, error = %e, "envelope store unavailable");
        PollError::InfrastructureUnavailable(e)
    }
}
