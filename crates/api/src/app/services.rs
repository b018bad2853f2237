//! Infrastructure wiring: envelope store, coordinator and the demo catalog.

use std::sync::Arc;

use tracing::{info, warn};

use pollbridge_infra::{EnvelopeStore, InMemoryEnvelopeStore, PollCoordinator, RunnerStats, StoreStats, ThreadRunner};

use crate::app::{AppConfig, PendingStatus, StartupError};
use crate::catalog::{Catalog, ProductDetails};

/// Payload of a catalog lookup; `None` when the product does not exist.
pub type CatalogPayload = Option<ProductDetails>;

pub type CatalogStore = dyn EnvelopeStore<CatalogPayload>;

pub struct AppServices {
    pub coordinator: PollCoordinator<CatalogPayload, CatalogStore>,
    pub catalog: Catalog,
    pub pending_status: PendingStatus,
    /// Shares its counters with the runner inside `coordinator`.
    runner: ThreadRunner,
    /// Set when the in-memory store is in use.
    memory_store: Option<Arc<InMemoryEnvelopeStore<CatalogPayload>>>,
}

impl core::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppServices")
            .field("coordinator", &self.coordinator)
            .field("catalog", &self.catalog)
            .field("pending_status", &self.pending_status)
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

impl AppServices {
    /// Services over the in-memory store, sized by `config.poll.max_entries`.
    pub fn in_memory(config: &AppConfig, catalog: Catalog) -> Self {
        let store = InMemoryEnvelopeStore::arc(config.poll.max_entries);
        let shared: Arc<CatalogStore> = store.clone();
        Self::assemble(shared, Some(store), config, catalog)
    }

    fn assemble(
        store: Arc<CatalogStore>,
        memory_store: Option<Arc<InMemoryEnvelopeStore<CatalogPayload>>>,
        config: &AppConfig,
        catalog: Catalog,
    ) -> Self {
        let runner = ThreadRunner::default();
        let coordinator = PollCoordinator::new(store, config.poll.clone()).with_runner(Arc::new(runner.clone()));
        Self {
            coordinator,
            catalog,
            pending_status: config.pending_status,
            runner,
            memory_store,
        }
    }

    #[cfg(feature = "redis")]
    pub fn redis(config: &AppConfig, redis_url: &str, catalog: Catalog) -> Result<Self, StartupError> {
        let store: Arc<CatalogStore> = Arc::new(pollbridge_infra::RedisEnvelopeStore::new(redis_url)?);
        Ok(Self::assemble(store, None, config, catalog))
    }

    /// Live counters of the in-memory store, if that is the backend.
    ///
    /// Expired records are purged first so `entries` only counts reachable jobs.
    pub fn store_stats(&self) -> Option<StoreStats> {
        let store = self.memory_store.as_ref()?;
        if let Err(e) = store.purge_expired() {
            warn!(error = %e, "expiry sweep failed before reporting stats");
        }
        store.stats().ok()
    }

    pub fn runner_stats(&self) -> RunnerStats {
        self.runner.stats()
    }
}

/// Pick the store backend from the configuration.
pub fn build_services(config: &AppConfig, catalog: Catalog) -> Result<AppServices, StartupError> {
    if let Some(url) = &config.redis_url {
        #[cfg(feature = "redis")]
        {
            info!("using redis envelope store");
            return AppServices::redis(config, url, catalog);
        }
        #[cfg(not(feature = "redis"))]
        {
            warn!(url = %url, "REDIS_URL set but redis feature not enabled, falling back to in-memory");
        }
    }

    info!(max_entries = config.poll.max_entries, "using in-memory envelope store");
    Ok(AppServices::in_memory(config, catalog))
}
