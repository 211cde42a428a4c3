//! The resource registry: one explicit ownership struct, constructed at
//! process start and passed by reference to everything that needs model
//! or store handles. Replaces the global-singleton pattern.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use lore_core::config::ProviderConfig;
use lore_core::errors::{LoreResult, ProviderError};
use lore_core::models::{HealthReport, ResourceKind, ResourceStatus};
use lore_core::traits::{IEmbeddingProvider, IGenerationProvider, IProbe, IRerankProvider};

use crate::backoff::retry_init;
use crate::providers::ProviderFactories;
use crate::slot::LazySlot;

/// Holds the four process-wide resource handles.
///
/// `S` is the vector-store connection type; its construction recipe is
/// supplied by the storage layer so this crate stays independent of it.
pub struct ResourceRegistry<S: IProbe + 'static> {
    config: ProviderConfig,
    factories: ProviderFactories,
    store_factory: Box<dyn Fn() -> LoreResult<S> + Send + Sync>,
    embedding: LazySlot<dyn IEmbeddingProvider>,
    generation: LazySlot<dyn IGenerationProvider>,
    reranker: LazySlot<dyn IRerankProvider>,
    store: LazySlot<S>,
    shut_down: AtomicBool,
}

impl<S: IProbe + 'static> ResourceRegistry<S> {
    /// Build a registry whose provider recipes come from configuration.
    pub fn new(
        config: ProviderConfig,
        store_factory: impl Fn() -> LoreResult<S> + Send + Sync + 'static,
    ) -> Self {
        let factories = ProviderFactories::from_config(&config);
        Self::with_factories(config, factories, store_factory)
    }

    /// Build a registry with explicit provider recipes (used by tests and
    /// embedders that bring their own clients).
    pub fn with_factories(
        config: ProviderConfig,
        factories: ProviderFactories,
        store_factory: impl Fn() -> LoreResult<S> + Send + Sync + 'static,
    ) -> Self {
        Self {
            config,
            factories,
            store_factory: Box::new(store_factory),
            embedding: LazySlot::new(ResourceKind::Embedding),
            generation: LazySlot::new(ResourceKind::Generation),
            reranker: LazySlot::new(ResourceKind::Reranker),
            store: LazySlot::new(ResourceKind::VectorStore),
            shut_down: AtomicBool::new(false),
        }
    }

    fn check_open(&self) -> LoreResult<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            Err(ProviderError::ShutDown.into())
        } else {
            Ok(())
        }
    }

    /// Acquire the embedding handle, initializing it on first call.
    pub fn embedding(&self) -> LoreResult<Arc<dyn IEmbeddingProvider>> {
        self.check_open()?;
        self.embedding.get_or_init(|| {
            retry_init(
                ResourceKind::Embedding,
                self.config.max_init_attempts,
                self.config.retry_delay_base_secs,
                || (self.factories.embedding)(),
            )
        })
    }

    /// Acquire the generation handle, initializing it on first call.
    pub fn generation(&self) -> LoreResult<Arc<dyn IGenerationProvider>> {
        self.check_open()?;
        self.generation.get_or_init(|| {
            retry_init(
                ResourceKind::Generation,
                self.config.max_init_attempts,
                self.config.retry_delay_base_secs,
                || (self.factories.generation)(),
            )
        })
    }

    /// Acquire the reranker handle. `Unavailable` when configured off.
    pub fn reranker(&self) -> LoreResult<Arc<dyn IRerankProvider>> {
        self.check_open()?;
        let factory = self.factories.reranker.as_ref().ok_or_else(|| {
            ProviderError::Unavailable {
                kind: ResourceKind::Reranker.as_str().to_string(),
            }
        })?;
        self.reranker.get_or_init(|| {
            retry_init(
                ResourceKind::Reranker,
                self.config.max_init_attempts,
                self.config.retry_delay_base_secs,
                || factory(),
            )
        })
    }

    /// Acquire the vector-store connection, opening it on first call.
    pub fn store(&self) -> LoreResult<Arc<S>> {
        self.check_open()?;
        self.store.get_or_init(|| {
            retry_init(
                ResourceKind::VectorStore,
                self.config.max_init_attempts,
                self.config.retry_delay_base_secs,
                || (self.store_factory)().map(Arc::new),
            )
        })
    }

    /// Current lifecycle state of one resource kind, without initializing.
    pub fn status(&self, kind: ResourceKind) -> ResourceStatus {
        match kind {
            ResourceKind::Embedding => self.embedding.status(),
            ResourceKind::Generation => self.generation.status(),
            ResourceKind::Reranker => self.reranker.status(),
            ResourceKind::VectorStore => self.store.status(),
        }
    }

    /// Probe every initialized handle and flip Ready ↔ Degraded on the
    /// result. Uninitialized and Failed handles are reported as-is.
    pub fn health_check(&self) -> HealthReport {
        let mut statuses = HashMap::new();

        self.probe_slot(ResourceKind::Embedding, &self.embedding, |h| h.probe());
        self.probe_slot(ResourceKind::Generation, &self.generation, |h| h.probe());
        self.probe_slot(ResourceKind::Reranker, &self.reranker, |h| h.probe());
        self.probe_slot(ResourceKind::VectorStore, &self.store, |h| h.probe());

        for kind in ResourceKind::ALL {
            statuses.insert(kind, self.status(kind));
        }

        HealthReport {
            statuses,
            checked_at: Utc::now(),
        }
    }

    fn probe_slot<T: ?Sized>(
        &self,
        kind: ResourceKind,
        slot: &LazySlot<T>,
        probe: impl Fn(&T) -> LoreResult<()>,
    ) {
        if let Some(handle) = slot.peek() {
            match probe(&handle) {
                Ok(()) => slot.set_degraded(false),
                Err(e) => {
                    warn!(kind = %kind, error = %e, "liveness probe failed, marking degraded");
                    slot.set_degraded(true);
                }
            }
        }
    }

    /// Release all handles. Idempotent; pending acquisitions observe
    /// `ShutDown` once the current initializer (if any) finishes.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("shutting down resource registry");
        self.embedding.close();
        self.generation.close();
        self.reranker.close();
        self.store.close();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl<S: IProbe + 'static> Drop for ResourceRegistry<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
