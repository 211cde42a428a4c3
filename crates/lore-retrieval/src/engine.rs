//! The retrieval engine facade: owns the resource registry, the vector
//! index accessor and the lexical cache, and runs the hybrid query
//! pipeline end to end.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, warn};

use lore_core::config::{LoreConfig, RerankerKind};
use lore_core::constants::DEFAULT_KB_NAME;
use lore_core::errors::{LoreError, LoreResult, RetrievalError};
use lore_core::models::{
    Chunk, DegradationEvent, DocumentMeta, HealthReport, KbId, ResourceKind, ResourceStatus,
    RetrievalResult, ScoredChunk,
};
use lore_core::{cache_key, CancelToken};
use lore_providers::ResourceRegistry;
use lore_store::{RepairReport, StoreEngine, VectorIndexAccessor};

use crate::fuse::rrf_fuse;
use crate::lexical_cache::LexicalIndexCache;

pub struct RetrievalEngine {
    config: LoreConfig,
    registry: ResourceRegistry<StoreEngine>,
    /// Built on first use; the store handle behind it is lazy too.
    accessor: Mutex<Option<Arc<VectorIndexAccessor>>>,
    lexical: LexicalIndexCache,
    degradations: Mutex<Vec<DegradationEvent>>,
}

impl RetrievalEngine {
    /// Build an engine whose providers come from configuration. Nothing
    /// connects or opens until first use.
    pub fn new(config: LoreConfig) -> LoreResult<Self> {
        let db_path = config.storage.db_path();
        std::fs::create_dir_all(&config.storage.storage_dir).map_err(|e| {
            LoreError::Config(format!("cannot create storage dir: {e}"))
        })?;
        let registry =
            ResourceRegistry::new(config.provider.clone(), move || StoreEngine::open(&db_path));
        Self::with_registry(config, registry)
    }

    /// Build an engine over an existing registry (tests inject mock
    /// providers this way).
    pub fn with_registry(
        config: LoreConfig,
        registry: ResourceRegistry<StoreEngine>,
    ) -> LoreResult<Self> {
        let lexical = LexicalIndexCache::new(config.storage.cache_path())?;
        Ok(Self {
            config,
            registry,
            accessor: Mutex::new(None),
            lexical,
            degradations: Mutex::new(Vec::new()),
        })
    }

    /// The knowledge base used when the caller does not name one.
    pub fn default_kb() -> KbId {
        // The constant is a valid id; new() cannot fail on it.
        KbId::new(DEFAULT_KB_NAME).unwrap_or_else(|_| unreachable!())
    }

    fn accessor(&self) -> LoreResult<Arc<VectorIndexAccessor>> {
        let mut guard = self.accessor.lock().map_err(|e| {
            LoreError::Config(format!("accessor lock poisoned: {e}"))
        })?;
        if let Some(accessor) = guard.as_ref() {
            return Ok(Arc::clone(accessor));
        }
        let engine = self.registry.store()?;
        let accessor = Arc::new(VectorIndexAccessor::new(engine));
        *guard = Some(Arc::clone(&accessor));
        Ok(accessor)
    }

    fn record_degradation(&self, component: &str, failure: &LoreError, fallback: &str) {
        warn!(component, error = %failure, fallback, "retrieval path degraded");
        if let Ok(mut events) = self.degradations.lock() {
            events.push(DegradationEvent {
                component: component.to_string(),
                failure: failure.to_string(),
                fallback_used: fallback.to_string(),
                timestamp: Utc::now(),
            });
        }
    }

    /// Run the hybrid query pipeline: vector and lexical candidates,
    /// RRF fusion, optional reranking, top-k cut.
    ///
    /// Either path may be missing; retrieval errors with
    /// `NoRetrievalPath` only when both are. An empty corpus or an
    /// empty query return an empty result, which is success.
    pub fn retrieve(
        &self,
        kb: &KbId,
        query: &str,
        top_k: isize,
        cancel: &CancelToken,
    ) -> LoreResult<RetrievalResult> {
        if top_k <= 0 {
            return Err(RetrievalError::InvalidTopK { top_k }.into());
        }
        let top_k = top_k as usize;
        let query = query.trim();
        if query.is_empty() {
            return Ok(RetrievalResult::default());
        }
        cancel.check()?;

        let accessor = self.accessor()?;
        accessor.get_or_build_index(kb)?;
        let live_ids = accessor.live_chunk_ids(kb)?;
        if live_ids.is_empty() {
            return Ok(RetrievalResult::default());
        }

        let tuning = &self.config.retrieval;

        let vector_ranking = self.vector_candidates(&accessor, kb, query, cancel)?;
        cancel.check()?;
        let lexical_ranking = self.lexical_candidates(&accessor, kb, query, &live_ids);
        cancel.check()?;

        if vector_ranking.is_none() && lexical_ranking.is_none() {
            return Err(RetrievalError::NoRetrievalPath.into());
        }

        let fused = rrf_fuse(
            vector_ranking.as_deref().unwrap_or(&[]),
            lexical_ranking.as_deref().unwrap_or(&[]),
            tuning.rrf_k,
            tuning.vector_weight,
            tuning.lexical_weight,
        );

        let pool = top_k.max(tuning.rerank_input_size);
        let candidate_ids: Vec<String> =
            fused.iter().take(pool).map(|(id, _)| id.clone()).collect();
        let resolved = self.resolve_chunks(&accessor, kb, &candidate_ids)?;

        let mut chunks: Vec<ScoredChunk> = fused
            .iter()
            .take(pool)
            .filter_map(|(id, score)| {
                resolved.get(id).map(|chunk| ScoredChunk {
                    chunk_id: id.clone(),
                    score: *score,
                    text: chunk.text.clone(),
                    doc_id: chunk.doc_id.clone(),
                })
            })
            .collect();

        self.maybe_rerank(query, &mut chunks, cancel)?;

        chunks.truncate(top_k);
        // Queries are user content; log their hash, not their text.
        debug!(
            kb = %kb,
            query = %cache_key(kb, query),
            returned = chunks.len(),
            "retrieval complete"
        );
        Ok(RetrievalResult { chunks })
    }

    /// Vector-path candidate ids, or `None` when the path degraded.
    fn vector_candidates(
        &self,
        accessor: &VectorIndexAccessor,
        kb: &KbId,
        query: &str,
        cancel: &CancelToken,
    ) -> LoreResult<Option<Vec<String>>> {
        let embedder = match self.registry.embedding() {
            Ok(embedder) => embedder,
            Err(e) => {
                self.record_degradation("embedding", &e, "lexical-only");
                return Ok(None);
            }
        };
        let hits = embedder.embed(query).and_then(|query_vec| {
            cancel.check()?;
            accessor.similarity_search(kb, &query_vec, self.config.retrieval.vector_top_k)
        });
        match hits {
            Ok(hits) => Ok(Some(hits.into_iter().map(|(id, _)| id).collect())),
            Err(e @ LoreError::Retrieval(RetrievalError::Cancelled)) => Err(e),
            Err(e) => {
                self.record_degradation("embedding", &e, "lexical-only");
                Ok(None)
            }
        }
    }

    /// Lexical-path candidate ids, or `None` when the path degraded.
    fn lexical_candidates(
        &self,
        accessor: &Arc<VectorIndexAccessor>,
        kb: &KbId,
        query: &str,
        live_ids: &[String],
    ) -> Option<Vec<String>> {
        let tuning = &self.config.retrieval;
        let entry = self
            .lexical
            .get_or_build(kb, live_ids, || accessor.chunks_by_ids(kb, live_ids));
        match entry {
            Ok(entry) => Some(
                entry
                    .index
                    .search(query, tuning.lexical_top_k, tuning.bm25_k1, tuning.bm25_b)
                    .into_iter()
                    .map(|(id, _)| id)
                    .collect(),
            ),
            Err(e) => {
                self.record_degradation("lexical-index", &e, "vector-only");
                None
            }
        }
    }

    /// Resolve candidate ids to chunks. A missing metadata row means
    /// the stores disagree: repair once and retry; if ids still do not
    /// resolve after the repair, surface the inconsistency.
    fn resolve_chunks(
        &self,
        accessor: &VectorIndexAccessor,
        kb: &KbId,
        candidate_ids: &[String],
    ) -> LoreResult<HashMap<String, Chunk>> {
        let chunks = accessor.chunks_by_ids(kb, candidate_ids)?;
        if chunks.len() == candidate_ids.len() {
            return Ok(chunks.into_iter().map(|c| (c.chunk_id.clone(), c)).collect());
        }

        warn!(
            kb = %kb,
            requested = candidate_ids.len(),
            resolved = chunks.len(),
            "candidate metadata missing, repairing stores"
        );
        if let Ok(embedder) = self.registry.embedding() {
            accessor.repair_consistency(kb, embedder.as_ref())?;
            self.lexical.invalidate(kb);
        }
        let chunks = accessor.chunks_by_ids(kb, candidate_ids)?;
        if chunks.len() != candidate_ids.len() {
            accessor.check_consistency(kb)?;
        }
        Ok(chunks.into_iter().map(|c| (c.chunk_id.clone(), c)).collect())
    }

    /// Rerank in place when a reranker is configured and usable. Any
    /// reranker failure keeps the fused order; cancellation propagates.
    fn maybe_rerank(
        &self,
        query: &str,
        chunks: &mut [ScoredChunk],
        cancel: &CancelToken,
    ) -> LoreResult<()> {
        if self.config.provider.reranker == RerankerKind::None || chunks.is_empty() {
            return Ok(());
        }
        let reranker = match self.registry.reranker() {
            Ok(reranker) => reranker,
            Err(e) => {
                self.record_degradation("reranker", &e, "fused-order");
                return Ok(());
            }
        };

        let mut scores = Vec::with_capacity(chunks.len());
        for chunk in chunks.iter() {
            cancel.check()?;
            match reranker.score(query, &chunk.text) {
                Ok(score) => scores.push(score),
                Err(e) => {
                    self.record_degradation("reranker", &e, "fused-order");
                    return Ok(());
                }
            }
        }

        for (chunk, score) in chunks.iter_mut().zip(&scores) {
            chunk.score = *score;
        }
        chunks.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        Ok(())
    }

    /// Embed and store a batch of chunks, then drop the lexical index
    /// for the knowledge base so the next query sees the new corpus.
    pub fn upsert(
        &self,
        kb: &KbId,
        chunks: &[Chunk],
        cancel: &CancelToken,
    ) -> LoreResult<usize> {
        let accessor = self.accessor()?;
        let embedder = self.registry.embedding()?;
        let written = accessor.upsert(kb, chunks, embedder.as_ref(), cancel)?;
        self.lexical.invalidate(kb);
        Ok(written)
    }

    /// Remove a document's chunks and invalidate the lexical index.
    pub fn delete_document(&self, kb: &KbId, doc_id: &str) -> LoreResult<usize> {
        let accessor = self.accessor()?;
        let removed = accessor.delete_document(kb, doc_id)?;
        self.lexical.invalidate(kb);
        Ok(removed)
    }

    /// Drop the lexical index for a knowledge base, memory and disk.
    /// The next query rebuilds it from the live corpus.
    pub fn invalidate(&self, kb: &KbId) {
        self.lexical.invalidate(kb);
    }

    pub fn create_kb(&self, kb: &KbId) -> LoreResult<()> {
        self.accessor()?.create_kb(kb)
    }

    /// Delete a knowledge base. The default knowledge base is permanent.
    pub fn delete_kb(&self, kb: &KbId) -> LoreResult<()> {
        if kb.as_str() == DEFAULT_KB_NAME {
            return Err(LoreError::Config(format!(
                "the default knowledge base {DEFAULT_KB_NAME:?} cannot be deleted"
            )));
        }
        self.accessor()?.delete_kb(kb)?;
        self.lexical.invalidate(kb);
        Ok(())
    }

    pub fn list_knowledge_bases(&self) -> LoreResult<Vec<String>> {
        self.accessor()?.list_knowledge_bases()
    }

    pub fn list_documents(&self, kb: &KbId) -> LoreResult<Vec<DocumentMeta>> {
        self.accessor()?.list_documents(kb)
    }

    /// Reconcile the vector and metadata stores for one knowledge base.
    pub fn repair(&self, kb: &KbId) -> LoreResult<RepairReport> {
        let accessor = self.accessor()?;
        let embedder = self.registry.embedding()?;
        let report = accessor.repair_consistency(kb, embedder.as_ref())?;
        if !report.is_clean() {
            self.lexical.invalidate(kb);
        }
        Ok(report)
    }

    pub fn health_check(&self) -> HealthReport {
        self.registry.health_check()
    }

    pub fn status(&self, kind: ResourceKind) -> ResourceStatus {
        self.registry.status(kind)
    }

    /// Take all degradation events recorded since the last drain.
    pub fn drain_degradation_events(&self) -> Vec<DegradationEvent> {
        match self.degradations.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(_) => Vec::new(),
        }
    }

    /// Number of lexical index rebuilds performed so far.
    pub fn lexical_rebuild_count(&self) -> u64 {
        self.lexical.rebuild_count()
    }

    pub fn shutdown(&self) {
        self.registry.shutdown();
    }
}
