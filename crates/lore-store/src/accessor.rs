//! The Vector Index Accessor: per-knowledge-base view over the vector
//! and metadata tables, with cached index handles, serialized mutations,
//! and reactive consistency repair.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use moka::sync::Cache;
use tracing::{debug, info, warn};

use lore_core::errors::{LoreResult, StoreError};
use lore_core::models::{Chunk, DocumentMeta, KbId};
use lore_core::traits::IEmbeddingProvider;
use lore_core::CancelToken;

use crate::engine::StoreEngine;
use crate::queries::chunk_ops;
use crate::queries::vector_search::vector_search;
use crate::to_store_err;

/// Cached handles per knowledge base. Handles are cheap markers; the
/// bound just keeps an unbounded namespace churn from pinning memory.
const HANDLE_CACHE_CAPACITY: u64 = 64;

/// Marker for an opened knowledge-base namespace. Holding one means the
/// `knowledge_bases` row exists and both tables accept the namespace.
pub struct IndexHandle {
    pub kb: KbId,
    pub opened_at: DateTime<Utc>,
}

/// What a consistency repair restored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Vector rows re-embedded from surviving metadata text.
    pub restored_vectors: usize,
    /// Metadata rows reconstructed for orphaned vectors.
    pub restored_metadata: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.restored_vectors == 0 && self.restored_metadata == 0
    }
}

pub struct VectorIndexAccessor {
    engine: Arc<StoreEngine>,
    handles: Cache<String, Arc<IndexHandle>>,
    mutation_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl VectorIndexAccessor {
    pub fn new(engine: Arc<StoreEngine>) -> Self {
        Self {
            engine,
            handles: Cache::new(HANDLE_CACHE_CAPACITY),
            mutation_locks: DashMap::new(),
        }
    }

    /// Return the cached handle for a knowledge base, opening (and
    /// creating) the namespace on first access.
    pub fn get_or_build_index(&self, kb: &KbId) -> LoreResult<Arc<IndexHandle>> {
        if let Some(handle) = self.handles.get(kb.as_str()) {
            return Ok(handle);
        }
        let created = self
            .engine
            .with_conn(|c| chunk_ops::ensure_kb(c, kb.as_str()))?;
        if created {
            info!(kb = %kb, "created knowledge base namespace");
        } else {
            debug!(kb = %kb, "opened knowledge base namespace");
        }
        let handle = Arc::new(IndexHandle {
            kb: kb.clone(),
            opened_at: Utc::now(),
        });
        self.handles.insert(kb.as_str().to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Per-kb mutation lock. Writers serialize; readers do not take it.
    fn mutation_guard(&self, kb: &KbId) -> Arc<Mutex<()>> {
        self.mutation_locks
            .entry(kb.as_str().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn lock_mutations<'a>(&self, lock: &'a Mutex<()>) -> LoreResult<MutexGuard<'a, ()>> {
        lock.lock()
            .map_err(|e| to_store_err(format!("mutation lock poisoned: {e}")))
    }

    /// Embed and write a batch of chunks. Same chunk ids overwrite in
    /// place; the whole batch lands in both tables or in neither.
    pub fn upsert(
        &self,
        kb: &KbId,
        chunks: &[Chunk],
        embedder: &dyn IEmbeddingProvider,
        cancel: &CancelToken,
    ) -> LoreResult<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        self.get_or_build_index(kb)?;
        let lock = self.mutation_guard(kb);
        let _guard = self.lock_mutations(&lock)?;

        cancel.check()?;
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts)?;
        cancel.check()?;

        if embeddings.len() != chunks.len() {
            return Err(StoreError::PartialWrite {
                kb: kb.to_string(),
                reason: format!(
                    "embedder returned {} vectors for {} chunks",
                    embeddings.len(),
                    chunks.len()
                ),
            }
            .into());
        }

        let rows: Vec<(&Chunk, &[f32])> = chunks
            .iter()
            .zip(embeddings.iter().map(|e| e.as_slice()))
            .collect();
        let written = self
            .engine
            .with_conn(|c| chunk_ops::upsert_chunks(c, kb.as_str(), &rows))?;
        debug!(kb = %kb, chunks = written, "upserted chunk batch");
        Ok(written)
    }

    /// Remove every chunk of a document from both tables. Returns the
    /// number of chunk ids removed; unknown documents and unknown
    /// knowledge bases remove zero (deletion never opens a namespace).
    pub fn delete_document(&self, kb: &KbId, doc_id: &str) -> LoreResult<usize> {
        let exists = self
            .engine
            .with_conn(|c| chunk_ops::kb_exists(c, kb.as_str()))?;
        if !exists {
            return Ok(0);
        }
        let lock = self.mutation_guard(kb);
        let _guard = self.lock_mutations(&lock)?;

        let removed = self
            .engine
            .with_conn(|c| chunk_ops::delete_document(c, kb.as_str(), doc_id))?;
        debug!(kb = %kb, doc_id, removed, "deleted document chunks");
        Ok(removed)
    }

    /// Top-k nearest chunk ids by cosine similarity, best first.
    pub fn similarity_search(
        &self,
        kb: &KbId,
        query: &[f32],
        top_k: usize,
    ) -> LoreResult<Vec<(String, f64)>> {
        self.engine
            .with_conn(|c| vector_search(c, kb.as_str(), query, top_k))
    }

    /// Resolve ids to full chunks, preserving order; missing ids drop out.
    pub fn chunks_by_ids(&self, kb: &KbId, ids: &[String]) -> LoreResult<Vec<Chunk>> {
        self.engine
            .with_conn(|c| chunk_ops::chunks_by_ids(c, kb.as_str(), ids))
    }

    /// Chunk ids currently in the metadata store, ascending. This is
    /// the authoritative membership list for lexical index staleness.
    pub fn live_chunk_ids(&self, kb: &KbId) -> LoreResult<Vec<String>> {
        self.engine
            .with_conn(|c| chunk_ops::meta_chunk_ids(c, kb.as_str()))
    }

    /// Error with `Inconsistent` when the vector and metadata stores
    /// disagree on which chunk ids exist.
    pub fn check_consistency(&self, kb: &KbId) -> LoreResult<()> {
        let (vector_ids, meta_ids) = self.id_sets(kb)?;
        if vector_ids == meta_ids {
            Ok(())
        } else {
            Err(StoreError::Inconsistent {
                kb: kb.to_string(),
                vectors: vector_ids.len(),
                metadata: meta_ids.len(),
            }
            .into())
        }
    }

    /// Reconcile the two stores. Metadata rows without a vector are
    /// re-embedded from their stored text; vectors without metadata get
    /// a placeholder row under `__recovered__` so they stay addressable.
    pub fn repair_consistency(
        &self,
        kb: &KbId,
        embedder: &dyn IEmbeddingProvider,
    ) -> LoreResult<RepairReport> {
        self.get_or_build_index(kb)?;
        let lock = self.mutation_guard(kb);
        let _guard = self.lock_mutations(&lock)?;

        let (vector_ids, meta_ids) = self.id_sets(kb)?;
        let mut report = RepairReport::default();

        for chunk_id in vector_ids.difference(&meta_ids) {
            self.engine
                .with_conn(|c| chunk_ops::insert_recovered_meta(c, kb.as_str(), chunk_id))?;
            report.restored_metadata += 1;
        }

        for chunk_id in meta_ids.difference(&vector_ids) {
            let text = self
                .engine
                .with_conn(|c| chunk_ops::chunk_text(c, kb.as_str(), chunk_id))?
                .unwrap_or_default();
            let embedding = embedder.embed(&text)?;
            self.engine
                .with_conn(|c| chunk_ops::insert_vector(c, kb.as_str(), chunk_id, &embedding))?;
            report.restored_vectors += 1;
        }

        if !report.is_clean() {
            warn!(
                kb = %kb,
                restored_vectors = report.restored_vectors,
                restored_metadata = report.restored_metadata,
                "repaired vector/metadata inconsistency"
            );
        }
        Ok(report)
    }

    fn id_sets(&self, kb: &KbId) -> LoreResult<(HashSet<String>, HashSet<String>)> {
        self.engine.with_conn(|c| {
            let vectors = chunk_ops::vector_chunk_ids(c, kb.as_str())?;
            let meta = chunk_ops::meta_chunk_ids(c, kb.as_str())?;
            Ok((
                vectors.into_iter().collect(),
                meta.into_iter().collect(),
            ))
        })
    }

    /// Create a knowledge base; errors if the name is taken.
    pub fn create_kb(&self, kb: &KbId) -> LoreResult<()> {
        let created = self
            .engine
            .with_conn(|c| chunk_ops::ensure_kb(c, kb.as_str()))?;
        if !created {
            return Err(StoreError::KnowledgeBaseExists { kb: kb.to_string() }.into());
        }
        info!(kb = %kb, "created knowledge base");
        Ok(())
    }

    /// Delete a knowledge base and all of its chunks.
    pub fn delete_kb(&self, kb: &KbId) -> LoreResult<()> {
        let lock = self.mutation_guard(kb);
        let _guard = self.lock_mutations(&lock)?;

        self.engine
            .with_conn(|c| chunk_ops::delete_kb(c, kb.as_str()))?;
        self.handles.invalidate(kb.as_str());
        info!(kb = %kb, "deleted knowledge base");
        Ok(())
    }

    pub fn list_knowledge_bases(&self) -> LoreResult<Vec<String>> {
        self.engine.with_conn(chunk_ops::list_kbs)
    }

    pub fn list_documents(&self, kb: &KbId) -> LoreResult<Vec<DocumentMeta>> {
        self.engine
            .with_conn(|c| chunk_ops::list_documents(c, kb.as_str()))
    }
}
