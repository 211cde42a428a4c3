//! End-to-end tests for the hybrid retrieval pipeline, with mock model
//! providers and a real SQLite store in a temp directory.

use std::sync::Arc;

use lore_core::config::{LoreConfig, RerankerKind};
use lore_core::errors::{LoreError, LoreResult, ProviderError, RetrievalError, StoreError};
use lore_core::models::{Chunk, KbId};
use lore_core::CancelToken;
use lore_core::traits::{IEmbeddingProvider, IGenerationProvider, IRerankProvider};
use lore_providers::providers::ProviderFactories;
use lore_providers::ResourceRegistry;
use lore_retrieval::RetrievalEngine;
use lore_store::queries::chunk_ops::RECOVERED_DOC_ID;
use lore_store::StoreEngine;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Deterministic embedder: identical texts embed identically, distinct
/// texts differ. Exact-text queries therefore rank their chunk first.
struct HashEmbedder;

impl IEmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> LoreResult<Vec<f32>> {
        let hash = blake3::hash(text.trim().as_bytes());
        Ok(hash.as_bytes()[..8].iter().map(|b| *b as f32 / 255.0).collect())
    }
    fn embed_batch(&self, texts: &[String]) -> LoreResult<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
    fn dimensions(&self) -> usize {
        8
    }
    fn name(&self) -> &str {
        "hash-embedder"
    }
    fn probe(&self) -> LoreResult<()> {
        Ok(())
    }
}

/// Silently drops the last vector from every batch, the way a provider
/// that truncates its response would.
struct ShortBatchEmbedder;

impl IEmbeddingProvider for ShortBatchEmbedder {
    fn embed(&self, text: &str) -> LoreResult<Vec<f32>> {
        HashEmbedder.embed(text)
    }
    fn embed_batch(&self, texts: &[String]) -> LoreResult<Vec<Vec<f32>>> {
        let mut vectors = HashEmbedder.embed_batch(texts)?;
        vectors.pop();
        Ok(vectors)
    }
    fn dimensions(&self) -> usize {
        8
    }
    fn name(&self) -> &str {
        "short-batch-embedder"
    }
    fn probe(&self) -> LoreResult<()> {
        Ok(())
    }
}

struct StubGenerator;

impl IGenerationProvider for StubGenerator {
    fn generate(&self, _prompt: &str) -> LoreResult<String> {
        Ok(String::new())
    }
    fn name(&self) -> &str {
        "stub-generator"
    }
    fn probe(&self) -> LoreResult<()> {
        Ok(())
    }
}

/// Scores 1.0 when the candidate contains the marker word, else 0.0.
struct MarkerReranker {
    marker: &'static str,
}

impl IRerankProvider for MarkerReranker {
    fn score(&self, _query: &str, candidate: &str) -> LoreResult<f64> {
        Ok(if candidate.contains(self.marker) { 1.0 } else { 0.0 })
    }
    fn name(&self) -> &str {
        "marker-reranker"
    }
    fn probe(&self) -> LoreResult<()> {
        Ok(())
    }
}

struct BrokenReranker;

impl IRerankProvider for BrokenReranker {
    fn score(&self, _query: &str, _candidate: &str) -> LoreResult<f64> {
        Err(ProviderError::RequestFailed {
            provider: "broken-reranker".to_string(),
            reason: "503".to_string(),
        }
        .into())
    }
    fn name(&self) -> &str {
        "broken-reranker"
    }
    fn probe(&self) -> LoreResult<()> {
        Ok(())
    }
}

fn working_factories() -> ProviderFactories {
    ProviderFactories {
        embedding: Box::new(|| Ok(Arc::new(HashEmbedder) as Arc<dyn IEmbeddingProvider>)),
        generation: Box::new(|| Ok(Arc::new(StubGenerator) as Arc<dyn IGenerationProvider>)),
        reranker: None,
    }
}

fn broken_embedding_factories() -> ProviderFactories {
    ProviderFactories {
        embedding: Box::new(|| {
            Err(ProviderError::RequestFailed {
                provider: "hash-embedder".to_string(),
                reason: "connection refused".to_string(),
            }
            .into())
        }),
        generation: Box::new(|| Ok(Arc::new(StubGenerator) as Arc<dyn IGenerationProvider>)),
        reranker: None,
    }
}

fn config_for(dir: &std::path::Path) -> LoreConfig {
    let mut config = LoreConfig::default();
    config.storage.storage_dir = dir.to_path_buf();
    config.provider.retry_delay_base_secs = 0;
    config
}

fn engine_with(dir: &std::path::Path, factories: ProviderFactories) -> RetrievalEngine {
    init_tracing();
    let config = config_for(dir);
    let db_path = config.storage.db_path();
    let registry = ResourceRegistry::with_factories(config.provider.clone(), factories, move || {
        StoreEngine::open(&db_path)
    });
    RetrievalEngine::with_registry(config, registry).unwrap()
}

fn kb() -> KbId {
    KbId::new("kb").unwrap()
}

fn chunk(id: &str, doc: &str, text: &str) -> Chunk {
    Chunk {
        chunk_id: id.to_string(),
        doc_id: doc.to_string(),
        text: text.to_string(),
    }
}

fn seed_corpus(engine: &RetrievalEngine) {
    engine
        .upsert(
            &kb(),
            &[
                chunk("a", "doc1", "rust ownership and borrowing rules"),
                chunk("b", "doc1", "garbage collection in managed runtimes"),
                chunk("c", "doc2", "borrowing a cup of sugar from neighbors"),
            ],
            &CancelToken::none(),
        )
        .unwrap();
}

#[test]
fn exact_text_query_ranks_its_chunk_first() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(dir.path(), working_factories());
    seed_corpus(&engine);

    let result = engine
        .retrieve(
            &kb(),
            "rust ownership and borrowing rules",
            3,
            &CancelToken::none(),
        )
        .unwrap();
    assert!(!result.is_empty());
    assert_eq!(result.chunks[0].chunk_id, "a");
    assert_eq!(result.chunks[0].doc_id, "doc1");
}

#[test]
fn top_k_bounds_the_result() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(dir.path(), working_factories());
    seed_corpus(&engine);

    let result = engine
        .retrieve(&kb(), "borrowing", 1, &CancelToken::none())
        .unwrap();
    assert_eq!(result.len(), 1);
}

#[test]
fn non_positive_top_k_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(dir.path(), working_factories());
    seed_corpus(&engine);

    for top_k in [0, -3] {
        let err = engine
            .retrieve(&kb(), "anything", top_k, &CancelToken::none())
            .unwrap_err();
        assert!(matches!(
            err,
            LoreError::Retrieval(RetrievalError::InvalidTopK { .. })
        ));
    }
}

#[test]
fn empty_query_and_empty_corpus_return_empty_success() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(dir.path(), working_factories());

    let result = engine
        .retrieve(&kb(), "   ", 5, &CancelToken::none())
        .unwrap();
    assert!(result.is_empty());

    let result = engine
        .retrieve(&kb(), "rust", 5, &CancelToken::none())
        .unwrap();
    assert!(result.is_empty());
}

#[test]
fn falls_back_to_lexical_when_embedding_is_down() {
    let dir = tempfile::tempdir().unwrap();
    {
        let engine = engine_with(dir.path(), working_factories());
        seed_corpus(&engine);
        engine.shutdown();
    }

    let engine = engine_with(dir.path(), broken_embedding_factories());
    let result = engine
        .retrieve(&kb(), "ownership rules", 3, &CancelToken::none())
        .unwrap();
    assert_eq!(result.chunks[0].chunk_id, "a");

    let events = engine.drain_degradation_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].component, "embedding");
    assert_eq!(events[0].fallback_used, "lexical-only");
    // Drained means drained.
    assert!(engine.drain_degradation_events().is_empty());
}

#[test]
fn upsert_invalidates_the_lexical_index() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(dir.path(), working_factories());
    seed_corpus(&engine);

    engine
        .retrieve(&kb(), "ownership", 3, &CancelToken::none())
        .unwrap();
    engine
        .retrieve(&kb(), "ownership", 3, &CancelToken::none())
        .unwrap();
    assert_eq!(engine.lexical_rebuild_count(), 1);

    engine
        .upsert(
            &kb(),
            &[chunk("d", "doc3", "zygote process forking in android")],
            &CancelToken::none(),
        )
        .unwrap();

    let result = engine
        .retrieve(&kb(), "zygote forking", 3, &CancelToken::none())
        .unwrap();
    assert_eq!(result.chunks[0].chunk_id, "d");
    assert_eq!(engine.lexical_rebuild_count(), 2);
}

#[test]
fn short_embedding_batch_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let factories = ProviderFactories {
        embedding: Box::new(|| Ok(Arc::new(ShortBatchEmbedder) as Arc<dyn IEmbeddingProvider>)),
        ..working_factories()
    };
    let engine = engine_with(dir.path(), factories);

    let err = engine
        .upsert(
            &kb(),
            &[
                chunk("a", "doc1", "rust ownership and borrowing rules"),
                chunk("b", "doc1", "garbage collection in managed runtimes"),
            ],
            &CancelToken::none(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        LoreError::Store(StoreError::PartialWrite { .. })
    ));

    // Nothing from the failed batch landed in either store.
    assert!(engine.list_documents(&kb()).unwrap().is_empty());
    let result = engine
        .retrieve(&kb(), "ownership", 3, &CancelToken::none())
        .unwrap();
    assert!(result.is_empty());
}

#[test]
fn retrieve_repairs_a_missing_metadata_row() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(dir.path(), working_factories());
    seed_corpus(&engine);
    engine
        .retrieve(&kb(), "ownership", 3, &CancelToken::none())
        .unwrap();

    // Orphan one vector behind the engine's back.
    let db_path = config_for(dir.path()).storage.db_path();
    let store = StoreEngine::open(&db_path).unwrap();
    store
        .with_conn(|c| {
            c.execute(
                "DELETE FROM chunk_meta WHERE kb = 'kb' AND chunk_id = 'a'",
                [],
            )
            .map_err(|e| {
                LoreError::from(StoreError::Sqlite {
                    message: e.to_string(),
                })
            })?;
            Ok(())
        })
        .unwrap();

    // The vector path still surfaces "a"; resolution repairs the stores
    // and the chunk comes back under the recovery sentinel.
    let result = engine
        .retrieve(
            &kb(),
            "rust ownership and borrowing rules",
            3,
            &CancelToken::none(),
        )
        .unwrap();
    let recovered = result
        .chunks
        .iter()
        .find(|c| c.chunk_id == "a")
        .expect("orphaned vector must resolve after repair");
    assert_eq!(recovered.doc_id, RECOVERED_DOC_ID);

    // A second query sees consistent stores and needs no further repair.
    let report = engine.repair(&kb()).unwrap();
    assert!(report.is_clean());
}

#[test]
fn deleted_document_disappears_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(dir.path(), working_factories());
    seed_corpus(&engine);
    engine
        .retrieve(&kb(), "borrowing", 3, &CancelToken::none())
        .unwrap();

    let removed = engine.delete_document(&kb(), "doc1").unwrap();
    assert_eq!(removed, 2);

    let result = engine
        .retrieve(&kb(), "rust ownership and borrowing rules", 3, &CancelToken::none())
        .unwrap();
    assert!(result.chunks.iter().all(|c| c.doc_id != "doc1"));
}

#[test]
fn reranker_reorders_the_fused_candidates() {
    let dir = tempfile::tempdir().unwrap();
    init_tracing();
    let mut config = config_for(dir.path());
    config.provider.reranker = RerankerKind::Api;
    config.retrieval.rerank_input_size = 3;

    let factories = ProviderFactories {
        reranker: Some(Box::new(|| {
            Ok(Arc::new(MarkerReranker { marker: "sugar" }) as Arc<dyn IRerankProvider>)
        })),
        ..working_factories()
    };
    let db_path = config.storage.db_path();
    let registry = ResourceRegistry::with_factories(config.provider.clone(), factories, move || {
        StoreEngine::open(&db_path)
    });
    let engine = RetrievalEngine::with_registry(config, registry).unwrap();
    seed_corpus(&engine);

    let result = engine
        .retrieve(&kb(), "borrowing rules", 2, &CancelToken::none())
        .unwrap();
    assert_eq!(result.chunks[0].chunk_id, "c");
    assert!((result.chunks[0].score - 1.0).abs() < 1e-12);
}

#[test]
fn reranker_failure_keeps_the_fused_order() {
    let dir = tempfile::tempdir().unwrap();
    init_tracing();
    let mut config = config_for(dir.path());
    config.provider.reranker = RerankerKind::Api;

    let factories = ProviderFactories {
        reranker: Some(Box::new(|| {
            Ok(Arc::new(BrokenReranker) as Arc<dyn IRerankProvider>)
        })),
        ..working_factories()
    };
    let db_path = config.storage.db_path();
    let registry = ResourceRegistry::with_factories(config.provider.clone(), factories, move || {
        StoreEngine::open(&db_path)
    });
    let engine = RetrievalEngine::with_registry(config, registry).unwrap();
    seed_corpus(&engine);

    let result = engine
        .retrieve(
            &kb(),
            "rust ownership and borrowing rules",
            3,
            &CancelToken::none(),
        )
        .unwrap();
    assert_eq!(result.chunks[0].chunk_id, "a");

    let events = engine.drain_degradation_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].component, "reranker");
    assert_eq!(events[0].fallback_used, "fused-order");
}

#[test]
fn cancelled_query_errors_without_results() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(dir.path(), working_factories());
    seed_corpus(&engine);

    let token = CancelToken::none();
    token.cancel();
    let err = engine
        .retrieve(&kb(), "ownership", 3, &token)
        .unwrap_err();
    assert!(matches!(
        err,
        LoreError::Retrieval(RetrievalError::Cancelled)
    ));
}

#[test]
fn concurrent_queries_rebuild_the_index_once() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(engine_with(dir.path(), working_factories()));
    seed_corpus(&engine);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(std::thread::spawn(move || {
            engine
                .retrieve(&kb(), "borrowing", 3, &CancelToken::none())
                .unwrap()
        }));
    }
    for handle in handles {
        let result = handle.join().unwrap();
        assert!(!result.is_empty());
    }
    assert_eq!(engine.lexical_rebuild_count(), 1);
}

#[test]
fn lexical_index_survives_engine_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let engine = engine_with(dir.path(), working_factories());
        seed_corpus(&engine);
        engine
            .retrieve(&kb(), "ownership", 3, &CancelToken::none())
            .unwrap();
        assert_eq!(engine.lexical_rebuild_count(), 1);
        engine.shutdown();
    }

    let engine = engine_with(dir.path(), working_factories());
    let result = engine
        .retrieve(&kb(), "ownership", 3, &CancelToken::none())
        .unwrap();
    assert!(!result.is_empty());
    assert_eq!(engine.lexical_rebuild_count(), 0);
}

#[test]
fn knowledge_base_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(dir.path(), working_factories());

    let projects = KbId::new("projects").unwrap();
    engine.create_kb(&projects).unwrap();
    assert!(engine.create_kb(&projects).is_err());

    engine
        .upsert(
            &projects,
            &[chunk("p1", "readme", "project overview")],
            &CancelToken::none(),
        )
        .unwrap();
    let docs = engine.list_documents(&projects).unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].doc_id, "readme");

    engine.delete_kb(&projects).unwrap();
    assert!(engine.list_knowledge_bases().unwrap().is_empty());

    let default = RetrievalEngine::default_kb();
    assert!(engine.delete_kb(&default).is_err());
}

#[test]
fn repair_is_a_noop_on_consistent_stores() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(dir.path(), working_factories());
    seed_corpus(&engine);

    let report = engine.repair(&kb()).unwrap();
    assert!(report.is_clean());
}

#[test]
fn shutdown_rejects_further_queries() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(dir.path(), working_factories());
    seed_corpus(&engine);
    engine.shutdown();

    let err = engine
        .upsert(&kb(), &[chunk("x", "doc", "text")], &CancelToken::none())
        .unwrap_err();
    assert!(matches!(
        err,
        LoreError::Provider(ProviderError::ShutDown)
    ));
}
