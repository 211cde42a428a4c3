use serde::{Deserialize, Serialize};

use super::defaults;

/// Hybrid-retrieval tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates taken from the vector path before fusion.
    pub vector_top_k: usize,
    /// Candidates taken from the lexical path before fusion.
    pub lexical_top_k: usize,
    /// RRF smoothing constant.
    pub rrf_k: u32,
    pub vector_weight: f64,
    pub lexical_weight: f64,
    /// Passages returned to the caller.
    pub final_top_k: usize,
    /// Fused candidates handed to the reranker. Clamped up to top_k.
    pub rerank_input_size: usize,
    /// BM25 term-saturation constant.
    pub bm25_k1: f64,
    /// BM25 length-normalization constant.
    pub bm25_b: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_top_k: defaults::DEFAULT_VECTOR_TOP_K,
            lexical_top_k: defaults::DEFAULT_LEXICAL_TOP_K,
            rrf_k: defaults::DEFAULT_RRF_K,
            vector_weight: defaults::DEFAULT_VECTOR_WEIGHT,
            lexical_weight: defaults::DEFAULT_LEXICAL_WEIGHT,
            final_top_k: defaults::DEFAULT_FINAL_TOP_K,
            rerank_input_size: defaults::DEFAULT_FINAL_TOP_K,
            bm25_k1: defaults::DEFAULT_BM25_K1,
            bm25_b: defaults::DEFAULT_BM25_B,
        }
    }
}
