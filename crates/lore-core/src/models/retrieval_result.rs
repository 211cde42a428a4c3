use serde::{Deserialize, Serialize};

/// One ranked passage in a retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk_id: String,
    /// Final score: fused RRF score, or reranker score when reranking ran.
    pub score: f64,
    pub text: String,
    pub doc_id: String,
}

/// Ranked passages produced fresh per query; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunks: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }
}
