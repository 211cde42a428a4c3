use crate::errors::LoreResult;

/// Anything the resource registry can liveness-probe.
pub trait IProbe: Send + Sync {
    fn probe(&self) -> LoreResult<()>;
}

/// Embedding generation provider.
pub trait IEmbeddingProvider: Send + Sync {
    /// Embed a single text, returning a fixed-length vector of floats.
    fn embed(&self, text: &str) -> LoreResult<Vec<f32>>;

    /// Embed a batch of texts.
    fn embed_batch(&self, texts: &[String]) -> LoreResult<Vec<Vec<f32>>>;

    /// The dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Lightweight liveness probe.
    fn probe(&self) -> LoreResult<()>;
}

/// Answer generation provider.
///
/// Generation itself happens outside the retrieval core; only the
/// handle lifecycle (probe + registry status) is tracked here.
pub trait IGenerationProvider: Send + Sync {
    /// Generate a completion for the given prompt.
    fn generate(&self, prompt: &str) -> LoreResult<String>;

    fn name(&self) -> &str;

    /// Lightweight liveness probe.
    fn probe(&self) -> LoreResult<()>;
}

/// Relevance reranking provider (optional).
pub trait IRerankProvider: Send + Sync {
    /// Score the relevance of `candidate` to `query`. Higher is better.
    fn score(&self, query: &str, candidate: &str) -> LoreResult<f64>;

    fn name(&self) -> &str;

    /// Lightweight liveness probe.
    fn probe(&self) -> LoreResult<()>;
}
