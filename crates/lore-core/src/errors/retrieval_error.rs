/// Retrieval subsystem errors.
///
/// `NoRetrievalPath` is the "retrieval failed" signal distinct from an
/// empty (but successful) result, so the generation layer can choose its
/// response accordingly.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("top_k must be positive, got {top_k}")]
    InvalidTopK { top_k: isize },

    #[error("no retrieval path available")]
    NoRetrievalPath,

    #[error("query cancelled")]
    Cancelled,

    #[error("search failed: {reason}")]
    SearchFailed { reason: String },
}
