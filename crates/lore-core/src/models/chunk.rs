use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The unit indexed by both retrieval paths.
///
/// Chunks arrive at the ingestion boundary already segmented; the core
/// never parses files. `chunk_id` is a stable content- or path-derived
/// key and must be unique within its knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub doc_id: String,
    pub text: String,
}

impl Chunk {
    pub fn new(
        chunk_id: impl Into<String>,
        doc_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            doc_id: doc_id.into(),
            text: text.into(),
        }
    }
}

/// Per-document metadata kept alongside the vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub doc_id: String,
    pub byte_len: u64,
    pub ingested_at: DateTime<Utc>,
}
