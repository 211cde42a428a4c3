//! Data model shared across the workspace.

mod chunk;
mod knowledge_base;
mod resource;
mod retrieval_result;

pub use chunk::{Chunk, DocumentMeta};
pub use knowledge_base::KbId;
pub use resource::{DegradationEvent, HealthReport, ResourceKind, ResourceStatus};
pub use retrieval_result::{RetrievalResult, ScoredChunk};
