//! # lore-core
//!
//! Foundation crate for the lore hybrid-retrieval system.
//! Defines all types, traits, errors, config, and constants.
//! Every other crate in the workspace depends on this.

pub mod cache_key;
pub mod cancel;
pub mod config;
pub mod constants;
pub mod errors;
pub mod models;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use cache_key::cache_key;
pub use cancel::CancelToken;
pub use config::LoreConfig;
pub use errors::{LoreError, LoreResult};
pub use models::{Chunk, KbId, ResourceKind, ResourceStatus, RetrievalResult, ScoredChunk};
