//! # lore-providers
//!
//! Owns the long-lived handles to the embedding model, generation model,
//! optional reranker, and the vector-store connection. Provides guarded
//! lazy initialization, bounded-backoff retry, health probing, and
//! idempotent shutdown.

pub mod backoff;
pub mod providers;
pub mod registry;
pub mod slot;

pub use registry::ResourceRegistry;
pub use slot::LazySlot;
