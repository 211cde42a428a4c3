//! # lore-retrieval
//!
//! The hybrid retrieval engine: a vector path over stored embeddings
//! and a BM25 lexical path over a cached in-memory index, fused with
//! Reciprocal Rank Fusion and optionally reranked. Either path may
//! degrade away at query time; retrieval fails only when both do.

pub mod bm25;
pub mod engine;
pub mod fuse;
pub mod lexical_cache;
pub mod tokenize;

pub use engine::RetrievalEngine;
pub use fuse::rrf_fuse;
pub use lexical_cache::LexicalIndexCache;
