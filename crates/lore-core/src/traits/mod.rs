//! Capability traits at the provider seams.

mod provider;

pub use provider::{IEmbeddingProvider, IGenerationProvider, IProbe, IRerankProvider};
