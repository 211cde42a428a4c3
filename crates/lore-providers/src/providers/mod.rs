//! The closed set of model-provider variants.
//!
//! Which backend serves each capability is decided here, once, from
//! configuration — callers only ever see the capability traits.

mod ollama;
mod openai_like;
mod rerank_api;

pub use ollama::{OllamaEmbedding, OllamaGeneration};
pub use openai_like::{OpenAiCompatEmbedding, OpenAiCompatGeneration};
pub use rerank_api::ApiReranker;

use std::sync::Arc;

use lore_core::config::{ProviderConfig, ProviderKind, RerankerKind};
use lore_core::errors::LoreResult;
use lore_core::traits::{IEmbeddingProvider, IGenerationProvider, IRerankProvider};

type Factory<T> = Box<dyn Fn() -> LoreResult<Arc<T>> + Send + Sync>;

/// Construction recipes for each resource kind, fixed at startup.
pub struct ProviderFactories {
    pub embedding: Factory<dyn IEmbeddingProvider>,
    pub generation: Factory<dyn IGenerationProvider>,
    /// `None` when the reranker is configured off.
    pub reranker: Option<Factory<dyn IRerankProvider>>,
}

impl ProviderFactories {
    /// Select variants from configuration.
    pub fn from_config(config: &ProviderConfig) -> Self {
        let embedding: Factory<dyn IEmbeddingProvider> = match config.kind {
            ProviderKind::Ollama => {
                let cfg = config.clone();
                Box::new(move || {
                    let p = OllamaEmbedding::connect(&cfg)?;
                    Ok(Arc::new(p) as Arc<dyn IEmbeddingProvider>)
                })
            }
            ProviderKind::OpenAiCompatible => {
                let cfg = config.clone();
                Box::new(move || {
                    let p = OpenAiCompatEmbedding::connect(&cfg)?;
                    Ok(Arc::new(p) as Arc<dyn IEmbeddingProvider>)
                })
            }
        };

        let generation: Factory<dyn IGenerationProvider> = match config.kind {
            ProviderKind::Ollama => {
                let cfg = config.clone();
                Box::new(move || {
                    let p = OllamaGeneration::connect(&cfg)?;
                    Ok(Arc::new(p) as Arc<dyn IGenerationProvider>)
                })
            }
            ProviderKind::OpenAiCompatible => {
                let cfg = config.clone();
                Box::new(move || {
                    let p = OpenAiCompatGeneration::connect(&cfg)?;
                    Ok(Arc::new(p) as Arc<dyn IGenerationProvider>)
                })
            }
        };

        let reranker: Option<Factory<dyn IRerankProvider>> = match config.reranker {
            RerankerKind::None => None,
            RerankerKind::Api => {
                let cfg = config.clone();
                Some(Box::new(move || {
                    let p = ApiReranker::connect(&cfg)?;
                    Ok(Arc::new(p) as Arc<dyn IRerankProvider>)
                }))
            }
        };

        Self {
            embedding,
            generation,
            reranker,
        }
    }
}
