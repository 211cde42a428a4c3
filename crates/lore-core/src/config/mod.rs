//! Configuration for all subsystems, loadable from TOML.

mod provider_config;
mod retrieval_config;
mod storage_config;

pub use provider_config::{ProviderConfig, ProviderKind, RerankerKind};
pub use retrieval_config::RetrievalConfig;
pub use storage_config::StorageConfig;

use serde::{Deserialize, Serialize};

use crate::errors::{LoreError, LoreResult};

/// Default values shared by the config structs.
pub mod defaults {
    pub use crate::constants::{
        DEFAULT_BM25_B, DEFAULT_BM25_K1, DEFAULT_FINAL_TOP_K, DEFAULT_LEXICAL_TOP_K,
        DEFAULT_LEXICAL_WEIGHT, DEFAULT_MAX_INIT_ATTEMPTS, DEFAULT_RETRY_DELAY_BASE_SECS,
        DEFAULT_RRF_K, DEFAULT_VECTOR_TOP_K, DEFAULT_VECTOR_WEIGHT,
    };

    pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
    pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
    pub const DEFAULT_GENERATION_MODEL: &str = "qwen2.5:32b";
    pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 360;
    pub const DEFAULT_DB_FILE: &str = "lore.db";
    pub const DEFAULT_CACHE_DIR: &str = "lexical_cache";
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoreConfig {
    pub provider: ProviderConfig,
    pub storage: StorageConfig,
    pub retrieval: RetrievalConfig,
}

impl LoreConfig {
    /// Parse a TOML document. Missing sections and fields take defaults.
    pub fn from_toml(text: &str) -> LoreResult<Self> {
        toml::from_str(text).map_err(|e| LoreError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_all_defaults() {
        let cfg = LoreConfig::from_toml("").unwrap();
        assert_eq!(cfg.retrieval.rrf_k, 60);
        assert_eq!(cfg.retrieval.final_top_k, 5);
        assert_eq!(cfg.provider.max_init_attempts, 3);
    }

    #[test]
    fn partial_override() {
        let cfg = LoreConfig::from_toml(
            r#"
            [retrieval]
            final_top_k = 10

            [provider]
            kind = "openai-compatible"
            base_url = "https://api.example.com/v1"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.retrieval.final_top_k, 10);
        assert_eq!(cfg.retrieval.vector_top_k, 20);
        assert_eq!(cfg.provider.kind, ProviderKind::OpenAiCompatible);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        assert!(matches!(
            LoreConfig::from_toml("retrieval = 3"),
            Err(LoreError::Config(_))
        ));
    }
}
