use serde::{Deserialize, Serialize};

use super::defaults;

/// Which model backend to construct. A closed set, selected here at
/// construction time — never by runtime type inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Local Ollama server.
    Ollama,
    /// Any OpenAI-compatible HTTP API.
    #[serde(rename = "openai-compatible")]
    OpenAiCompatible,
}

/// Reranker selection. `None` means the fused order is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RerankerKind {
    None,
    Api,
}

/// Model-provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub base_url: String,
    pub api_key: String,
    pub embedding_model: String,
    pub generation_model: String,
    pub embedding_dimensions: usize,
    pub request_timeout_secs: u64,
    /// Initialization attempts per resource kind before `Failed`.
    pub max_init_attempts: u32,
    /// Base (seconds) of the exponential backoff between attempts.
    pub retry_delay_base_secs: u64,
    pub reranker: RerankerKind,
    pub reranker_model: String,
    pub reranker_base_url: String,
    pub reranker_api_key: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Ollama,
            base_url: defaults::DEFAULT_OLLAMA_BASE_URL.to_string(),
            api_key: String::new(),
            embedding_model: defaults::DEFAULT_EMBEDDING_MODEL.to_string(),
            generation_model: defaults::DEFAULT_GENERATION_MODEL.to_string(),
            embedding_dimensions: defaults::DEFAULT_EMBEDDING_DIMENSIONS,
            request_timeout_secs: defaults::DEFAULT_REQUEST_TIMEOUT_SECS,
            max_init_attempts: defaults::DEFAULT_MAX_INIT_ATTEMPTS,
            retry_delay_base_secs: defaults::DEFAULT_RETRY_DELAY_BASE_SECS,
            reranker: RerankerKind::None,
            reranker_model: String::new(),
            reranker_base_url: String::new(),
            reranker_api_key: String::new(),
        }
    }
}
