//! Local Ollama clients for embedding and generation.

use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::json;

use lore_core::config::ProviderConfig;
use lore_core::errors::{LoreResult, ProviderError};
use lore_core::traits::{IEmbeddingProvider, IGenerationProvider};

fn request_failed(reason: impl ToString) -> ProviderError {
    ProviderError::RequestFailed {
        provider: "ollama".to_string(),
        reason: reason.to_string(),
    }
}

fn build_client(timeout_secs: u64) -> LoreResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| request_failed(e).into())
}

/// Embedding via the Ollama `/api/embeddings` endpoint.
pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbedding {
    /// Build the client and verify the server is reachable.
    pub fn connect(config: &ProviderConfig) -> LoreResult<Self> {
        let provider = Self {
            client: build_client(config.request_timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.embedding_model.clone(),
            dimensions: config.embedding_dimensions,
        };
        provider.probe()?;
        Ok(provider)
    }

    fn embed_one(&self, text: &str) -> LoreResult<Vec<f32>> {
        let resp = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&json!({ "model": self.model, "prompt": text }))
            .send()
            .map_err(request_failed)?
            .error_for_status()
            .map_err(request_failed)?;

        let body: serde_json::Value = resp.json().map_err(request_failed)?;
        let vec = body["embedding"]
            .as_array()
            .ok_or_else(|| request_failed("response missing 'embedding' array"))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        Ok(vec)
    }
}

impl IEmbeddingProvider for OllamaEmbedding {
    fn embed(&self, text: &str) -> LoreResult<Vec<f32>> {
        self.embed_one(text)
    }

    fn embed_batch(&self, texts: &[String]) -> LoreResult<Vec<Vec<f32>>> {
        // Ollama has no batch endpoint; sequential calls.
        texts.iter().map(|t| self.embed_one(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "ollama-embedding"
    }

    fn probe(&self) -> LoreResult<()> {
        self.client
            .get(format!("{}/api/version", self.base_url))
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| ProviderError::ProbeFailed {
                kind: "embedding".to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

/// Generation via the Ollama `/api/generate` endpoint.
pub struct OllamaGeneration {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaGeneration {
    pub fn connect(config: &ProviderConfig) -> LoreResult<Self> {
        let provider = Self {
            client: build_client(config.request_timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.generation_model.clone(),
        };
        provider.probe()?;
        Ok(provider)
    }
}

impl IGenerationProvider for OllamaGeneration {
    fn generate(&self, prompt: &str) -> LoreResult<String> {
        let resp = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&json!({ "model": self.model, "prompt": prompt, "stream": false }))
            .send()
            .map_err(request_failed)?
            .error_for_status()
            .map_err(request_failed)?;

        let body: serde_json::Value = resp.json().map_err(request_failed)?;
        body["response"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| request_failed("response missing 'response' field").into())
    }

    fn name(&self) -> &str {
        "ollama-generation"
    }

    fn probe(&self) -> LoreResult<()> {
        self.client
            .get(format!("{}/api/version", self.base_url))
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| ProviderError::ProbeFailed {
                kind: "generation".to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
