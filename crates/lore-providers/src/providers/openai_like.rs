//! Clients for any OpenAI-compatible HTTP API (OpenRouter, DeepSeek,
//! Moonshot, self-hosted gateways, ...).

use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::json;

use lore_core::config::ProviderConfig;
use lore_core::errors::{LoreError, LoreResult, ProviderError};
use lore_core::traits::{IEmbeddingProvider, IGenerationProvider};

fn request_failed(reason: impl ToString) -> ProviderError {
    ProviderError::RequestFailed {
        provider: "openai-compatible".to_string(),
        reason: reason.to_string(),
    }
}

fn validate(config: &ProviderConfig) -> LoreResult<()> {
    if config.base_url.is_empty() || config.api_key.is_empty() {
        return Err(LoreError::Config(
            "openai-compatible provider requires base_url and api_key".to_string(),
        ));
    }
    Ok(())
}

fn build_client(config: &ProviderConfig) -> LoreResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| request_failed(e).into())
}

fn probe_models(client: &Client, base_url: &str, api_key: &str, kind: &str) -> LoreResult<()> {
    client
        .get(format!("{base_url}/models"))
        .bearer_auth(api_key)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| ProviderError::ProbeFailed {
            kind: kind.to_string(),
            reason: e.to_string(),
        })?;
    Ok(())
}

/// `/embeddings` endpoint client.
pub struct OpenAiCompatEmbedding {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl OpenAiCompatEmbedding {
    pub fn connect(config: &ProviderConfig) -> LoreResult<Self> {
        validate(config)?;
        let provider = Self {
            client: build_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.embedding_model.clone(),
            dimensions: config.embedding_dimensions,
        };
        provider.probe()?;
        Ok(provider)
    }

    fn request(&self, inputs: &[&str]) -> LoreResult<Vec<Vec<f32>>> {
        let resp = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": inputs }))
            .send()
            .map_err(request_failed)?
            .error_for_status()
            .map_err(request_failed)?;

        let body: serde_json::Value = resp.json().map_err(request_failed)?;
        let data = body["data"]
            .as_array()
            .ok_or_else(|| request_failed("response missing 'data' array"))?;

        let mut out = Vec::with_capacity(data.len());
        for item in data {
            let vec = item["embedding"]
                .as_array()
                .ok_or_else(|| request_failed("item missing 'embedding'"))?
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect();
            out.push(vec);
        }
        Ok(out)
    }
}

impl IEmbeddingProvider for OpenAiCompatEmbedding {
    fn embed(&self, text: &str) -> LoreResult<Vec<f32>> {
        let mut vecs = self.request(&[text])?;
        vecs.pop()
            .ok_or_else(|| request_failed("empty embedding response").into())
    }

    fn embed_batch(&self, texts: &[String]) -> LoreResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.request(&refs)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "openai-compatible-embedding"
    }

    fn probe(&self) -> LoreResult<()> {
        probe_models(&self.client, &self.base_url, &self.api_key, "embedding")
    }
}

/// `/chat/completions` endpoint client.
pub struct OpenAiCompatGeneration {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatGeneration {
    pub fn connect(config: &ProviderConfig) -> LoreResult<Self> {
        validate(config)?;
        let provider = Self {
            client: build_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.generation_model.clone(),
        };
        provider.probe()?;
        Ok(provider)
    }
}

impl IGenerationProvider for OpenAiCompatGeneration {
    fn generate(&self, prompt: &str) -> LoreResult<String> {
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
            }))
            .send()
            .map_err(request_failed)?
            .error_for_status()
            .map_err(request_failed)?;

        let body: serde_json::Value = resp.json().map_err(request_failed)?;
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| request_failed("response missing message content").into())
    }

    fn name(&self) -> &str {
        "openai-compatible-generation"
    }

    fn probe(&self) -> LoreResult<()> {
        probe_models(&self.client, &self.base_url, &self.api_key, "generation")
    }
}
