//! Reranker client for OpenAI-compatible `/rerank` endpoints.

use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::json;

use lore_core::config::ProviderConfig;
use lore_core::errors::{LoreError, LoreResult, ProviderError};
use lore_core::traits::IRerankProvider;

fn request_failed(reason: impl ToString) -> ProviderError {
    ProviderError::RequestFailed {
        provider: "rerank-api".to_string(),
        reason: reason.to_string(),
    }
}

/// Scores (query, candidate) pairs via a hosted cross-encoder.
pub struct ApiReranker {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ApiReranker {
    pub fn connect(config: &ProviderConfig) -> LoreResult<Self> {
        if config.reranker_base_url.is_empty() || config.reranker_model.is_empty() {
            return Err(LoreError::Config(
                "api reranker requires reranker_base_url and reranker_model".to_string(),
            ));
        }
        let provider = Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.request_timeout_secs))
                .build()
                .map_err(request_failed)?,
            base_url: config.reranker_base_url.trim_end_matches('/').to_string(),
            api_key: config.reranker_api_key.clone(),
            model: config.reranker_model.clone(),
        };
        provider.probe()?;
        Ok(provider)
    }
}

impl IRerankProvider for ApiReranker {
    fn score(&self, query: &str, candidate: &str) -> LoreResult<f64> {
        let resp = self
            .client
            .post(format!("{}/rerank", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "query": query,
                "documents": [candidate],
                "top_n": 1,
            }))
            .send()
            .map_err(request_failed)?
            .error_for_status()
            .map_err(request_failed)?;

        let body: serde_json::Value = resp.json().map_err(request_failed)?;
        body["results"][0]["relevance_score"]
            .as_f64()
            .ok_or_else(|| request_failed("response missing relevance_score").into())
    }

    fn name(&self) -> &str {
        "api-reranker"
    }

    fn probe(&self) -> LoreResult<()> {
        self.client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| ProviderError::ProbeFailed {
                kind: "reranker".to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
