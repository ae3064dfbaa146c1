//! Remote embedding provider for OpenAI-compatible `/embeddings` endpoints.
//!
//! One request per batch (texts beyond `max_batch_size` go out in sequential
//! chunks), a single attempt per request, and no local caching.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{check_batch, EmbeddingProvider, EmbeddingProviderError};
use crate::config::EmbeddingConfig;

/// Blocking embeddings client for OpenAI-compatible services.
pub struct OpenAiEmbeddingProvider {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_batch_size: usize,
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingProviderError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(EmbeddingProviderError::MissingApiKey)?
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let endpoint = format!("{}/embeddings", config.base_url.trim_end_matches('/'));

        tracing::info!(model = %config.model, endpoint = %endpoint, "embedding client ready");

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: config.model.clone(),
            max_batch_size: config.max_batch_size.max(1),
        })
    }

    fn request(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingProviderError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbeddingProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .map_err(|e| EmbeddingProviderError::Malformed(e.to_string()))?;
        parsed.data.sort_by_key(|entry| entry.index);

        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|e| e.embedding).collect();
        check_batch(&vectors, inputs.len())?;
        Ok(vectors)
    }
}

impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingProviderError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        // The service rejects empty strings; fail before spending a round trip.
        if let Some(index) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(EmbeddingProviderError::EmptyText { index });
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.max_batch_size) {
            tracing::debug!(inputs = chunk.len(), model = %self.model, "requesting embeddings");
            vectors.extend(self.request(chunk)?);
        }
        check_batch(&vectors, texts.len())?;
        Ok(vectors)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
