//! Text-to-vector embedding via an external service.
//!
//! Provides the [`EmbeddingProvider`] trait and a remote implementation for
//! OpenAI-compatible `/embeddings` endpoints. The provider is created via
//! [`create_provider`] from configuration.

pub mod openai;

use crate::config::EmbeddingConfig;

/// Failure of an embedding request. Never retried by the provider itself.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingProviderError {
    #[error("no API key configured for embedding provider (set OPENAI_API_KEY)")]
    MissingApiKey,

    #[error("input text at position {index} is empty")]
    EmptyText { index: usize },

    #[error("embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("embedding service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed embedding response: {0}")]
    Malformed(String),

    #[error("unknown embedding provider: {0}. Supported: openai")]
    UnknownProvider(String),
}

/// Trait for embedding text into vectors.
///
/// Output is order-preserving: one vector per input text, all of equal length.
/// All methods are synchronous; callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of text strings.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingProviderError>;

    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingProviderError> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| EmbeddingProviderError::Malformed("no embedding returned".into()))
    }

    /// Model identifier, for logging.
    fn model(&self) -> &str;
}

/// Check the provider contract on a finished batch: count and equal lengths.
pub fn check_batch(
    vectors: &[Vec<f32>],
    expected: usize,
) -> Result<(), EmbeddingProviderError> {
    if vectors.len() != expected {
        return Err(EmbeddingProviderError::Malformed(format!(
            "{} embeddings for {} inputs",
            vectors.len(),
            expected
        )));
    }
    if let Some(first) = vectors.first() {
        if first.is_empty() {
            return Err(EmbeddingProviderError::Malformed(
                "embedding 0 has zero dimensions".into(),
            ));
        }
        if let Some((i, v)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != first.len())
        {
            return Err(EmbeddingProviderError::Malformed(format!(
                "embedding {i} has {} dimensions, expected {}",
                v.len(),
                first.len()
            )));
        }
    }
    Ok(())
}

/// Create an embedding provider from config.
///
/// Currently only `"openai"` is supported. Builds a blocking HTTP client, so
/// call outside of async contexts.
pub fn create_provider(
    config: &EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>, EmbeddingProviderError> {
    match config.provider.as_str() {
        "openai" => {
            let provider = openai::OpenAiEmbeddingProvider::new(config)?;
            Ok(Box::new(provider))
        }
        other => Err(EmbeddingProviderError::UnknownProvider(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_batch_accepts_uniform_vectors() {
        let vectors = vec![vec![0.0; 4], vec![1.0; 4]];
        assert!(check_batch(&vectors, 2).is_ok());
        assert!(check_batch(&[], 0).is_ok());
    }

    #[test]
    fn check_batch_rejects_count_mismatch() {
        let err = check_batch(&[vec![0.0; 4]], 2).unwrap_err();
        assert!(err.to_string().contains("1 embeddings for 2 inputs"));
    }

    #[test]
    fn check_batch_rejects_ragged_vectors() {
        let err = check_batch(&[vec![0.0; 4], vec![0.0; 3]], 2).unwrap_err();
        assert!(matches!(err, EmbeddingProviderError::Malformed(_)));
    }

    #[test]
    fn check_batch_rejects_zero_dimensional_vectors() {
        let err = check_batch(&[vec![], vec![]], 2).unwrap_err();
        assert!(matches!(err, EmbeddingProviderError::Malformed(_)));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = EmbeddingConfig {
            provider: "carrier-pigeon".into(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            create_provider(&config),
            Err(EmbeddingProviderError::UnknownProvider(_))
        ));
    }
}
