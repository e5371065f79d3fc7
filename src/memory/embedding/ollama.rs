//! Ollama embeddings over `POST /api/embed`

use super::Embedder;
use crate::errors::{RagError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    model_id: String,
}

impl OllamaEmbedder {
    pub fn with_config(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RagError::HttpError)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            model_id: format!("ollama:{}", model),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/api/embed", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| RagError::EmbeddingFailure(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::EmbeddingFailure(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RagError::EmbeddingFailure(format!("Failed to parse embeddings: {}", e)))?;

        if body.embeddings.len() != texts.len() {
            return Err(RagError::EmbeddingFailure(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.embeddings.len()
            )));
        }
        Ok(body.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_id_and_url() {
        let embedder =
            OllamaEmbedder::with_config("http://localhost:11434/", "nomic-embed-text", Duration::from_secs(5))
                .unwrap();
        assert_eq!(embedder.model_id(), "ollama:nomic-embed-text");
        assert_eq!(embedder.base_url(), "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        // Unroutable address: an actual request would fail
        let embedder =
            OllamaEmbedder::with_config("http://127.0.0.1:1", "m", Duration::from_millis(50)).unwrap();
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_embedding_failure() {
        let embedder =
            OllamaEmbedder::with_config("http://127.0.0.1:1", "m", Duration::from_millis(200)).unwrap();
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingFailure(_)));
    }
}
