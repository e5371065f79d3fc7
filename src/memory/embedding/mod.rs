//! Embedding functions
//!
//! The store treats the embedder as a black box that is deterministic for a
//! given input and `model_id`. Three backends:
//! - [`HashingEmbedder`]: feature hashing, offline and dependency-free
//! - [`OllamaEmbedder`]: Ollama `/api/embed`
//! - [`CandleEmbedder`]: local BERT model via Candle + hf-hub

pub mod candle;
pub mod hashing;
pub mod ollama;

pub use self::candle::CandleEmbedder;
pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;

use crate::config::{EmbeddingBackend, ModelConfig};
use crate::errors::{RagError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Text → vector function
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifies the model; vectors from different ids are not comparable
    fn model_id(&self) -> &str;

    /// Embed many texts, one vector per input in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| RagError::EmbeddingFailure("embedder returned no vector".to_string()))
    }
}

/// Cosine similarity; zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Build the configured embedder
pub async fn embedder_from_config(config: &ModelConfig) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.embedding {
        EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::new(config.hashing_dimension)?),
        EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::with_config(
            &config.url,
            &config.embedding_model,
            std::time::Duration::from_secs(config.request_timeout_secs),
        )?),
        EmbeddingBackend::Candle => {
            // Ollama tags like "nomic-embed-text" are not Hub repository ids
            let model_id = if config.embedding_model.contains('/') {
                config.embedding_model.clone()
            } else {
                self::candle::DEFAULT_CANDLE_MODEL.to_string()
            };
            let embedder = tokio::task::spawn_blocking(move || CandleEmbedder::load(&model_id))
                .await
                .map_err(|e| RagError::EmbeddingFailure(format!("model load task failed: {}", e)))??;
            Arc::new(embedder)
        }
    };

    tracing::info!(model = embedder.model_id(), "embedding function ready");
    Ok(embedder)
}
