//! Retrieval advisor
//!
//! Searches the store for the user utterance and builds the augmented
//! prompt. Retrieval never fails a request: a search error or an empty
//! result produces the unaugmented prompt and a warning.

use super::prompt::{AugmentedPrompt, PromptBuilder};
use crate::config::RetrievalConfig;
use crate::memory::{EmbeddingStore, ScoredChunk};
use crate::types::Turn;
use std::sync::Arc;

pub struct RetrievalAdvisor {
    store: Arc<EmbeddingStore>,
    builder: PromptBuilder,
    top_k: usize,
    similarity_threshold: f32,
}

impl RetrievalAdvisor {
    pub fn new(store: Arc<EmbeddingStore>, builder: PromptBuilder) -> Self {
        Self {
            store,
            builder,
            top_k: 4,
            similarity_threshold: f32::NEG_INFINITY,
        }
    }

    pub fn from_config(store: Arc<EmbeddingStore>, config: &RetrievalConfig) -> Self {
        let builder = PromptBuilder::new(config.instructions.clone()).with_memory_mode(config.memory_mode);
        Self::new(store, builder)
            .with_top_k(config.top_k)
            .with_similarity_threshold(config.similarity_threshold)
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Drop hits scoring below `threshold`
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn builder(&self) -> &PromptBuilder {
        &self.builder
    }

    pub fn store(&self) -> &Arc<EmbeddingStore> {
        &self.store
    }

    /// Similar chunks for `utterance`; empty on error
    pub async fn retrieve(&self, utterance: &str) -> Vec<ScoredChunk> {
        match self
            .store
            .search_with_threshold(utterance, self.top_k, self.similarity_threshold)
            .await
        {
            Ok(hits) if hits.is_empty() => {
                tracing::warn!("no chunks retrieved, answering without context");
                hits
            }
            Ok(hits) => {
                tracing::debug!(
                    hits = hits.len(),
                    scores = ?hits.iter().map(|h| h.score).collect::<Vec<_>>(),
                    "retrieved context"
                );
                hits
            }
            Err(err) => {
                tracing::warn!(error = %err, "retrieval failed, answering without context");
                Vec::new()
            }
        }
    }

    pub async fn advise(&self, utterance: &str, history: &[Turn]) -> AugmentedPrompt {
        let retrieved = self.retrieve(utterance).await;
        self.builder.build(utterance, history, retrieved)
    }
}
