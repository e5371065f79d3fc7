//! In-process embedding store
//!
//! Records live in a `tokio::sync::RwLock`. Every mutation embeds first,
//! without holding the lock, and then takes the write lock only for an
//! await-free swap or append. Readers therefore see either the old or the new
//! record set, and a dropped future never leaves a half-written store.

use super::embedding::{cosine_similarity, Embedder};
use crate::errors::{RagError, Result};
use crate::types::Chunk;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One stored chunk and its vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: Uuid,
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub id: Uuid,
    pub chunk: Chunk,
    pub score: f32,
}

/// Serializable copy of the store contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub model_id: String,
    pub dimension: Option<usize>,
    pub records: Vec<EmbeddingRecord>,
}

#[derive(Debug, Default)]
struct StoreState {
    records: Vec<EmbeddingRecord>,
    dimension: Option<usize>,
}

impl StoreState {
    fn check_dimension(&self, incoming: Option<usize>) -> Result<()> {
        match (self.dimension, incoming) {
            (Some(fixed), Some(got)) if fixed != got => Err(RagError::EmbeddingFailure(format!(
                "vector dimension {} does not match store dimension {}",
                got, fixed
            ))),
            _ => Ok(()),
        }
    }
}

/// Chunk store with cosine-similarity search
pub struct EmbeddingStore {
    embedder: Arc<dyn Embedder>,
    state: RwLock<StoreState>,
}

impl std::fmt::Debug for EmbeddingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingStore")
            .field("model_id", &self.embedder.model_id())
            .finish_non_exhaustive()
    }
}

impl EmbeddingStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Replace the whole record set
    ///
    /// All chunks are embedded before the swap; if embedding fails the
    /// previous contents are untouched.
    pub async fn replace_all(&self, chunks: Vec<Chunk>) -> Result<usize> {
        let (records, dimension) = self.embed_chunks(chunks).await?;
        let count = records.len();

        let mut state = self.state.write().await;
        state.check_dimension(dimension)?;
        state.records = records;
        if state.dimension.is_none() {
            state.dimension = dimension;
        }
        drop(state);

        tracing::debug!(records = count, "store contents replaced");
        Ok(count)
    }

    /// Replace the whole record set, embedding each batch with its own call
    ///
    /// Nothing is swapped in until every batch has been embedded, so a
    /// failure on any batch leaves the previous contents untouched.
    pub async fn replace_batched(&self, batches: Vec<Vec<Chunk>>) -> Result<usize> {
        let mut records = Vec::new();
        let mut dimension = None;
        for batch in batches {
            let (batch_records, batch_dimension) = self.embed_chunks(batch).await?;
            match (dimension, batch_dimension) {
                (Some(fixed), Some(got)) if fixed != got => {
                    return Err(RagError::EmbeddingFailure(format!(
                        "batch dimension {} does not match earlier batches ({})",
                        got, fixed
                    )))
                }
                (None, got) => dimension = got,
                _ => {}
            }
            records.extend(batch_records);
        }
        let count = records.len();

        let mut state = self.state.write().await;
        state.check_dimension(dimension)?;
        state.records = records;
        if state.dimension.is_none() {
            state.dimension = dimension;
        }
        drop(state);

        tracing::debug!(records = count, "store contents replaced in batches");
        Ok(count)
    }

    /// Append chunks; duplicates are not detected
    pub async fn add(&self, chunks: Vec<Chunk>) -> Result<usize> {
        let (records, dimension) = self.embed_chunks(chunks).await?;
        let count = records.len();

        let mut state = self.state.write().await;
        state.check_dimension(dimension)?;
        state.records.extend(records);
        if state.dimension.is_none() {
            state.dimension = dimension;
        }
        Ok(count)
    }

    /// Top-`k` chunks by descending cosine similarity
    ///
    /// Ties keep insertion order. `k` larger than the store returns every
    /// record; an empty store returns nothing without embedding the query.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        self.search_with_threshold(query, k, f32::NEG_INFINITY).await
    }

    /// Like [`search`](Self::search), dropping hits scoring below `min_score`
    pub async fn search_with_threshold(
        &self,
        query: &str,
        k: usize,
        min_score: f32,
    ) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(RagError::InvalidArguments(
                "search requires k >= 1".to_string(),
            ));
        }
        if self.is_empty().await {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;

        let state = self.state.read().await;
        state.check_dimension(Some(query_vector.len()))?;

        let mut scored: Vec<(usize, f32)> = state
            .records
            .iter()
            .enumerate()
            .map(|(idx, record)| {
                let score = cosine_similarity(&query_vector, &record.vector);
                (idx, if score.is_nan() { f32::NEG_INFINITY } else { score })
            })
            .filter(|(_, score)| *score >= min_score)
            .collect();

        // sort_by is stable, so equal scores stay in insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        let hits: Vec<ScoredChunk> = scored
            .into_iter()
            .map(|(idx, score)| {
                let record = &state.records[idx];
                ScoredChunk {
                    id: record.id,
                    chunk: record.chunk.clone(),
                    score,
                }
            })
            .collect();

        tracing::debug!(
            k,
            hits = hits.len(),
            top_score = hits.first().map(|h| h.score),
            "similarity search"
        );
        Ok(hits)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.records.is_empty()
    }

    /// Remove every record; the fixed dimension is kept
    pub async fn clear(&self) {
        self.state.write().await.records.clear();
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read().await;
        StoreSnapshot {
            model_id: self.embedder.model_id().to_string(),
            dimension: state.dimension,
            records: state.records.clone(),
        }
    }

    /// Replace contents with a snapshot taken under the same embedding model
    pub async fn restore(&self, snapshot: StoreSnapshot) -> Result<()> {
        if snapshot.model_id != self.embedder.model_id() {
            return Err(RagError::EmbeddingFailure(format!(
                "snapshot was built with '{}' but the store embeds with '{}'",
                snapshot.model_id,
                self.embedder.model_id()
            )));
        }
        if let Some(dim) = snapshot.dimension {
            if let Some(bad) = snapshot.records.iter().find(|r| r.vector.len() != dim) {
                return Err(RagError::EmbeddingFailure(format!(
                    "record {} has dimension {}, snapshot declares {}",
                    bad.id,
                    bad.vector.len(),
                    dim
                )));
            }
        }

        let mut state = self.state.write().await;
        state.records = snapshot.records;
        state.dimension = snapshot.dimension;
        Ok(())
    }

    /// Persist as JSON (written to a temp file, then renamed into place)
    pub async fn save(&self, path: &Path) -> Result<()> {
        let snapshot = self.snapshot().await;
        let bytes = serde_json::to_vec(&snapshot)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;

        tracing::debug!(path = %path.display(), records = snapshot.records.len(), "store saved");
        Ok(())
    }

    /// Load a store saved by [`save`](Self::save)
    pub async fn load(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| RagError::SourceUnavailable {
                location: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let snapshot: StoreSnapshot =
            serde_json::from_slice(&bytes).map_err(|e| RagError::ParseError {
                location: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let store = Self::new(embedder);
        store.restore(snapshot).await?;
        Ok(store)
    }

    /// Load from `path` if it exists, otherwise start empty
    pub async fn open(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if tokio::fs::try_exists(path).await? {
            Self::load(path, embedder).await
        } else {
            Ok(Self::new(embedder))
        }
    }

    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<(Vec<EmbeddingRecord>, Option<usize>)> {
        if chunks.is_empty() {
            return Ok((Vec::new(), None));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::EmbeddingFailure(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let dimension = vectors[0].len();
        if dimension == 0 || vectors.iter().any(|v| v.len() != dimension) {
            return Err(RagError::EmbeddingFailure(
                "embedder returned vectors of inconsistent or zero dimension".to_string(),
            ));
        }

        let records = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddingRecord {
                id: Uuid::new_v4(),
                chunk,
                vector,
            })
            .collect();
        Ok((records, Some(dimension)))
    }
}
