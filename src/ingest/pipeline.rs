//! Ingestion pipeline: load → split → tag → store

use super::chunker::TokenChunker;
use super::loaders::DocumentLoader;
use crate::errors::Result;
use crate::memory::EmbeddingStore;
use crate::types::{metadata_keys, Chunk};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// How a batch is written to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Swap the whole store; re-running is idempotent
    Replace,
    /// Add to existing contents; duplicates are the caller's concern
    Append,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Replace => f.write_str("replace"),
            WriteMode::Append => f.write_str("append"),
        }
    }
}

/// Summary of one ingestion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub source: String,
    pub documents: usize,
    pub chunks: usize,
    pub mode: WriteMode,
    pub elapsed_ms: u64,
}

pub struct IngestionPipeline {
    chunker: TokenChunker,
    store: Arc<EmbeddingStore>,
    version: i64,
}

impl IngestionPipeline {
    pub fn new(chunker: TokenChunker, store: Arc<EmbeddingStore>) -> Self {
        Self {
            chunker,
            store,
            version: 1,
        }
    }

    /// Ingestion version recorded on every chunk
    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    pub fn store(&self) -> &Arc<EmbeddingStore> {
        &self.store
    }

    /// Run one batch. Any failure aborts the batch before the store is touched.
    pub async fn ingest(
        &self,
        loader: &dyn DocumentLoader,
        mode: WriteMode,
    ) -> Result<IngestionReport> {
        let source = loader.source_name();
        self.run(loader, &source, mode)
            .await
            .map_err(|e| e.into_ingestion(&source))
    }

    async fn run(
        &self,
        loader: &dyn DocumentLoader,
        source: &str,
        mode: WriteMode,
    ) -> Result<IngestionReport> {
        let started = Instant::now();
        tracing::info!(source, %mode, "ingestion started");

        let documents = loader.load().await?;
        let chunks = self.tag(source, self.chunker.split_all(&documents)?);
        let chunk_count = chunks.len();

        match mode {
            WriteMode::Replace => self.store.replace_all(chunks).await?,
            WriteMode::Append => self.store.add(chunks).await?,
        };

        let report = IngestionReport {
            source: source.to_string(),
            documents: documents.len(),
            chunks: chunk_count,
            mode,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            source,
            documents = report.documents,
            chunks = report.chunks,
            elapsed_ms = report.elapsed_ms,
            "ingestion finished"
        );
        Ok(report)
    }

    /// Rebuild the store one document at a time
    ///
    /// Each document's chunks are embedded separately, then the whole set
    /// replaces the store in one swap. Any failure leaves the store as it was.
    pub async fn ingest_incremental(&self, loader: &dyn DocumentLoader) -> Result<IngestionReport> {
        let source = loader.source_name();
        self.run_incremental(loader, &source)
            .await
            .map_err(|e| e.into_ingestion(&source))
    }

    async fn run_incremental(
        &self,
        loader: &dyn DocumentLoader,
        source: &str,
    ) -> Result<IngestionReport> {
        let started = Instant::now();
        tracing::info!(source, "incremental ingestion started");

        let documents = loader.load().await?;
        let mut batches = Vec::with_capacity(documents.len());
        for document in &documents {
            batches.push(self.tag(source, self.chunker.split(document)?));
        }

        let written = self.store.replace_batched(batches).await?;

        let report = IngestionReport {
            source: source.to_string(),
            documents: documents.len(),
            chunks: written,
            mode: WriteMode::Append,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            source,
            documents = report.documents,
            chunks = report.chunks,
            "incremental ingestion finished"
        );
        Ok(report)
    }

    fn tag(&self, source: &str, chunks: Vec<Chunk>) -> Vec<Chunk> {
        chunks
            .into_iter()
            .map(|chunk| {
                chunk
                    .with_metadata(metadata_keys::SOURCE, source)
                    .with_metadata(metadata_keys::VERSION, self.version)
            })
            .collect()
    }
}
