//! Token-bounded text chunker
//!
//! Splits a document into windows of at most `max_tokens` tokens. Inside a
//! window the cut moves back to the last sentence boundary (`.`, `?`, `!` or
//! a line break) when that boundary lies more than `min_chunk_chars`
//! characters into the window; otherwise the full window is kept.
//!
//! Output depends only on the document and the settings, so re-ingesting an
//! unchanged source yields the same chunk sequence.

use crate::config::ChunkerConfig;
use crate::errors::{RagError, Result};
use crate::ingest::tokenizer::{HfTokenizer, Span, Tokenize, WhitespaceTokenizer};
use crate::types::{metadata_keys, Chunk, Document};
use std::sync::Arc;

/// Overlap policy between consecutive chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overlap {
    /// Chunks partition the token sequence
    #[default]
    None,
    /// Each chunk repeats the last `n` tokens of its predecessor
    Tokens(usize),
}

/// Token-window chunker
#[derive(Clone)]
pub struct TokenChunker {
    max_tokens: usize,
    min_chunk_chars: usize,
    max_chunks: usize,
    overlap: Overlap,
    tokenizer: Arc<dyn Tokenize>,
}

impl TokenChunker {
    /// Create chunker over whitespace tokens
    pub fn new(max_tokens: usize, min_chunk_chars: usize) -> Result<Self> {
        if max_tokens == 0 {
            return Err(RagError::InvalidArguments(
                "max_tokens must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            max_tokens,
            min_chunk_chars,
            max_chunks: 10_000,
            overlap: Overlap::None,
            tokenizer: Arc::new(WhitespaceTokenizer),
        })
    }

    /// Build from configuration, loading a HuggingFace tokenizer if one is set
    pub fn from_config(config: &ChunkerConfig) -> Result<Self> {
        let overlap = match config.overlap_tokens {
            0 => Overlap::None,
            n => Overlap::Tokens(n),
        };

        let mut chunker = Self::new(config.max_tokens, config.min_chunk_chars)?
            .with_max_chunks(config.max_chunks)
            .with_overlap(overlap)?;

        if let Some(path) = &config.tokenizer {
            chunker = chunker.with_tokenizer(Arc::new(HfTokenizer::from_file(path)?));
        }

        Ok(chunker)
    }

    pub fn with_overlap(mut self, overlap: Overlap) -> Result<Self> {
        if let Overlap::Tokens(n) = overlap {
            if n >= self.max_tokens {
                return Err(RagError::InvalidArguments(format!(
                    "overlap of {} tokens must be smaller than max_tokens {}",
                    n, self.max_tokens
                )));
            }
        }
        self.overlap = overlap;
        Ok(self)
    }

    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = max_chunks.max(1);
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenize>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn overlap(&self) -> Overlap {
        self.overlap
    }

    /// Split one document. Empty content yields no chunks.
    pub fn split(&self, document: &Document) -> Result<Vec<Chunk>> {
        let text = document.content.as_str();
        let spans = self.tokenizer.spans(text)?;

        let (windows, dropped) = self.windows(text, &spans);
        if dropped > 0 {
            tracing::warn!(
                max_chunks = self.max_chunks,
                dropped_tokens = dropped,
                "chunk limit reached, rest of document dropped"
            );
        }

        let mut chunks = Vec::new();
        for (index, (start, end)) in windows.into_iter().enumerate() {
            let mut metadata = document.metadata.clone();
            metadata.insert(metadata_keys::CHUNK_INDEX.to_string(), index.into());
            chunks.push(Chunk {
                text: text[start..end].to_string(),
                metadata,
            });
        }

        tracing::debug!(
            tokenizer = self.tokenizer.name(),
            tokens = spans.len(),
            chunks = chunks.len(),
            "split document"
        );

        Ok(chunks)
    }

    /// Split every document, preserving document order
    pub fn split_all(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        for document in documents {
            chunks.extend(self.split(document)?);
        }
        Ok(chunks)
    }

    /// Byte ranges of each chunk, plus the number of trailing tokens left
    /// out once `max_chunks` is reached
    fn windows(&self, text: &str, spans: &[Span]) -> (Vec<Span>, usize) {
        let mut windows = Vec::new();
        let mut first = 0;
        let mut covered = 0;

        while first < spans.len() && windows.len() < self.max_chunks {
            let limit = (first + self.max_tokens).min(spans.len());
            let mut cut = limit;

            if limit < spans.len() {
                if let Some(boundary) = self.last_boundary(text, spans, first, limit) {
                    let chars = text[spans[first].0..spans[boundary].1].chars().count();
                    if chars > self.min_chunk_chars {
                        cut = boundary + 1;
                    }
                }
            }

            windows.push((spans[first].0, spans[cut - 1].1));
            covered = covered.max(cut);

            if cut >= spans.len() {
                break;
            }
            first = match self.overlap {
                Overlap::None => cut,
                Overlap::Tokens(n) => cut.saturating_sub(n).max(first + 1),
            };
        }

        (windows, spans.len() - covered)
    }

    /// Last token in `first..limit` that ends a sentence or a line
    fn last_boundary(&self, text: &str, spans: &[Span], first: usize, limit: usize) -> Option<usize> {
        (first..limit).rev().find(|&i| {
            let (start, end) = spans[i];
            let ends_sentence = text[start..end].ends_with(['.', '?', '!']);
            let ends_line = spans
                .get(i + 1)
                .map(|next| text[end..next.0].contains('\n'))
                .unwrap_or(false);
            ends_sentence || ends_line
        })
    }
}
