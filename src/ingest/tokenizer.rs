//! Token boundary detection for the chunker
//!
//! The chunker only needs byte spans of tokens in the original text, so any
//! tokenizer that reports offsets can drive it.

use crate::errors::{RagError, Result};
use std::path::{Path, PathBuf};

/// Byte range `[start, end)` of one token in the source text
pub type Span = (usize, usize);

/// Token span producer
pub trait Tokenize: Send + Sync {
    /// Ordered, non-overlapping token spans
    fn spans(&self, text: &str) -> Result<Vec<Span>>;

    /// Identifier used in logs
    fn name(&self) -> &str;
}

/// Whitespace-delimited words
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenize for WhitespaceTokenizer {
    fn spans(&self, text: &str) -> Result<Vec<Span>> {
        let mut spans = Vec::new();
        let mut start = None;

        for (i, c) in text.char_indices() {
            if c.is_whitespace() {
                if let Some(s) = start.take() {
                    spans.push((s, i));
                }
            } else if start.is_none() {
                start = Some(i);
            }
        }
        if let Some(s) = start {
            spans.push((s, text.len()));
        }

        Ok(spans)
    }

    fn name(&self) -> &str {
        "whitespace"
    }
}

/// HuggingFace tokenizer loaded from a `tokenizer.json`
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
    path: PathBuf,
}

impl HfTokenizer {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(RagError::SourceUnavailable {
                location: path.display().to_string(),
                reason: "tokenizer file does not exist".to_string(),
            });
        }

        let inner = tokenizers::Tokenizer::from_file(&path).map_err(|e| RagError::ParseError {
            location: path.display().to_string(),
            reason: format!("Failed to load tokenizer: {}", e),
        })?;

        Ok(Self { inner, path })
    }
}

impl Tokenize for HfTokenizer {
    fn spans(&self, text: &str) -> Result<Vec<Span>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| RagError::ParseError {
                location: self.path.display().to_string(),
                reason: format!("Tokenization failed: {}", e),
            })?;

        // Byte-level merges can report the same or overlapping offsets for
        // consecutive tokens; fold them into one monotone sequence.
        let mut spans: Vec<Span> = Vec::new();
        for &(start, end) in encoding.get_offsets() {
            if start >= end || !text.is_char_boundary(start) || !text.is_char_boundary(end) {
                continue;
            }
            match spans.last_mut() {
                Some(last) if start < last.1 => last.1 = last.1.max(end),
                _ => spans.push((start, end)),
            }
        }

        Ok(spans)
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}
