//! Paginated loader: one document per page
//!
//! Pages come from a [`PageSource`]; each page can drop its bottom lines
//! (footer boilerplate such as page numbers or legal notices) before it is
//! emitted.

use super::{decode_utf8, file_name, read_source, DocumentLoader};
use crate::errors::{RagError, Result};
use crate::types::{metadata_keys, Document};
use async_trait::async_trait;
use std::path::PathBuf;

/// Producer of page texts in reading order
#[async_trait]
pub trait PageSource: Send + Sync {
    /// File name used for metadata and provenance
    fn name(&self) -> String;

    async fn pages(&self) -> Result<Vec<String>>;
}

/// Text extracted from each page of a PDF file
#[derive(Debug, Clone)]
pub struct PdfPages {
    path: PathBuf,
}

impl PdfPages {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PageSource for PdfPages {
    fn name(&self) -> String {
        file_name(&self.path)
    }

    async fn pages(&self) -> Result<Vec<String>> {
        let bytes = read_source(&self.path).await?;
        let location = self.path.display().to_string();

        let parse_location = location.clone();
        tokio::task::spawn_blocking(move || extract_pdf_pages(&bytes, &parse_location))
            .await
            .map_err(|e| RagError::ParseError {
                location,
                reason: format!("PDF extraction task failed: {}", e),
            })?
    }
}

fn extract_pdf_pages(bytes: &[u8], location: &str) -> Result<Vec<String>> {
    let parse_error = |reason: String| RagError::ParseError {
        location: location.to_string(),
        reason,
    };

    let document = lopdf::Document::load_mem(bytes)
        .map_err(|e| parse_error(format!("invalid PDF: {}", e)))?;

    document
        .get_pages()
        .keys()
        .map(|&page_number| {
            document
                .extract_text(&[page_number])
                .map_err(|e| parse_error(format!("page {}: {}", page_number, e)))
        })
        .collect()
}

/// Pre-extracted text with form feed (`\x0c`) page breaks, as written by
/// `pdftotext`
#[derive(Debug, Clone)]
pub struct FormFeedPages {
    path: PathBuf,
}

impl FormFeedPages {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PageSource for FormFeedPages {
    fn name(&self) -> String {
        file_name(&self.path)
    }

    async fn pages(&self) -> Result<Vec<String>> {
        let bytes = read_source(&self.path).await?;
        let text = decode_utf8(bytes, &self.path)?;

        let mut pages: Vec<String> = text.split('\x0c').map(String::from).collect();
        // pdftotext terminates the last page with a form feed too
        if pages.len() > 1 && pages.last().map(|p| p.trim().is_empty()).unwrap_or(false) {
            pages.pop();
        }
        Ok(pages)
    }
}

/// Loads one document per non-empty page
pub struct PagedLoader<S> {
    source: S,
    trim_bottom_lines: usize,
}

impl<S: PageSource> PagedLoader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            trim_bottom_lines: 0,
        }
    }

    /// Drop this many non-empty lines from the bottom of every page
    pub fn with_trim_bottom_lines(mut self, count: usize) -> Self {
        self.trim_bottom_lines = count;
        self
    }
}

impl PagedLoader<PdfPages> {
    pub fn pdf(path: impl Into<PathBuf>) -> Self {
        Self::new(PdfPages::new(path))
    }
}

#[async_trait]
impl<S: PageSource> DocumentLoader for PagedLoader<S> {
    fn source_name(&self) -> String {
        self.source.name()
    }

    async fn load(&self) -> Result<Vec<Document>> {
        let filename = self.source.name();
        let pages = self.source.pages().await?;

        let documents = pages
            .iter()
            .enumerate()
            .filter_map(|(idx, page)| {
                let content = trim_bottom_lines(page, self.trim_bottom_lines);
                if content.trim().is_empty() {
                    return None;
                }
                Some(
                    Document::new(content)
                        .with_metadata(metadata_keys::FILENAME, filename.clone())
                        .with_metadata(metadata_keys::PAGE_NUMBER, idx + 1),
                )
            })
            .collect();

        Ok(documents)
    }
}

/// Remove the last `count` non-empty lines of a page
pub fn trim_bottom_lines(page: &str, count: usize) -> String {
    let mut lines: Vec<&str> = page.lines().collect();
    let mut removed = 0;

    while removed < count {
        match lines.pop() {
            Some(line) if line.trim().is_empty() => continue,
            Some(_) => removed += 1,
            None => break,
        }
    }

    lines.join("\n").trim_end().to_string()
}
