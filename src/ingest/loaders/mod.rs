//! Document loaders
//!
//! One implementation per source kind; the caller picks the loader, the
//! pipeline only sees [`DocumentLoader`]. A load either returns every
//! document of the source or fails as a whole.

pub mod paged;
pub mod records;
pub mod text;

pub use paged::{FormFeedPages, PageSource, PagedLoader, PdfPages};
pub use records::{InMemoryRecords, JsonRecordSource, Record, RecordLoader, RecordSource};
pub use text::TextLoader;

use crate::errors::{RagError, Result};
use crate::types::Document;
use async_trait::async_trait;
use std::path::Path;

/// Source of documents
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Provenance name recorded on every stored chunk
    fn source_name(&self) -> String;

    /// Load every document of the source
    async fn load(&self) -> Result<Vec<Document>>;
}

/// Final path component, or the full path when there is none
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read a source file, mapping open failures to `SourceUnavailable`
pub(crate) async fn read_source(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| RagError::SourceUnavailable {
            location: path.display().to_string(),
            reason: e.to_string(),
        })
}

/// Decode UTF-8 source content
pub(crate) fn decode_utf8(bytes: Vec<u8>, path: &Path) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| RagError::ParseError {
        location: path.display().to_string(),
        reason: format!("invalid UTF-8: {}", e.utf8_error()),
    })
}
