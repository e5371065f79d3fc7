//! Plain text loader: one document per file

use super::{decode_utf8, file_name, read_source, DocumentLoader};
use crate::errors::Result;
use crate::types::{metadata_keys, Document};
use async_trait::async_trait;
use std::path::PathBuf;

/// Loads a UTF-8 text file as a single document
#[derive(Debug, Clone)]
pub struct TextLoader {
    path: PathBuf,
}

impl TextLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DocumentLoader for TextLoader {
    fn source_name(&self) -> String {
        file_name(&self.path)
    }

    async fn load(&self) -> Result<Vec<Document>> {
        let bytes = read_source(&self.path).await?;
        let content = decode_utf8(bytes, &self.path)?;

        Ok(vec![Document::new(content)
            .with_metadata(metadata_keys::FILENAME, file_name(&self.path))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RagError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_text_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("congo.txt");
        std::fs::write(&path, "The Congo is deep.").unwrap();

        let loader = TextLoader::new(&path);
        let docs = loader.load().await.unwrap();

        assert_eq!(loader.source_name(), "congo.txt");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "The Congo is deep.");
        assert_eq!(docs[0].metadata.len(), 1);
        assert_eq!(
            docs[0].metadata.get("filename").and_then(|v| v.as_str()),
            Some("congo.txt")
        );
    }

    #[tokio::test]
    async fn test_missing_file() {
        let loader = TextLoader::new("/no/such/dir/congo.txt");
        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, RagError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_invalid_utf8() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("binary.txt");
        std::fs::write(&path, [0x66, 0x6f, 0xff, 0xfe]).unwrap();

        let err = TextLoader::new(&path).load().await.unwrap_err();
        assert!(matches!(err, RagError::ParseError { .. }));
    }
}
