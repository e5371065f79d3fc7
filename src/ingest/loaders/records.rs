//! Tabular record loader: one document per record
//!
//! Content is synthesized from selected fields as `field: value, ...`;
//! metadata carries the record's key.

use super::{decode_utf8, file_name, read_source, DocumentLoader};
use crate::errors::{RagError, Result};
use crate::types::{metadata_keys, Document};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

/// Row of a record source
pub type Record = serde_json::Map<String, Value>;

/// Read access to a record store
#[async_trait]
pub trait RecordSource: Send + Sync {
    fn name(&self) -> String;

    async fn find_all(&self) -> Result<Vec<Record>>;
}

/// JSON file holding an array of objects
#[derive(Debug, Clone)]
pub struct JsonRecordSource {
    path: PathBuf,
}

impl JsonRecordSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RecordSource for JsonRecordSource {
    fn name(&self) -> String {
        file_name(&self.path)
    }

    async fn find_all(&self) -> Result<Vec<Record>> {
        let bytes = read_source(&self.path).await?;
        let text = decode_utf8(bytes, &self.path)?;
        let location = self.path.display().to_string();

        let value: Value = serde_json::from_str(&text).map_err(|e| RagError::ParseError {
            location: location.clone(),
            reason: e.to_string(),
        })?;

        let Value::Array(rows) = value else {
            return Err(RagError::ParseError {
                location,
                reason: "expected a JSON array of records".to_string(),
            });
        };

        rows.into_iter()
            .enumerate()
            .map(|(idx, row)| match row {
                Value::Object(record) => Ok(record),
                _ => Err(RagError::ParseError {
                    location: location.clone(),
                    reason: format!("record {} is not an object", idx),
                }),
            })
            .collect()
    }
}

/// Records held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecords {
    name: String,
    records: Vec<Record>,
}

impl InMemoryRecords {
    pub fn new(name: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }
}

#[async_trait]
impl RecordSource for InMemoryRecords {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn find_all(&self) -> Result<Vec<Record>> {
        Ok(self.records.clone())
    }
}

/// Loads one document per record
pub struct RecordLoader<S> {
    source: S,
    key_field: String,
    fields: Vec<String>,
}

impl<S: RecordSource> RecordLoader<S> {
    /// `fields` are rendered in the given order
    pub fn new(source: S, key_field: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            source,
            key_field: key_field.into(),
            fields,
        }
    }

    fn to_document(&self, idx: usize, record: &Record) -> Result<Document> {
        let missing = |field: &str| RagError::ParseError {
            location: self.source.name(),
            reason: format!("record {} has no field '{}'", idx, field),
        };

        let key = record
            .get(&self.key_field)
            .ok_or_else(|| missing(&self.key_field))?;

        let mut parts = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = record.get(field).ok_or_else(|| missing(field))?;
            parts.push(format!("{}: {}", field, render(value)));
        }

        Ok(Document::new(parts.join(", ")).with_metadata(metadata_keys::RECORD_KEY, render(key)))
    }
}

#[async_trait]
impl<S: RecordSource> DocumentLoader for RecordLoader<S> {
    fn source_name(&self) -> String {
        self.source.name()
    }

    async fn load(&self) -> Result<Vec<Document>> {
        let records = self.source.find_all().await?;

        records
            .iter()
            .enumerate()
            .map(|(idx, record)| self.to_document(idx, record))
            .collect()
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn dog(id: i64, name: &str, description: &str) -> Record {
        json!({"id": id, "name": name, "description": description})
            .as_object()
            .cloned()
            .unwrap()
    }

    fn fields() -> Vec<String> {
        vec!["id".to_string(), "name".to_string(), "description".to_string()]
    }

    #[tokio::test]
    async fn test_record_documents() {
        let source = InMemoryRecords::new(
            "dogs",
            vec![
                dog(1, "Rocky", "A friendly dog who loves walks"),
                dog(2, "Duke", "Shy around strangers"),
            ],
        );
        let loader = RecordLoader::new(source, "id", fields());

        let docs = loader.load().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(
            docs[0].content,
            "id: 1, name: Rocky, description: A friendly dog who loves walks"
        );
        assert_eq!(
            docs[1].metadata.get("record_key").and_then(|v| v.as_str()),
            Some("2")
        );
    }

    #[tokio::test]
    async fn test_missing_field_fails_whole_load() {
        let mut broken = dog(2, "Duke", "Shy");
        broken.remove("description");
        let source = InMemoryRecords::new("dogs", vec![dog(1, "Rocky", "Friendly"), broken]);

        let err = RecordLoader::new(source, "id", fields())
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::ParseError { .. }));
    }

    #[tokio::test]
    async fn test_json_record_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dogs.json");
        std::fs::write(
            &path,
            r#"[{"id": 7, "name": "Bella", "description": null}]"#,
        )
        .unwrap();

        let records = JsonRecordSource::new(&path).find_all().await.unwrap();
        assert_eq!(records.len(), 1);

        let docs = RecordLoader::new(JsonRecordSource::new(&path), "id", fields())
            .load()
            .await
            .unwrap();
        assert_eq!(docs[0].content, "id: 7, name: Bella, description: ");
    }

    #[tokio::test]
    async fn test_json_record_source_rejects_non_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dogs.json");
        std::fs::write(&path, r#"{"id": 1}"#).unwrap();

        let err = JsonRecordSource::new(&path).find_all().await.unwrap_err();
        assert!(matches!(err, RagError::ParseError { .. }));
    }
}
