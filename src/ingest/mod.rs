//! Document ingestion
//!
//! Loader → Chunker → provenance tagging → Embedding Store, run as one
//! batch job per source.

pub mod chunker;
pub mod loaders;
pub mod pipeline;
pub mod tokenizer;

pub use chunker::{Overlap, TokenChunker};
pub use loaders::{
    DocumentLoader, FormFeedPages, InMemoryRecords, JsonRecordSource, PageSource, PagedLoader,
    PdfPages, Record, RecordLoader, RecordSource, TextLoader,
};
pub use pipeline::{IngestionPipeline, IngestionReport, WriteMode};
pub use tokenizer::{HfTokenizer, Span, Tokenize, WhitespaceTokenizer};
