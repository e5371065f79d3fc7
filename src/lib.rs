//! ragbuddy - retrieval-augmented chat and tool dispatch
//!
//! Ingests plain text, paginated PDFs and tabular records into an embedding
//! store, and answers questions by merging retrieved chunks, conversation
//! history and function-call results into one model request.
//!
//! # Architecture
//!
//! - **ingest**: loaders, token chunker, ingestion pipeline
//! - **memory**: embedders, embedding store, conversation memory
//! - **rag**: prompt builder and retrieval advisor
//! - **tools**: function registry, executor, dispatch state machine
//! - **models**: chat model backends (Ollama, scripted)
//! - **agent**: per-request orchestrator

pub mod agent;
pub mod cli;
pub mod config;
pub mod errors;
pub mod ingest;
pub mod logging;
pub mod memory;
pub mod models;
pub mod rag;
pub mod tools;
pub mod types;

// Re-export commonly used types
pub use agent::{ChatReply, ChatRequest, Orchestrator};
pub use config::Config;
pub use errors::{ErrorStage, RagError, Result};
pub use ingest::{IngestionPipeline, IngestionReport, TokenChunker, WriteMode};
pub use memory::{ConversationMemory, EmbeddingStore};
pub use tools::{FunctionDescriptor, FunctionRegistry, FunctionSelection, ToolDispatcher};
