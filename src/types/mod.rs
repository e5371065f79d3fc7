//! Core data types
//!
//! Documents and chunks produced by ingestion, plus the chat messages
//! exchanged with the model backend.

pub mod document;
pub mod messages;

pub use document::{metadata_keys, Chunk, Document, Metadata, MetadataValue};
pub use messages::{
    ChatMessage, FunctionCall, FunctionSpec, ModelRequest, ModelResponse, Role, Turn, TurnRole,
};
