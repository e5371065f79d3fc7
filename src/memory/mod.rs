//! Embeddings, the embedding store and conversation memory
//!
//! Components:
//! - Embedding: text → fixed-length vectors (hashing, Ollama, Candle)
//! - Embedding Store: chunks + vectors with top-k cosine search
//! - Conversation Memory: per-session append-only turn log

pub mod conversation;
pub mod embedding;
pub mod store;

pub use conversation::ConversationMemory;
pub use embedding::{cosine_similarity, embedder_from_config, Embedder, HashingEmbedder};
pub use store::{EmbeddingRecord, EmbeddingStore, ScoredChunk, StoreSnapshot};
