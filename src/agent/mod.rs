//! Request orchestration
//!
//! Composes conversation memory, the retrieval advisor and the tool
//! dispatcher into one per-request handler.

pub mod orchestrator;

pub use orchestrator::{ChatReply, ChatRequest, Orchestrator};
