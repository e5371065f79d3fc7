//! Language-model backends
//!
//! The orchestration layer only needs one capability from a model: take a
//! system prompt, messages and the advertised functions, and return either
//! final content or a list of function calls.

pub mod ollama;
pub mod scripted;

pub use ollama::OllamaChatModel;
pub use scripted::ScriptedModel;

use crate::errors::Result;
use crate::types::{ModelRequest, ModelResponse};
use async_trait::async_trait;

/// Chat / tool-calling model backend
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse>;

    /// Backend name for logs
    fn name(&self) -> &str {
        "model"
    }
}
