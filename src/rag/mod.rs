//! Retrieval-augmented prompting
//!
//! - Prompt Builder: renders instructions, retrieved chunks and history
//! - Retrieval Advisor: similarity search + prompt construction with
//!   fallback to an unaugmented prompt

pub mod advisor;
pub mod prompt;

pub use advisor::RetrievalAdvisor;
pub use prompt::{AugmentedPrompt, PromptBuilder};

use serde::{Deserialize, Serialize};

/// Where conversation history goes in the model request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryMode {
    /// Prior turns become chat messages before the user utterance
    #[default]
    Messages,
    /// Prior turns are rendered into a MEMORY section of the system prompt
    SystemPrompt,
}
