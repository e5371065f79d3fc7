//! Augmented prompt assembly

use super::MemoryMode;
use crate::memory::ScoredChunk;
use crate::types::{metadata_keys, ChatMessage, Chunk, FunctionSpec, ModelRequest, Turn, TurnRole};

const CONTEXT_HEADER: &str = "Context information is below.";
const CONTEXT_RULES: &str = "Answer from the context and the conversation so far rather than prior knowledge. \
If the answer is not in the context, say that you cannot answer the question.";
const MEMORY_HEADER: &str = "Use the conversation memory in the MEMORY section to give accurate answers.";
const RULE: &str = "---------------------";

/// Prompt ready to be sent, plus the chunks it was built from
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedPrompt {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub retrieved: Vec<ScoredChunk>,
}

impl AugmentedPrompt {
    pub fn into_request(self, functions: Vec<FunctionSpec>) -> ModelRequest {
        ModelRequest {
            system_prompt: self.system_prompt,
            messages: self.messages,
            functions,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    instructions: String,
    memory_mode: MemoryMode,
}

impl PromptBuilder {
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            memory_mode: MemoryMode::default(),
        }
    }

    pub fn with_memory_mode(mut self, memory_mode: MemoryMode) -> Self {
        self.memory_mode = memory_mode;
        self
    }

    pub fn memory_mode(&self) -> MemoryMode {
        self.memory_mode
    }

    /// Assemble system prompt and messages
    ///
    /// With no retrieved chunks the system prompt is the bare instructions
    /// (plus memory when rendered there).
    pub fn build(&self, utterance: &str, history: &[Turn], retrieved: Vec<ScoredChunk>) -> AugmentedPrompt {
        let mut sections = vec![self.instructions.trim().to_string()];

        if !retrieved.is_empty() {
            let context = retrieved
                .iter()
                .enumerate()
                .map(|(i, hit)| format!("[{}] ({}) {}", i + 1, provenance(&hit.chunk), hit.chunk.text))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!(
                "{}\n{}\n{}\n{}\n{}",
                CONTEXT_HEADER, RULE, context, RULE, CONTEXT_RULES
            ));
        }

        let mut messages = Vec::with_capacity(history.len() + 1);
        match self.memory_mode {
            MemoryMode::Messages => messages.extend(history.iter().map(Turn::to_message)),
            MemoryMode::SystemPrompt if !history.is_empty() => {
                let memory = history
                    .iter()
                    .map(|turn| {
                        let speaker = match turn.role {
                            TurnRole::User => "user",
                            TurnRole::Assistant => "assistant",
                        };
                        format!("{}: {}", speaker, turn.content)
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                sections.push(format!("{}\n{}\nMEMORY:\n{}\n{}", MEMORY_HEADER, RULE, memory, RULE));
            }
            MemoryMode::SystemPrompt => {}
        }
        messages.push(ChatMessage::user(utterance));

        AugmentedPrompt {
            system_prompt: sections
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n"),
            messages,
            retrieved,
        }
    }
}

/// `source: manual.pdf, page 3` style label
fn provenance(chunk: &Chunk) -> String {
    let source = chunk
        .get(metadata_keys::SOURCE)
        .or_else(|| chunk.get(metadata_keys::FILENAME))
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let mut label = format!("source: {}", source);
    if let Some(page) = chunk.get(metadata_keys::PAGE_NUMBER) {
        label.push_str(&format!(", page {}", page));
    }
    if let Some(key) = chunk.get(metadata_keys::RECORD_KEY) {
        label.push_str(&format!(", record {}", key));
    }
    label
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use uuid::Uuid;

    fn hit(text: &str, chunk: Chunk, score: f32) -> ScoredChunk {
        let mut chunk = chunk;
        chunk.text = text.to_string();
        ScoredChunk {
            id: Uuid::new_v4(),
            chunk,
            score,
        }
    }

    #[test]
    fn test_no_context_no_history() {
        let prompt = PromptBuilder::new("Be helpful.").build("hello", &[], vec![]);
        assert_eq!(prompt.system_prompt, "Be helpful.");
        assert_eq!(prompt.messages, vec![ChatMessage::user("hello")]);
        assert!(prompt.retrieved.is_empty());
    }

    #[test]
    fn test_context_block_with_provenance() {
        let hits = vec![
            hit(
                "Rocky loves walks",
                Chunk::new("").with_metadata(metadata_keys::SOURCE, "dogs").with_metadata(metadata_keys::RECORD_KEY, "1"),
                0.9,
            ),
            hit(
                "Eight planets",
                Chunk::new("").with_metadata(metadata_keys::FILENAME, "space.pdf").with_metadata(metadata_keys::PAGE_NUMBER, 2u32),
                0.5,
            ),
        ];
        let prompt = PromptBuilder::new("Be helpful.").build("which dog?", &[], hits);

        assert!(prompt.system_prompt.starts_with("Be helpful."));
        assert!(prompt.system_prompt.contains("[1] (source: dogs, record 1) Rocky loves walks"));
        assert!(prompt.system_prompt.contains("[2] (source: space.pdf, page 2) Eight planets"));
        assert_eq!(prompt.retrieved.len(), 2);
    }

    #[test]
    fn test_history_as_messages() {
        let history = vec![Turn::user("my name is Ada"), Turn::assistant("hi Ada")];
        let prompt = PromptBuilder::new("x").build("what is my name?", &history, vec![]);

        let roles: Vec<Role> = prompt.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(prompt.messages[2].content, "what is my name?");
    }

    #[test]
    fn test_history_in_system_prompt() {
        let history = vec![Turn::user("my name is Ada"), Turn::assistant("hi Ada")];
        let prompt = PromptBuilder::new("x")
            .with_memory_mode(MemoryMode::SystemPrompt)
            .build("what is my name?", &history, vec![]);

        assert!(prompt.system_prompt.contains("MEMORY:\nuser: my name is Ada\nassistant: hi Ada"));
        assert_eq!(prompt.messages, vec![ChatMessage::user("what is my name?")]);
    }

    #[test]
    fn test_into_request() {
        let request = PromptBuilder::new("x").build("q", &[], vec![]).into_request(vec![]);
        assert_eq!(request.system_prompt, "x");
        assert_eq!(request.messages.len(), 1);
    }
}
