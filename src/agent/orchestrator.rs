//! Per-request orchestrator
//!
//! For each request:
//! 1. Read recent turns for the session
//! 2. Build the prompt, with retrieved context when enabled
//! 3. Dispatch to the model, executing function calls if requested
//! 4. Append the user and assistant turns
//!
//! Turns are only appended when the request succeeds.

use crate::config::Config;
use crate::errors::{RagError, Result};
use crate::memory::{ConversationMemory, EmbeddingStore, ScoredChunk};
use crate::models::ChatModel;
use crate::rag::{PromptBuilder, RetrievalAdvisor};
use crate::tools::{
    DispatchConfig, DispatchState, FunctionRegistry, FunctionSelection, ToolDispatcher,
    ToolInvocation,
};
use crate::types::Turn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Default number of prior turns sent with a request
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
    pub use_retrieval: bool,
    #[serde(default)]
    pub functions: FunctionSelection,
}

impl ChatRequest {
    /// Request with retrieval on and no functions
    pub fn new(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message: message.into(),
            use_retrieval: true,
            functions: FunctionSelection::None,
        }
    }

    pub fn without_retrieval(mut self) -> Self {
        self.use_retrieval = false;
        self
    }

    pub fn with_functions(mut self, functions: FunctionSelection) -> Self {
        self.functions = functions;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub content: String,
    pub invocations: Vec<ToolInvocation>,
    pub retrieved: Vec<ScoredChunk>,
    pub trace: Vec<DispatchState>,
}

pub struct Orchestrator {
    dispatcher: ToolDispatcher,
    memory: Arc<ConversationMemory>,
    builder: PromptBuilder,
    advisor: Option<RetrievalAdvisor>,
    history_limit: usize,
}

impl Orchestrator {
    /// Orchestrator without retrieval; `builder` renders prompts
    pub fn new(dispatcher: ToolDispatcher, memory: Arc<ConversationMemory>, builder: PromptBuilder) -> Self {
        Self {
            dispatcher,
            memory,
            builder,
            advisor: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Wire every component from configuration
    pub fn from_config(
        config: &Config,
        model: Arc<dyn ChatModel>,
        store: Arc<EmbeddingStore>,
        registry: Arc<FunctionRegistry>,
        memory: Arc<ConversationMemory>,
    ) -> Self {
        let dispatcher = ToolDispatcher::new(model, registry, DispatchConfig::from(&config.tools));
        let advisor = RetrievalAdvisor::from_config(store, &config.retrieval);
        let builder = advisor.builder().clone();

        Self::new(dispatcher, memory, builder)
            .with_retrieval(advisor)
            .with_history_limit(config.memory.history_limit)
    }

    pub fn with_retrieval(mut self, advisor: RetrievalAdvisor) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    pub fn memory(&self) -> &Arc<ConversationMemory> {
        &self.memory
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        self.dispatcher.registry()
    }

    /// Handle one chat request; errors are wrapped as query failures
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatReply> {
        let session_id = request.session_id.clone();
        self.run(request)
            .await
            .map_err(|e| e.into_query(session_id))
    }

    async fn run(&self, request: ChatRequest) -> Result<ChatReply> {
        if request.message.trim().is_empty() {
            return Err(RagError::InvalidArguments("message is empty".to_string()));
        }
        let started = Instant::now();
        let functions = self.dispatcher.registry().specs(&request.functions)?;
        let history = self.memory.recent(&request.session_id, self.history_limit).await;

        let prompt = match (&self.advisor, request.use_retrieval) {
            (Some(advisor), true) => advisor.advise(&request.message, &history).await,
            (None, true) => {
                tracing::debug!("retrieval requested but no advisor configured");
                self.builder.build(&request.message, &history, Vec::new())
            }
            (_, false) => self.builder.build(&request.message, &history, Vec::new()),
        };

        let retrieved = prompt.retrieved.clone();
        let outcome = self.dispatcher.dispatch(prompt.into_request(functions)).await?;

        self.memory
            .append_exchange(
                &request.session_id,
                Turn::user(request.message),
                Turn::assistant(outcome.answer.clone()),
            )
            .await;

        tracing::info!(
            session = %request.session_id,
            retrieved = retrieved.len(),
            function_calls = outcome.invocations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request handled"
        );

        Ok(ChatReply {
            content: outcome.answer,
            invocations: outcome.invocations,
            retrieved,
            trace: outcome.trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorStage;
    use crate::memory::HashingEmbedder;
    use crate::models::ScriptedModel;
    use crate::types::{Chunk, ModelResponse, Role};

    fn orchestrator(model: Arc<ScriptedModel>) -> Orchestrator {
        let dispatcher = ToolDispatcher::new(model, Arc::new(FunctionRegistry::new()), DispatchConfig::default());
        Orchestrator::new(dispatcher, Arc::new(ConversationMemory::new()), PromptBuilder::new("Be helpful."))
    }

    #[tokio::test]
    async fn test_turns_appended_on_success() {
        let model = Arc::new(ScriptedModel::new(vec![
            ModelResponse::content("Hello Ada"),
            ModelResponse::content("Your name is Ada"),
        ]));
        let orchestrator = orchestrator(model.clone());

        orchestrator
            .handle(ChatRequest::new("s1", "I am Ada").without_retrieval())
            .await
            .unwrap();
        let reply = orchestrator
            .handle(ChatRequest::new("s1", "What is my name?").without_retrieval())
            .await
            .unwrap();
        assert_eq!(reply.content, "Your name is Ada");
        assert_eq!(orchestrator.memory().len("s1").await, 4);

        let requests = model.requests().await;
        let roles: Vec<Role> = requests[1].messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
    }

    #[tokio::test]
    async fn test_failure_appends_nothing_and_is_query_error() {
        let model = Arc::new(ScriptedModel::new(vec![]).then_fail("down"));
        let orchestrator = orchestrator(model);

        let err = orchestrator
            .handle(ChatRequest::new("s1", "hi"))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(ErrorStage::Query));
        assert!(matches!(err.root(), RagError::ModelBackend(_)));
        assert_eq!(orchestrator.memory().len("s1").await, 0);
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let orchestrator = orchestrator(Arc::new(ScriptedModel::new(vec![])));
        let err = orchestrator.handle(ChatRequest::new("s", "   ")).await.unwrap_err();
        assert!(matches!(err.root(), RagError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_unknown_named_function_rejected() {
        let orchestrator = orchestrator(Arc::new(ScriptedModel::new(vec![ModelResponse::content("x")])));
        let request = ChatRequest::new("s", "hi").with_functions(FunctionSelection::named(["nope"]));
        let err = orchestrator.handle(request).await.unwrap_err();
        assert!(matches!(err.root(), RagError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_retrieval_context_reaches_model() {
        let store = Arc::new(EmbeddingStore::new(Arc::new(HashingEmbedder::new(128).unwrap())));
        store
            .add(vec![Chunk::new("Rocky is a friendly dog who loves walks")])
            .await
            .unwrap();

        let model = Arc::new(ScriptedModel::new(vec![ModelResponse::content("Rocky")]));
        let orchestrator = orchestrator(model.clone())
            .with_retrieval(RetrievalAdvisor::new(store, PromptBuilder::new("Be helpful.")));

        let reply = orchestrator
            .handle(ChatRequest::new("s", "which dog loves walks?"))
            .await
            .unwrap();
        assert_eq!(reply.retrieved.len(), 1);
        assert!(model.requests().await[0].system_prompt.contains("Rocky is a friendly dog"));
    }
}
