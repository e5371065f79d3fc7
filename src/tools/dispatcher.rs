//! Model → tools → model dispatch
//!
//! Drives [`DispatchState`] for one request. At most one round of function
//! calls is executed: the follow-up model call carries the tool results and
//! advertises no functions, so its answer is final.

use crate::errors::{RagError, Result};
use crate::models::ChatModel;
use crate::tools::executor::ToolExecutor;
use crate::tools::function::FunctionDescriptor;
use crate::tools::registry::FunctionRegistry;
use crate::tools::state::{DispatchEvent, DispatchState};
use crate::tools::types::{DispatchConfig, ToolInvocation};
use crate::types::{ChatMessage, FunctionCall, ModelRequest, ModelResponse};
use std::sync::Arc;

/// Result of one dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub answer: String,
    pub invocations: Vec<ToolInvocation>,
    /// States visited, starting with `AwaitingModel`
    pub trace: Vec<DispatchState>,
}

pub struct ToolDispatcher {
    model: Arc<dyn ChatModel>,
    registry: Arc<FunctionRegistry>,
    executor: ToolExecutor,
}

/// Tracks the current state and every state visited
struct Run {
    state: DispatchState,
    trace: Vec<DispatchState>,
}

impl Run {
    fn new() -> Self {
        Self {
            state: DispatchState::AwaitingModel,
            trace: vec![DispatchState::AwaitingModel],
        }
    }

    fn advance(&mut self, event: DispatchEvent) -> Result<()> {
        let next = self.state.transition(event)?;
        tracing::debug!(from = %self.state, ?event, to = %next, "dispatch transition");
        self.state = next;
        self.trace.push(next);
        Ok(())
    }
}

impl ToolDispatcher {
    pub fn new(model: Arc<dyn ChatModel>, registry: Arc<FunctionRegistry>, config: DispatchConfig) -> Self {
        Self {
            model,
            registry,
            executor: ToolExecutor::new(config),
        }
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    pub fn model(&self) -> &Arc<dyn ChatModel> {
        &self.model
    }

    /// Run one request to a final answer
    ///
    /// Calls to unknown or unadvertised functions, or with arguments that
    /// fail the input schema, fail the request with `InvalidArguments`
    /// before any handler runs. Handler failures are reported to the model
    /// as error payloads.
    pub async fn dispatch(&self, request: ModelRequest) -> Result<DispatchOutcome> {
        let mut run = Run::new();

        let calls = match self.model.complete(request.clone()).await? {
            ModelResponse::Content { content } => {
                run.advance(DispatchEvent::ModelAnswered)?;
                return Ok(DispatchOutcome {
                    answer: content,
                    invocations: Vec::new(),
                    trace: run.trace,
                });
            }
            ModelResponse::FunctionCalls { calls } => calls,
        };

        if calls.is_empty() {
            return Err(RagError::ModelBackend(
                "model returned an empty function call list".to_string(),
            ));
        }
        run.advance(DispatchEvent::ModelRequestedTools)?;

        let resolved = self.resolve(&request, &calls)?;
        tracing::info!(
            calls = resolved.len(),
            timeout_ms = self.executor.timeout().as_millis() as u64,
            "executing function calls"
        );
        let invocations = self.executor.execute_all(resolved).await;
        run.advance(DispatchEvent::ToolsExecuted)?;

        let follow_up = Self::follow_up(request, calls, &invocations);
        match self.model.complete(follow_up).await? {
            ModelResponse::Content { content } => {
                run.advance(DispatchEvent::ModelAnswered)?;
                Ok(DispatchOutcome {
                    answer: content,
                    invocations,
                    trace: run.trace,
                })
            }
            ModelResponse::FunctionCalls { calls } => Err(RagError::ModelBackend(format!(
                "model requested {} more function call(s) after tool results",
                calls.len()
            ))),
        }
    }

    /// Validate every call before any handler runs
    fn resolve(
        &self,
        request: &ModelRequest,
        calls: &[FunctionCall],
    ) -> Result<Vec<(FunctionCall, Arc<FunctionDescriptor>)>> {
        calls
            .iter()
            .map(|call| {
                if !request.functions.iter().any(|f| f.name == call.name) {
                    return Err(RagError::InvalidArguments(format!(
                        "model called '{}', which was not offered",
                        call.name
                    )));
                }
                let descriptor = self.registry.validate(call)?;
                Ok((call.clone(), descriptor))
            })
            .collect()
    }

    fn follow_up(
        request: ModelRequest,
        calls: Vec<FunctionCall>,
        invocations: &[ToolInvocation],
    ) -> ModelRequest {
        let mut messages = request.messages;
        messages.push(ChatMessage::assistant_calls(calls));
        messages.extend(
            invocations
                .iter()
                .map(|inv| ChatMessage::tool(&inv.name, inv.result.to_payload().to_string())),
        );

        ModelRequest {
            system_prompt: request.system_prompt,
            messages,
            functions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScriptedModel;
    use crate::types::Role;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_registry(counter: Arc<AtomicUsize>) -> Arc<FunctionRegistry> {
        let descriptor = FunctionDescriptor::new(
            "lookup",
            "Look up a key",
            json!({
                "type": "object",
                "properties": {"key": {"type": "string"}},
                "required": ["key"]
            }),
            json!({"type": "object"}),
            move |args| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"value": args["key"]}))
                }
            },
        );
        Arc::new(FunctionRegistry::new().with(descriptor).unwrap())
    }

    fn request(registry: &FunctionRegistry) -> ModelRequest {
        ModelRequest {
            system_prompt: "sys".to_string(),
            messages: vec![ChatMessage::user("look up k1")],
            functions: registry
                .specs(&crate::tools::FunctionSelection::All)
                .unwrap(),
        }
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(counter.clone());
        let model = Arc::new(ScriptedModel::new(vec![ModelResponse::content("hi")]));
        let dispatcher = ToolDispatcher::new(model.clone(), registry.clone(), DispatchConfig::default());

        let outcome = dispatcher.dispatch(request(&registry)).await.unwrap();
        assert_eq!(outcome.answer, "hi");
        assert!(outcome.invocations.is_empty());
        assert_eq!(outcome.trace, vec![DispatchState::AwaitingModel, DispatchState::Done]);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(model.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_single_call_invoked_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(counter.clone());
        let model = Arc::new(ScriptedModel::new(vec![
            ModelResponse::calls(vec![FunctionCall::new("lookup", json!({"key": "k1"}))]),
            ModelResponse::content("k1 is k1"),
        ]));
        let dispatcher = ToolDispatcher::new(model.clone(), registry.clone(), DispatchConfig::default());

        let outcome = dispatcher.dispatch(request(&registry)).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.invocations.len(), 1);
        assert_eq!(outcome.answer, "k1 is k1");
        assert_eq!(
            outcome.trace,
            vec![
                DispatchState::AwaitingModel,
                DispatchState::ToolRequested,
                DispatchState::ToolExecuted,
                DispatchState::Done
            ]
        );

        let requests = model.requests().await;
        let second = &requests[1];
        assert!(second.functions.is_empty());
        assert_eq!(second.messages.len(), 3);
        assert_eq!(second.messages[1].role, Role::Assistant);
        assert_eq!(second.messages[2].role, Role::Tool);
        assert!(second.messages[2].content.contains("k1"));
    }

    #[tokio::test]
    async fn test_unknown_function_rejected_without_invocation() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(counter.clone());
        let model = Arc::new(ScriptedModel::new(vec![ModelResponse::calls(vec![
            FunctionCall::new("lookup", json!({"key": "k1"})),
            FunctionCall::new("missing", json!({})),
        ])]));
        let dispatcher = ToolDispatcher::new(model, registry.clone(), DispatchConfig::default());

        let err = dispatcher.dispatch(request(&registry)).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidArguments(_)));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unadvertised_function_rejected() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(counter.clone());
        let model = Arc::new(ScriptedModel::new(vec![ModelResponse::calls(vec![
            FunctionCall::new("lookup", json!({"key": "k1"})),
        ])]));
        let dispatcher = ToolDispatcher::new(model, registry, DispatchConfig::default());

        let plain = ModelRequest {
            messages: vec![ChatMessage::user("hi")],
            ..Default::default()
        };
        assert!(matches!(
            dispatcher.dispatch(plain).await,
            Err(RagError::InvalidArguments(_))
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_round_of_calls_is_backend_error() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(counter);
        let call = FunctionCall::new("lookup", json!({"key": "k1"}));
        let model = Arc::new(ScriptedModel::new(vec![
            ModelResponse::calls(vec![call.clone()]),
            ModelResponse::calls(vec![call]),
        ]));
        let dispatcher = ToolDispatcher::new(model, registry.clone(), DispatchConfig::default());

        assert!(matches!(
            dispatcher.dispatch(request(&registry)).await,
            Err(RagError::ModelBackend(_))
        ));
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let registry = counting_registry(Arc::new(AtomicUsize::new(0)));
        let model = Arc::new(ScriptedModel::new(vec![]).then_fail("connection refused"));
        let dispatcher = ToolDispatcher::new(model, registry.clone(), DispatchConfig::default());

        assert!(matches!(
            dispatcher.dispatch(request(&registry)).await,
            Err(RagError::ModelBackend(_))
        ));
    }
}
