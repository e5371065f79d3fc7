//! Integration tests for function dispatch through the orchestrator
//!
//! Uses the scripted model, so no model backend is required.

use ragbuddy::agent::{ChatRequest, Orchestrator};
use ragbuddy::errors::{ErrorStage, RagError};
use ragbuddy::memory::{ConversationMemory, EmbeddingStore, HashingEmbedder};
use ragbuddy::models::ScriptedModel;
use ragbuddy::rag::{PromptBuilder, RetrievalAdvisor};
use ragbuddy::tools::{
    policy_status_function, DispatchConfig, DispatchState, FunctionDescriptor, FunctionRegistry,
    FunctionSelection, PolicyDataset, ToolDispatcher, ToolErrorKind, ToolResult,
    POLICY_STATUS_FUNCTION,
};
use ragbuddy::types::{Chunk, FunctionCall, ModelResponse, Role};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn policy_registry() -> FunctionRegistry {
    let dataset = Arc::new(PolicyDataset::from_pairs([
        ("H001", "pending"),
        ("H002", "approved"),
        ("H003", "rejected"),
    ]));
    FunctionRegistry::new()
        .with(policy_status_function(dataset).unwrap())
        .unwrap()
}

fn orchestrator(model: Arc<ScriptedModel>, registry: FunctionRegistry, config: DispatchConfig) -> Orchestrator {
    let dispatcher = ToolDispatcher::new(model, Arc::new(registry), config);
    Orchestrator::new(
        dispatcher,
        Arc::new(ConversationMemory::new()),
        PromptBuilder::new("You are an insurance assistant."),
    )
}

fn policy_call(id: &str) -> FunctionCall {
    FunctionCall::new(POLICY_STATUS_FUNCTION, json!({ "id": id }))
}

#[tokio::test]
async fn test_policy_status_scenario() {
    let model = Arc::new(ScriptedModel::new(vec![
        ModelResponse::calls(vec![
            policy_call("H001"),
            policy_call("H002"),
            policy_call("H004"),
            policy_call("H003"),
        ]),
        ModelResponse::content(
            "H001 is pending, H002 is approved, H004 was not found and H003 is rejected.",
        ),
    ]));
    let orchestrator = orchestrator(model.clone(), policy_registry(), DispatchConfig::default());

    let request = ChatRequest::new("customer-1", "What is the status of my policy H001, H002, H004 and H003?")
        .without_retrieval()
        .with_functions(FunctionSelection::named([POLICY_STATUS_FUNCTION]));
    let reply = orchestrator.handle(request).await.unwrap();

    assert_eq!(reply.invocations.len(), 4);
    let payloads: Vec<Value> = reply.invocations.iter().map(|i| i.result.to_payload()).collect();
    assert_eq!(payloads[0]["status"], "pending");
    assert_eq!(payloads[1]["status"], "approved");
    assert_eq!(payloads[2]["error"], "not_found");
    assert_eq!(payloads[3]["status"], "rejected");
    assert!(matches!(
        reply.invocations[2].result,
        ToolResult::Failure { kind: ToolErrorKind::NotFound, .. }
    ));
    assert_eq!(
        reply.trace,
        vec![
            DispatchState::AwaitingModel,
            DispatchState::ToolRequested,
            DispatchState::ToolExecuted,
            DispatchState::Done,
        ]
    );
    assert!(reply.content.contains("H004 was not found"));

    let requests = model.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(model.remaining().await, 0);
    assert_eq!(requests[0].functions.len(), 1);
    assert_eq!(requests[0].functions[0].name, POLICY_STATUS_FUNCTION);

    let tool_messages: Vec<_> = requests[1]
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .collect();
    assert_eq!(tool_messages.len(), 4);
    assert!(tool_messages[2].content.contains("not_found"));
}

#[tokio::test]
async fn test_unregistered_function_invokes_nothing() {
    let counter = Arc::new(AtomicUsize::new(0));
    let counted = {
        let counter = counter.clone();
        FunctionDescriptor::new(
            "counted",
            "Counts calls",
            json!({"type": "object"}),
            json!({"type": "object"}),
            move |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({}))
                }
            },
        )
    };
    let registry = FunctionRegistry::new().with(counted).unwrap();
    let model = Arc::new(ScriptedModel::new(vec![ModelResponse::calls(vec![
        FunctionCall::new("counted", json!({})),
        FunctionCall::new("delete_everything", json!({})),
    ])]));
    let orchestrator = orchestrator(model, registry, DispatchConfig::default());

    let err = orchestrator
        .handle(
            ChatRequest::new("s", "do things")
                .without_retrieval()
                .with_functions(FunctionSelection::All),
        )
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(ErrorStage::Query));
    assert!(matches!(err.root(), RagError::InvalidArguments(_)));
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(orchestrator.memory().len("s").await, 0);
}

#[tokio::test]
async fn test_schema_mismatch_rejected() {
    let model = Arc::new(ScriptedModel::new(vec![ModelResponse::calls(vec![
        FunctionCall::new(POLICY_STATUS_FUNCTION, json!({ "policy": 7 })),
    ])]));
    let orchestrator = orchestrator(model, policy_registry(), DispatchConfig::default());

    let err = orchestrator
        .handle(
            ChatRequest::new("s", "status?")
                .without_retrieval()
                .with_functions(FunctionSelection::All),
        )
        .await
        .unwrap_err();
    assert!(matches!(err.root(), RagError::InvalidArguments(_)));
}

#[tokio::test]
async fn test_slow_and_failing_handlers_do_not_abort_turn() {
    let slow = FunctionDescriptor::new(
        "slow",
        "Never finishes in time",
        json!({"type": "object"}),
        json!({"type": "object"}),
        |_| async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(json!({}))
        },
    );
    let broken = FunctionDescriptor::new(
        "broken",
        "Always fails",
        json!({"type": "object"}),
        json!({"type": "object"}),
        |_| async move {
            Err(RagError::ToolExecutionError {
                tool: "broken".to_string(),
                reason: "database offline".to_string(),
            })
        },
    );
    let registry = FunctionRegistry::new().with(slow).unwrap().with(broken).unwrap();

    let model = Arc::new(ScriptedModel::new(vec![
        ModelResponse::calls(vec![
            FunctionCall::new("slow", json!({})),
            FunctionCall::new("broken", json!({})),
        ]),
        ModelResponse::content("Sorry, both lookups failed."),
    ]));
    let config = DispatchConfig {
        tool_timeout: Duration::from_millis(50),
        max_parallel: 4,
    };
    let orchestrator = orchestrator(model.clone(), registry, config);

    let reply = orchestrator
        .handle(
            ChatRequest::new("s", "try both")
                .without_retrieval()
                .with_functions(FunctionSelection::All),
        )
        .await
        .unwrap();

    assert_eq!(reply.content, "Sorry, both lookups failed.");
    assert!(matches!(
        reply.invocations[0].result,
        ToolResult::Failure { kind: ToolErrorKind::ToolTimeout, .. }
    ));
    assert!(matches!(
        reply.invocations[1].result,
        ToolResult::Failure { kind: ToolErrorKind::ToolExecutionError, .. }
    ));

    let second = &model.requests().await[1];
    assert!(second.messages.iter().any(|m| m.content.contains("tool_timeout")));
    assert!(second.messages.iter().any(|m| m.content.contains("database offline")));
}

#[tokio::test]
async fn test_retrieval_and_functions_together() {
    let store = Arc::new(EmbeddingStore::new(Arc::new(HashingEmbedder::new(128).unwrap())));
    store
        .add(vec![
            Chunk::new("Policy H002 covers water damage to the kitchen."),
            Chunk::new("Mars is the fourth planet from the sun."),
        ])
        .await
        .unwrap();

    let model = Arc::new(ScriptedModel::new(vec![
        ModelResponse::calls(vec![policy_call("H002")]),
        ModelResponse::content("H002 is approved and covers water damage."),
    ]));
    let orchestrator = orchestrator(model.clone(), policy_registry(), DispatchConfig::default())
        .with_retrieval(
            RetrievalAdvisor::new(store, PromptBuilder::new("You are an insurance assistant."))
                .with_top_k(1),
        );

    let reply = orchestrator
        .handle(
            ChatRequest::new("s", "Is my policy H002 approved for water damage?")
                .with_functions(FunctionSelection::All),
        )
        .await
        .unwrap();

    assert_eq!(reply.retrieved.len(), 1);
    assert!(reply.retrieved[0].chunk.text.contains("water damage"));
    assert_eq!(reply.invocations.len(), 1);

    let requests = model.requests().await;
    assert!(requests[0].system_prompt.contains("covers water damage"));
    assert_eq!(requests[1].system_prompt, requests[0].system_prompt);
}
