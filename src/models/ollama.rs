//! Ollama chat client
//!
//! Non-streaming `POST /api/chat` with the `tools` field for function
//! calling.

use super::ChatModel;
use crate::errors::{RagError, Result};
use crate::types::{ChatMessage, FunctionCall, FunctionSpec, ModelRequest, ModelResponse, Role};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Default Ollama API endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default chat model
pub const DEFAULT_MODEL: &str = "qwen2.5:7b-instruct";

#[derive(Debug, Clone)]
pub struct OllamaChatModel {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaChatModel {
    pub fn new() -> Result<Self> {
        Self::with_config(DEFAULT_OLLAMA_URL, DEFAULT_MODEL, Duration::from_secs(120))
    }

    pub fn with_config(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RagError::HttpError)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    /// Check if Ollama is reachable
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/version", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request(&self, request: ModelRequest) -> OllamaChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system_prompt.is_empty() {
            messages.push(WireMessage::from(&ChatMessage::system(request.system_prompt)));
        }
        messages.extend(request.messages.iter().map(WireMessage::from));

        OllamaChatRequest {
            model: self.model.clone(),
            messages,
            tools: request.functions.iter().map(WireTool::from).collect(),
            stream: false,
        }
    }
}

#[async_trait]
impl ChatModel for OllamaChatModel {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse> {
        let url = format!("{}/api/chat", self.base_url);
        let body = self.build_request(request);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::ModelBackend(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::ModelBackend(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let reply: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| RagError::ModelBackend(format!("Failed to parse response: {}", e)))?;

        Ok(reply.message.into_response())
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: Role,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    function: WireFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                })
                .collect(),
            tool_name: message.tool_name.clone(),
        }
    }
}

impl WireMessage {
    fn into_response(self) -> ModelResponse {
        if self.tool_calls.is_empty() {
            ModelResponse::content(self.content)
        } else {
            ModelResponse::calls(
                self.tool_calls
                    .into_iter()
                    .map(|c| FunctionCall::new(c.function.name, normalize_arguments(c.function.arguments)))
                    .collect(),
            )
        }
    }
}

/// Some models send arguments as a JSON-encoded string
fn normalize_arguments(arguments: Value) -> Value {
    match arguments {
        Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        Value::Null => Value::Object(Default::default()),
        other => other,
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionSpec,
}

#[derive(Debug, Serialize)]
struct WireFunctionSpec {
    name: String,
    description: String,
    parameters: Value,
}

impl From<&FunctionSpec> for WireTool {
    fn from(spec: &FunctionSpec) -> Self {
        Self {
            kind: "function",
            function: WireFunctionSpec {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.parameters.clone(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: WireMessage,
}
