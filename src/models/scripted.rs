//! Scripted model for tests and offline demos
//!
//! Replays a fixed queue of responses and records every request it receives.

use super::ChatModel;
use crate::errors::{RagError, Result};
use crate::types::{ModelRequest, ModelResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<ModelResponse>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a backend failure
    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.responses
            .get_mut()
            .push_back(Err(RagError::ModelBackend(message.into())));
        self
    }

    /// Requests received so far, in order
    pub async fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn remaining(&self) -> usize {
        self.responses.lock().await.len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse> {
        self.requests.lock().await.push(request);
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(RagError::ModelBackend("script exhausted".to_string())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
