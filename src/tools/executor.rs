//! Bounded parallel executor for function handlers
//!
//! - At most `max_parallel` handlers run at once (semaphore)
//! - Each handler runs in its own task under `tool_timeout`; a timed-out task
//!   is aborted
//! - Results come back in request order regardless of completion order
//! - Handler errors, panics and timeouts become failure results

use crate::errors::RagError;
use crate::tools::function::FunctionDescriptor;
use crate::tools::types::{DispatchConfig, ToolErrorKind, ToolInvocation, ToolResult};
use crate::types::FunctionCall;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

pub struct ToolExecutor {
    semaphore: Arc<Semaphore>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_parallel.max(1))),
            timeout: config.tool_timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run validated calls concurrently, returning invocations in input order
    pub async fn execute_all(
        &self,
        calls: Vec<(FunctionCall, Arc<FunctionDescriptor>)>,
    ) -> Vec<ToolInvocation> {
        let tasks = calls
            .into_iter()
            .map(|(call, descriptor)| self.execute(call, descriptor));
        join_all(tasks).await
    }

    async fn execute(&self, call: FunctionCall, descriptor: Arc<FunctionDescriptor>) -> ToolInvocation {
        // Queue time on the semaphore is not counted
        let (result, duration_ms) = match Arc::clone(&self.semaphore).acquire_owned().await {
            Ok(_permit) => {
                let started = Instant::now();
                let result = self.run(&call, &descriptor).await;
                (result, started.elapsed().as_millis() as u64)
            }
            Err(_) => (
                ToolResult::failure(ToolErrorKind::ToolExecutionError, "executor is shut down"),
                0,
            ),
        };

        match &result {
            ToolResult::Success { .. } => {
                tracing::info!(function = %call.name, duration_ms, "function call completed")
            }
            ToolResult::Failure { kind, message } => tracing::warn!(
                function = %call.name,
                duration_ms,
                error = kind.as_str(),
                %message,
                "function call failed"
            ),
        }

        ToolInvocation {
            name: call.name,
            arguments: call.arguments,
            result,
            duration_ms,
        }
    }

    async fn run(&self, call: &FunctionCall, descriptor: &FunctionDescriptor) -> ToolResult {
        let mut handle = tokio::spawn(descriptor.call(call.arguments.clone()));

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(Ok(output))) => ToolResult::success(output),
            Ok(Ok(Err(err))) => ToolResult::from_error(&err),
            Ok(Err(join_err)) => ToolResult::failure(
                ToolErrorKind::ToolExecutionError,
                if join_err.is_panic() {
                    format!("function '{}' panicked", call.name)
                } else {
                    format!("function '{}' was cancelled", call.name)
                },
            ),
            Err(_) => {
                handle.abort();
                ToolResult::from_error(&RagError::ToolTimeout {
                    tool: call.name.clone(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }
}
