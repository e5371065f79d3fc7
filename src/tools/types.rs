//! Tool dispatch types
//!
//! Results of function handlers, recorded invocations and dispatch limits.

use crate::config::ToolsConfig;
use crate::errors::RagError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Which registered functions a request advertises to the model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionSelection {
    /// No functions; the model can only answer directly
    #[default]
    None,
    /// Every registered function
    All,
    /// Only the named functions (each must be registered)
    Named(Vec<String>),
}

impl FunctionSelection {
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FunctionSelection::Named(names.into_iter().map(Into::into).collect())
    }
}

/// Failure category reported back to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    NotFound,
    InvalidArguments,
    ToolTimeout,
    ToolExecutionError,
}

impl ToolErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorKind::NotFound => "not_found",
            ToolErrorKind::InvalidArguments => "invalid_arguments",
            ToolErrorKind::ToolTimeout => "tool_timeout",
            ToolErrorKind::ToolExecutionError => "tool_execution_error",
        }
    }
}

/// Outcome of one handler run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success { output: Value },
    Failure { kind: ToolErrorKind, message: String },
}

impl ToolResult {
    pub fn success(output: Value) -> Self {
        ToolResult::Success { output }
    }

    pub fn failure(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        ToolResult::Failure {
            kind,
            message: message.into(),
        }
    }

    /// Classify a handler error
    pub fn from_error(err: &RagError) -> Self {
        let kind = match err.root() {
            RagError::NotFound(_) => ToolErrorKind::NotFound,
            RagError::InvalidArguments(_) => ToolErrorKind::InvalidArguments,
            RagError::ToolTimeout { .. } => ToolErrorKind::ToolTimeout,
            _ => ToolErrorKind::ToolExecutionError,
        };
        Self::failure(kind, err.root().to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success { .. })
    }

    /// Content sent to the model in the tool message
    pub fn to_payload(&self) -> Value {
        match self {
            ToolResult::Success { output } => output.clone(),
            ToolResult::Failure { kind, message } => json!({
                "error": kind.as_str(),
                "message": message,
            }),
        }
    }
}

/// One executed function call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Value,
    pub result: ToolResult,
    pub duration_ms: u64,
}

/// Handler execution limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    pub tool_timeout: Duration,
    pub max_parallel: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tool_timeout: Duration::from_secs(10),
            max_parallel: 4,
        }
    }
}

impl From<&ToolsConfig> for DispatchConfig {
    fn from(config: &ToolsConfig) -> Self {
        Self {
            tool_timeout: config.timeout(),
            max_parallel: config.max_parallel.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_payload_shape() {
        let result = ToolResult::from_error(&RagError::NotFound("policy H004".to_string()));
        assert!(!result.is_success());
        let payload = result.to_payload();
        assert_eq!(payload["error"], "not_found");
        assert!(payload["message"].as_str().unwrap().contains("H004"));
    }

    #[test]
    fn test_error_classification() {
        let timeout = RagError::ToolTimeout {
            tool: "slow".to_string(),
            timeout_ms: 10,
        };
        assert_eq!(
            ToolResult::from_error(&timeout),
            ToolResult::failure(ToolErrorKind::ToolTimeout, timeout.to_string())
        );

        let other = RagError::ConfigError("x".to_string());
        assert!(matches!(
            ToolResult::from_error(&other),
            ToolResult::Failure { kind: ToolErrorKind::ToolExecutionError, .. }
        ));
    }

    #[test]
    fn test_success_payload_is_output() {
        let result = ToolResult::success(json!({"status": "approved"}));
        assert_eq!(result.to_payload(), json!({"status": "approved"}));
    }

    #[test]
    fn test_dispatch_config_from_tools_config() {
        let tools = ToolsConfig {
            timeout_ms: 250,
            max_parallel: 0,
        };
        let config = DispatchConfig::from(&tools);
        assert_eq!(config.tool_timeout, Duration::from_millis(250));
        assert_eq!(config.max_parallel, 1);
    }
}
