//! Error types for ragbuddy
//!
//! One taxonomy covers ingestion, retrieval and tool dispatch. Errors raised
//! at a request boundary are wrapped in [`RagError::Ingestion`] or
//! [`RagError::Query`] so callers can tell which side of the system failed.

use thiserror::Error;

/// Main error type for ingestion, retrieval and dispatch
#[derive(Error, Debug)]
pub enum RagError {
    /// Underlying source could not be opened
    #[error("Source unavailable: {location}: {reason}")]
    SourceUnavailable { location: String, reason: String },

    /// Source content could not be decoded
    #[error("Parse error in {location}: {reason}")]
    ParseError { location: String, reason: String },

    /// Embedding could not be computed or does not fit the store
    #[error("Embedding failure: {0}")]
    EmbeddingFailure(String),

    /// Arguments do not match what the callee accepts
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Tool handler did not finish in time
    #[error("Tool '{tool}' timed out after {timeout_ms}ms")]
    ToolTimeout { tool: String, timeout_ms: u64 },

    /// Tool handler failed
    #[error("Tool '{tool}' failed: {reason}")]
    ToolExecutionError { tool: String, reason: String },

    /// Dataset lookup for an unknown key
    #[error("Not found: {0}")]
    NotFound(String),

    /// Model backend failure (fatal for the current request)
    #[error("Model backend error: {0}")]
    ModelBackend(String),

    /// State machine transition errors
    #[error("Invalid state transition from {from} via {event}: {reason}")]
    InvalidTransition {
        from: String,
        event: String,
        reason: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Failure of an ingestion batch
    #[error("Ingestion of '{source_name}' failed: {cause}")]
    Ingestion {
        source_name: String,
        #[source]
        cause: Box<RagError>,
    },

    /// Failure of a query request
    #[error("Query for session '{session_id}' failed: {cause}")]
    Query {
        session_id: String,
        #[source]
        cause: Box<RagError>,
    },
}

/// Which side of the system a request-level error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    Ingestion,
    Query,
}

impl RagError {
    /// Wrap as an ingestion failure (idempotent)
    pub fn into_ingestion(self, source_name: impl Into<String>) -> Self {
        match self {
            err @ RagError::Ingestion { .. } => err,
            err => RagError::Ingestion {
                source_name: source_name.into(),
                cause: Box::new(err),
            },
        }
    }

    /// Wrap as a query failure (idempotent)
    pub fn into_query(self, session_id: impl Into<String>) -> Self {
        match self {
            err @ RagError::Query { .. } => err,
            err => RagError::Query {
                session_id: session_id.into(),
                cause: Box::new(err),
            },
        }
    }

    /// Request stage, if this error crossed a request boundary
    pub fn stage(&self) -> Option<ErrorStage> {
        match self {
            RagError::Ingestion { .. } => Some(ErrorStage::Ingestion),
            RagError::Query { .. } => Some(ErrorStage::Query),
            _ => None,
        }
    }

    /// Innermost error, unwrapping stage wrappers
    pub fn root(&self) -> &RagError {
        match self {
            RagError::Ingestion { cause, .. } | RagError::Query { cause, .. } => cause.root(),
            err => err,
        }
    }
}

/// Result type alias for ragbuddy operations
pub type Result<T> = std::result::Result<T, RagError>;
