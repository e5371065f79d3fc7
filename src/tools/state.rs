//! Tool dispatch state machine
//!
//! Valid transitions:
//! 1. AwaitingModel → Done          (on: ModelAnswered)
//! 2. AwaitingModel → ToolRequested (on: ModelRequestedTools)
//! 3. ToolRequested → ToolExecuted  (on: ToolsExecuted)
//! 4. ToolExecuted  → Done          (on: ModelAnswered)
//!
//! Done is terminal; every other (state, event) pair is an
//! `InvalidTransition`.

use crate::errors::{RagError, Result};
use std::fmt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DispatchState {
    /// Waiting for a model response
    AwaitingModel,

    /// Model asked for one or more function calls
    ToolRequested,

    /// Handlers finished, results not yet sent back
    ToolExecuted,

    /// Final answer produced (terminal)
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEvent {
    /// Model returned plain content
    ModelAnswered,

    /// Model returned function calls
    ModelRequestedTools,

    /// All requested handlers have produced a result
    ToolsExecuted,
}

impl DispatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchState::Done)
    }

    pub fn transition(&self, event: DispatchEvent) -> Result<DispatchState> {
        use DispatchEvent::*;
        use DispatchState::*;

        match (self, event) {
            (AwaitingModel, ModelAnswered) => Ok(Done),
            (AwaitingModel, ModelRequestedTools) => Ok(ToolRequested),
            (ToolRequested, ToolsExecuted) => Ok(ToolExecuted),
            (ToolExecuted, ModelAnswered) => Ok(Done),
            (from, event) => Err(RagError::InvalidTransition {
                from: format!("{:?}", from),
                event: format!("{:?}", event),
                reason: if from.is_terminal() {
                    "dispatch already finished".to_string()
                } else {
                    format!("no transition from {:?} on {:?}", from, event)
                },
            }),
        }
    }

    pub fn valid_events(&self) -> Vec<DispatchEvent> {
        use DispatchEvent::*;
        use DispatchState::*;

        match self {
            AwaitingModel => vec![ModelAnswered, ModelRequestedTools],
            ToolRequested => vec![ToolsExecuted],
            ToolExecuted => vec![ModelAnswered],
            Done => vec![],
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DispatchState::AwaitingModel => "Awaiting model",
            DispatchState::ToolRequested => "Tool requested",
            DispatchState::ToolExecuted => "Tool executed",
            DispatchState::Done => "Done",
        }
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
