//! Bridge error types.
//!
//! Construction-time faults (bad rules, colliding tool names) and per-call
//! faults that must surface as protocol errors rather than tool results.
//! A command that runs and fails is *not* an error here; it is an
//! `ExecutionResult` with `success == false`.

use thiserror::Error;

/// Errors raised while building or driving the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("duplicate tool name '{name}' (from `{first}` and `{second}`)")]
    DuplicateToolName {
        name: String,
        first: String,
        second: String,
    },

    #[error("tool name '{name}' exceeds {max} characters (from `{path}`)")]
    NameTooLong {
        name: String,
        path: String,
        max: usize,
    },

    #[error("command path `{path}` produces an empty tool name")]
    EmptyToolName { path: String },

    #[error("invalid selection rule: {0}")]
    InvalidRule(String),

    #[error("tool not found: {name}")]
    ToolNotFound { name: String },

    #[error("unknown parameter '{param}' for tool {tool}")]
    UnknownParameter { tool: String, param: String },

    #[error("invalid value for '{param}': expected {expected}, got {got}")]
    InvalidArgument {
        param: String,
        expected: &'static str,
        got: String,
    },

    #[error("execution task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl BridgeError {
    /// True for faults caused by the caller's request (lookup / argument
    /// translation), as opposed to faults inside the bridge itself.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            BridgeError::ToolNotFound { .. }
                | BridgeError::UnknownParameter { .. }
                | BridgeError::InvalidArgument { .. }
        )
    }
}
