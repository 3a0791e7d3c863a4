//! Tool declarations and collaborator errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether a tool may run without human approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolClass {
    /// Read-only or otherwise harmless; runs automatically.
    Safe,
    /// Has an external side effect; the engine pauses before running it.
    Sensitive,
}

impl std::fmt::Display for ToolClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Safe => write!(f, "safe"),
            Self::Sensitive => write!(f, "sensitive"),
        }
    }
}

/// Static declaration of a tool as offered to the reasoning collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub schema: serde_json::Value,
    pub class: ToolClass,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: serde_json::Value,
        class: ToolClass,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            class,
        }
    }

    pub fn is_sensitive(&self) -> bool {
        self.class == ToolClass::Sensitive
    }
}

/// Failure reported by a tool collaborator.
///
/// Never surfaced to callers of the engine: executors turn it into an
/// in-band error result so the reasoning step can react.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("unavailable: {message}")]
    Unavailable { message: String },

    #[error("execution failed: {message}")]
    ExecutionFailed { message: String },
}

impl ToolError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            message: message.into(),
        }
    }
}
