//! The reasoning step and its language-model collaborators.
//!
//! A [`Reasoner`] turns message history into one [`AssistantTurn`]. The
//! [`ReasoningStep`] wraps it with the corrective retry for empty answers
//! and an optional overall timeout.

mod backoff;
mod openai;
mod step;
mod template;

pub use backoff::ExponentialBackoff;
pub use openai::{OpenAiConfig, OpenAiReasoner};
pub use step::{CORRECTIVE_INSTRUCTION, DEFAULT_MAX_ATTEMPTS, ReasoningStep};
pub use template::{DEFAULT_INSTRUCTIONS, InstructionTemplate};

use async_trait::async_trait;
use thiserror::Error;

use crate::conversation::CustomerId;
use crate::types::{AssistantTurn, Message, ToolSpec};

/// Everything a reasoning collaborator sees for one call.
#[derive(Debug, Clone)]
pub struct ReasoningRequest {
    pub messages: Vec<Message>,
    pub customer: CustomerId,
    /// Rendered system instructions.
    pub instructions: String,
    pub tools: Vec<ToolSpec>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReasonerError {
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ReasonerError {
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Network { .. } => true,
            Self::InvalidResponse { .. } | Self::Configuration { .. } => false,
        }
    }
}

/// Opaque reasoning function; rate limiting and transport retries are its own concern.
#[async_trait]
pub trait Reasoner: Send + Sync {
    fn name(&self) -> &str {
        "reasoner"
    }

    async fn reason(&self, request: &ReasoningRequest) -> Result<AssistantTurn, ReasonerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let api = |status| ReasonerError::Api {
            status,
            message: String::new(),
        };
        assert!(api(429).is_retryable());
        assert!(api(503).is_retryable());
        assert!(!api(400).is_retryable());
        assert!(
            ReasonerError::Network {
                message: "reset".into()
            }
            .is_retryable()
        );
        assert!(!ReasonerError::invalid_response("no choices").is_retryable());
    }
}
