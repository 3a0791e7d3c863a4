//! # sales-agent
//!
//! Conversational sales-assistant orchestration engine.
//!
//! A [`GraphEngine`] runs each conversation through three nodes: an
//! assistant node backed by a language-model [`Reasoner`], a node for safe
//! tools, and a node for sensitive tools. Every completed step is written to
//! a [`CheckpointStore`]. Execution pauses right before a sensitive tool runs
//! and continues only after an external approve or deny decision, possibly in
//! a different process.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use sales_agent::checkpoint::MemoryCheckpointStore;
//! use sales_agent::config::{ConfigBuilder, EngineConfig};
//! use sales_agent::reasoning::{OpenAiConfig, OpenAiReasoner};
//! use sales_agent::shop::{self, Catalog};
//! use sales_agent::{ConversationId, GraphEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = ConfigBuilder::new().env().build().await?;
//!     let reasoner = OpenAiReasoner::new(OpenAiConfig::load(&provider).await?)?;
//!
//!     let engine = GraphEngine::builder()
//!         .store(Arc::new(MemoryCheckpointStore::new()))
//!         .reasoner(Arc::new(reasoner))
//!         .registry(shop::registry(Arc::new(Catalog::demo()))?)
//!         .config(EngineConfig::load(&provider).await?)
//!         .build()?;
//!
//!     let conversation = ConversationId::generate();
//!     let view = engine
//!         .submit_user_turn(&conversation, "I'd like to buy a Dell XPS 13")
//!         .await?;
//!     if let Some(pending) = view.pending {
//!         println!("approve {}?", pending.name);
//!         engine.approve_pending(&conversation).await?;
//!     }
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod checkpoint;
pub mod config;
pub mod conversation;
pub mod graph;
pub mod observability;
pub mod prelude;
pub mod reasoning;
pub mod shop;
pub mod tools;
pub mod types;

pub use checkpoint::{CheckpointError, CheckpointStore, MemoryCheckpointStore};
#[cfg(feature = "jsonl")]
pub use checkpoint::{JsonlCheckpointStore, JsonlConfig};
#[cfg(feature = "postgres")]
pub use checkpoint::PostgresCheckpointStore;
pub use config::{ConfigError, EngineConfig};
pub use conversation::{
    ControlPosition, ConversationId, CustomerId, ExecutionState, LogError, MessageId, MessageLog,
    NodeName,
};
pub use graph::{ApprovalDecision, GraphEngine, GraphEngineBuilder, Route, TurnView, route};
pub use observability::{EngineMetrics, MetricsSnapshot};
pub use reasoning::{Reasoner, ReasonerError, ReasoningRequest, ReasoningStep};
pub use tools::{RegistryError, SchemaTool, Tool, ToolExecutor, ToolRegistry};
pub use types::{
    AssistantTurn, Message, ToolClass, ToolError, ToolOutcome, ToolRequest, ToolResult, ToolSpec,
};

use std::time::Duration;

/// Error type for engine operations.
///
/// Tool failures never show up here; they are recorded in the conversation
/// as error results. Any error returned by an engine entry point leaves the
/// last checkpoint untouched and the conversation resumable from it.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The reasoner kept answering with neither text nor tool requests.
    #[error("Reasoning produced no usable output after {attempts} attempts")]
    ReasoningExhausted { attempts: u32 },

    #[error("Reasoning timed out after {:.1}s", .0.as_secs_f64())]
    ReasoningTimeout(Duration),

    /// The assistant asked for a tool that is not registered.
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("No approval pending for conversation {conversation_id}")]
    NoPendingApproval { conversation_id: String },

    /// A user turn arrived while a sensitive request awaits a decision.
    #[error("Conversation {conversation_id} awaits a decision on request {request_id}")]
    ApprovalPending {
        conversation_id: String,
        request_id: String,
    },

    #[error("Decision targets request {supplied} but {pending} is pending")]
    StaleApproval { pending: String, supplied: String },

    #[error("Step limit of {limit} reached")]
    StepLimitExceeded { limit: u32 },

    #[error("Invalid conversation state: {0}")]
    InvalidState(String),

    #[error("Reasoner error: {0}")]
    Reasoner(#[from] ReasonerError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Message log error: {0}")]
    Log(#[from] LogError),

    #[error("Tool registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Collaborator slowness or transport trouble; retrying the same call may succeed.
    Transient,
    /// The model misbehaved (empty output, unknown tool).
    Reasoning,
    /// The call does not fit the conversation's current position.
    Protocol,
    Configuration,
    /// Storage or invariant failures.
    Internal,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ReasoningTimeout(_) => ErrorCategory::Transient,
            Error::Reasoner(e) if e.is_retryable() => ErrorCategory::Transient,
            Error::Checkpoint(CheckpointError::VersionConflict { .. }) => ErrorCategory::Transient,

            Error::ReasoningExhausted { .. }
            | Error::UnknownTool { .. }
            | Error::Reasoner(_)
            | Error::Log(LogError::DuplicateToolRequest { .. }) => ErrorCategory::Reasoning,

            Error::NoPendingApproval { .. }
            | Error::ApprovalPending { .. }
            | Error::StaleApproval { .. } => ErrorCategory::Protocol,

            Error::Config(_) | Error::Registry(_) => ErrorCategory::Configuration,

            Error::StepLimitExceeded { .. }
            | Error::InvalidState(_)
            | Error::Checkpoint(_)
            | Error::Log(_) => ErrorCategory::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    /// Text suitable for showing to the end user of the conversation.
    pub fn user_message(&self) -> String {
        match self {
            Error::ReasoningExhausted { .. } | Error::ReasoningTimeout(_) | Error::Reasoner(_) => {
                "The assistant could not come up with an answer right now. Please try again."
                    .to_string()
            }
            Error::UnknownTool { .. } | Error::Log(LogError::DuplicateToolRequest { .. }) => {
                "The assistant tried an action it does not support. Please rephrase your request."
                    .to_string()
            }
            Error::ApprovalPending { .. } => {
                "Please approve or decline the pending action before continuing.".to_string()
            }
            Error::NoPendingApproval { .. } | Error::StaleApproval { .. } => {
                "There is no action waiting for your decision.".to_string()
            }
            _ => "Something went wrong. Please try again later.".to_string(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
