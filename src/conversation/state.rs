//! The checkpointed unit of a conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ConversationId, CustomerId, MessageLog};
use crate::types::ToolRequest;

/// Graph nodes that can hold control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeName {
    Assistant,
    SafeTools,
    SensitiveTools,
}

impl NodeName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assistant => "assistant",
            Self::SafeTools => "safe_tools",
            Self::SensitiveTools => "sensitive_tools",
        }
    }
}

impl std::fmt::Display for NodeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where execution stands between steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ControlPosition {
    Running(NodeName),
    /// Suspended right before the sensitive executor, waiting on a decision for this request.
    PausedBeforeSensitive(ToolRequest),
    Halted,
}

impl ControlPosition {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Running(_) => "running",
            Self::PausedBeforeSensitive(_) => "paused_before_sensitive",
            Self::Halted => "halted",
        }
    }
}

/// Everything needed to resume a conversation with no other input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub conversation_id: ConversationId,
    pub customer_id: CustomerId,
    pub log: MessageLog,
    pub position: ControlPosition,
    /// Incremented once per checkpoint write; stores reject non-increasing versions.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExecutionState {
    pub fn new(conversation_id: ConversationId, customer_id: CustomerId) -> Self {
        let now = Utc::now();
        Self {
            conversation_id,
            customer_id,
            log: MessageLog::new(),
            position: ControlPosition::Running(NodeName::Assistant),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn pending_approval(&self) -> Option<&ToolRequest> {
        match &self.position {
            ControlPosition::PausedBeforeSensitive(request) => Some(request),
            _ => None,
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.position, ControlPosition::PausedBeforeSensitive(_))
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.position, ControlPosition::Halted)
    }

    /// Stamps the state as the next checkpoint revision.
    pub fn next_revision(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    /// Checks that a pause points at a logged, still unanswered request.
    pub fn validate(&self) -> crate::Result<()> {
        if let ControlPosition::PausedBeforeSensitive(pending) = &self.position {
            if self.log.find_request(&pending.id).is_none() {
                return Err(crate::Error::InvalidState(format!(
                    "pending request {} is not in the message log",
                    pending.id
                )));
            }
            if self.log.has_result_for(&pending.id) {
                return Err(crate::Error::InvalidState(format!(
                    "pending request {} already has a result",
                    pending.id
                )));
            }
        }
        Ok(())
    }
}
