//! Append-only conversation history.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::MessageId;
use crate::types::{AssistantTurn, Message, ToolRequest, ToolResult};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    #[error("tool result {request_id} has no matching tool request earlier in the log")]
    OrphanToolResult { request_id: String },

    #[error("tool request {request_id} already has a result")]
    DuplicateToolResult { request_id: String },

    /// Request ids correlate results, so each may appear only once per log.
    #[error("tool request id {request_id} is already used in this conversation")]
    DuplicateToolRequest { request_id: String },
}

/// Ordered message history of one conversation.
///
/// Append order is the history. Assistant turns are keyed by their
/// [`MessageId`] so a replayed turn is dropped instead of doubled, and a
/// tool result is only accepted after the request it answers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message.
    ///
    /// Returns `Ok(false)` when an assistant turn with the same id is
    /// already present; the log is left unchanged in that case. A new turn
    /// whose request ids collide with logged requests, or with each other,
    /// is rejected.
    pub fn append(&mut self, message: impl Into<Message>) -> Result<bool, LogError> {
        let message = message.into();
        match &message {
            Message::Assistant(turn) if self.contains_turn(&turn.id) => {
                tracing::debug!(message_id = %turn.id, "Dropping duplicate assistant turn");
                return Ok(false);
            }
            Message::Assistant(turn) => {
                for (i, request) in turn.tool_requests.iter().enumerate() {
                    let repeated_in_turn = turn.tool_requests[..i]
                        .iter()
                        .any(|earlier| earlier.id == request.id);
                    if repeated_in_turn || self.find_request(&request.id).is_some() {
                        return Err(LogError::DuplicateToolRequest {
                            request_id: request.id.clone(),
                        });
                    }
                }
            }
            Message::ToolResult(result) => {
                if self.find_request(&result.request_id).is_none() {
                    return Err(LogError::OrphanToolResult {
                        request_id: result.request_id.clone(),
                    });
                }
                if self.has_result_for(&result.request_id) {
                    return Err(LogError::DuplicateToolResult {
                        request_id: result.request_id.clone(),
                    });
                }
            }
            _ => {}
        }
        self.messages.push(message);
        Ok(true)
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    /// Appends results in order, stopping at the first rejected one.
    pub fn append_results(
        &mut self,
        results: impl IntoIterator<Item = ToolResult>,
    ) -> Result<(), LogError> {
        for result in results {
            self.append(result)?;
        }
        Ok(())
    }

    pub fn contains_turn(&self, id: &MessageId) -> bool {
        self.messages
            .iter()
            .any(|m| m.as_assistant().is_some_and(|t| &t.id == id))
    }

    pub fn find_request(&self, request_id: &str) -> Option<&ToolRequest> {
        self.messages
            .iter()
            .filter_map(Message::as_assistant)
            .find_map(|turn| turn.request(request_id))
    }

    pub fn has_result_for(&self, request_id: &str) -> bool {
        self.messages
            .iter()
            .filter_map(Message::as_tool_result)
            .any(|r| r.request_id == request_id)
    }

    pub fn find_result(&self, request_id: &str) -> Option<&ToolResult> {
        self.messages
            .iter()
            .filter_map(Message::as_tool_result)
            .find(|r| r.request_id == request_id)
    }

    /// Requests of `turn` that are still unanswered, in request order.
    pub fn unanswered_requests<'a>(&self, turn: &'a AssistantTurn) -> Vec<&'a ToolRequest> {
        turn.tool_requests
            .iter()
            .filter(|r| !self.has_result_for(&r.id))
            .collect()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn last_assistant(&self) -> Option<&AssistantTurn> {
        self.messages.iter().rev().find_map(Message::as_assistant)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl<'a> IntoIterator for &'a MessageLog {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
