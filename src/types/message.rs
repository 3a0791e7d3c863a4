//! Conversation message types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::conversation::MessageId;

/// A single entry in a conversation's message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User(UserText),
    Assistant(AssistantTurn),
    ToolResult(ToolResult),
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User(UserText { text: text.into() })
    }

    pub fn as_assistant(&self) -> Option<&AssistantTurn> {
        match self {
            Self::Assistant(turn) => Some(turn),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResult> {
        match self {
            Self::ToolResult(result) => Some(result),
            _ => None,
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Assistant(_) => "assistant",
            Self::ToolResult(_) => "tool_result",
        }
    }
}

impl From<AssistantTurn> for Message {
    fn from(turn: AssistantTurn) -> Self {
        Self::Assistant(turn)
    }
}

impl From<ToolResult> for Message {
    fn from(result: ToolResult) -> Self {
        Self::ToolResult(result)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserText {
    pub text: String,
}

/// Output of one reasoning call: optional visible text plus zero or more tool requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantTurn {
    /// Stable identity used to drop replayed turns.
    pub id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_requests: Vec<ToolRequest>,
}

impl AssistantTurn {
    pub fn new(id: impl Into<MessageId>) -> Self {
        Self {
            id: id.into(),
            text: None,
            tool_requests: Vec::new(),
        }
    }

    pub fn text(id: impl Into<MessageId>, text: impl Into<String>) -> Self {
        Self::new(id).with_text(text)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_request(mut self, request: ToolRequest) -> Self {
        self.tool_requests.push(request);
        self
    }

    /// Whitespace-only text does not count as visible.
    pub fn has_visible_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    pub fn is_empty_response(&self) -> bool {
        self.tool_requests.is_empty() && !self.has_visible_text()
    }

    pub fn first_request(&self) -> Option<&ToolRequest> {
        self.tool_requests.first()
    }

    pub fn request(&self, id: &str) -> Option<&ToolRequest> {
        self.tool_requests.iter().find(|r| r.id == id)
    }
}

/// A request from the reasoning step to invoke a named tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args: Map::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Replaces the argument map with an object value; non-objects are ignored.
    pub fn with_args(mut self, args: Value) -> Self {
        if let Value::Object(map) = args {
            self.args = map;
        }
        self
    }

    pub fn args_value(&self) -> Value {
        Value::Object(self.args.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "payload", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success(Value),
    Error(String),
}

/// The answer to a [`ToolRequest`], correlated by `request_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub request_id: String,
    pub tool_name: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn success(request: &ToolRequest, payload: Value) -> Self {
        Self {
            request_id: request.id.clone(),
            tool_name: request.name.clone(),
            outcome: ToolOutcome::Success(payload),
        }
    }

    pub fn error(request: &ToolRequest, message: impl Into<String>) -> Self {
        Self {
            request_id: request.id.clone(),
            tool_name: request.name.clone(),
            outcome: ToolOutcome::Error(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Error(_))
    }

    /// Text handed back to the reasoning collaborator.
    pub fn content_text(&self) -> String {
        match &self.outcome {
            ToolOutcome::Success(Value::String(s)) => s.clone(),
            ToolOutcome::Success(value) => value.to_string(),
            ToolOutcome::Error(message) => message.clone(),
        }
    }
}
