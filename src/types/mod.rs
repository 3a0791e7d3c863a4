//! Core data model shared by every component.

mod message;
mod tool;

pub use message::{AssistantTurn, Message, ToolOutcome, ToolRequest, ToolResult, UserText};
pub use tool::{ToolClass, ToolError, ToolSpec};
