//! Commonly used types and traits.
//!
//! ```rust
//! use sales_agent::prelude::*;
//! ```

pub use crate::checkpoint::{CheckpointStore, MemoryCheckpointStore};
pub use crate::config::{ConfigBuilder, ConfigProvider, ConfigProviderExt, EngineConfig};
pub use crate::conversation::{ControlPosition, ConversationId, CustomerId, ExecutionState};
pub use crate::graph::{ApprovalDecision, GraphEngine, TurnView};
pub use crate::reasoning::{Reasoner, ReasonerError, ReasoningRequest};
pub use crate::tools::{SchemaTool, Tool, ToolRegistry};
pub use crate::types::{AssistantTurn, Message, ToolClass, ToolError, ToolRequest, ToolResult};
pub use crate::{Error, Result};
