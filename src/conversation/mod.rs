//! Conversation identity, history and checkpointable execution state.

mod ids;
mod log;
mod state;

pub use ids::{ConversationId, CustomerId, DEFAULT_CUSTOMER_ID, MessageId};
pub use log::{LogError, MessageLog};
pub use state::{ControlPosition, ExecutionState, NodeName};
