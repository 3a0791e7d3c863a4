//! Execution graph: router and engine.

mod engine;
mod router;

pub use crate::conversation::NodeName;
pub use engine::{
    ApprovalDecision, GraphEngine, GraphEngineBuilder, TurnView, denial_message, skipped_message,
};
pub use router::{Route, route};
