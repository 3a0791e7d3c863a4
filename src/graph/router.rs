//! Routing decision after an assistant turn.

use crate::conversation::{ControlPosition, NodeName};
use crate::tools::ToolRegistry;
use crate::types::{AssistantTurn, ToolClass};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Halt,
    RouteSafe,
    RouteSensitive,
}

/// Decides where control goes after `turn`.
///
/// Only the first tool request is classified, even when the turn proposes
/// several. A sensitive tool in a later position therefore runs through the
/// safe executor, which refuses it with an in-band error.
pub fn route(turn: &AssistantTurn, registry: &ToolRegistry) -> Result<Route> {
    let Some(first) = turn.first_request() else {
        return Ok(Route::Halt);
    };
    match registry.class_of(&first.name) {
        Some(ToolClass::Sensitive) => Ok(Route::RouteSensitive),
        Some(ToolClass::Safe) => Ok(Route::RouteSafe),
        None => Err(Error::UnknownTool {
            name: first.name.clone(),
        }),
    }
}

impl Route {
    /// Position the engine moves to once `turn` has been logged.
    pub(crate) fn next_position(self, turn: &AssistantTurn) -> ControlPosition {
        match (self, turn.first_request()) {
            (Route::RouteSafe, _) => ControlPosition::Running(NodeName::SafeTools),
            (Route::RouteSensitive, Some(request)) => {
                ControlPosition::PausedBeforeSensitive(request.clone())
            }
            (Route::Halt, _) | (Route::RouteSensitive, None) => ControlPosition::Halted,
        }
    }
}
