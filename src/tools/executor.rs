//! Runs tool requests and turns every failure into an in-band result.

use std::sync::Arc;

use futures::future::join_all;
use tracing::Instrument;

use super::ToolRegistry;
use crate::observability::{EngineMetrics, ToolCallSpan};
use crate::types::{ToolClass, ToolError, ToolRequest, ToolResult};

/// Formats the error payload handed back to the reasoning collaborator.
pub fn failure_message(tool_name: &str, description: &str) -> String {
    format!(
        "Error: {} failed: {}. Please fix your mistakes.",
        tool_name, description
    )
}

/// Executes requests for one tool class.
///
/// The safe and sensitive executors share this code; the engine decides when
/// each may run. A request naming an unregistered tool, or a tool of the
/// other class, gets an error result instead of running.
#[derive(Clone)]
pub struct ToolExecutor {
    class: ToolClass,
    registry: Arc<ToolRegistry>,
    metrics: Option<Arc<EngineMetrics>>,
}

impl ToolExecutor {
    pub fn new(class: ToolClass, registry: Arc<ToolRegistry>) -> Self {
        Self {
            class,
            registry,
            metrics: None,
        }
    }

    pub fn safe(registry: Arc<ToolRegistry>) -> Self {
        Self::new(ToolClass::Safe, registry)
    }

    pub fn sensitive(registry: Arc<ToolRegistry>) -> Self {
        Self::new(ToolClass::Sensitive, registry)
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn class(&self) -> ToolClass {
        self.class
    }

    /// Returns exactly one result per request, in request order.
    pub async fn execute(&self, requests: &[ToolRequest]) -> Vec<ToolResult> {
        join_all(requests.iter().map(|request| self.execute_one(request))).await
    }

    async fn execute_one(&self, request: &ToolRequest) -> ToolResult {
        let span = ToolCallSpan::new(&request.name, &request.id, self.class);
        let outcome = self
            .invoke(request)
            .instrument(span.span().clone())
            .await;

        let result = match outcome {
            Ok(payload) => ToolResult::success(request, payload),
            Err(e) => {
                tracing::warn!(
                    tool_name = %request.name,
                    request_id = %request.id,
                    error = %e,
                    "Tool execution failed"
                );
                ToolResult::error(request, failure_message(&request.name, &e.to_string()))
            }
        };

        let duration_ms = span.finish(result.is_error());
        if let Some(metrics) = &self.metrics {
            metrics.record_tool(duration_ms, result.is_error());
        }
        result
    }

    async fn invoke(&self, request: &ToolRequest) -> Result<serde_json::Value, ToolError> {
        let Some(tool) = self.registry.get(&request.name) else {
            return Err(ToolError::not_found(format!("tool '{}'", request.name)));
        };
        if tool.class() != self.class {
            return Err(ToolError::unavailable(format!(
                "'{}' is a {} tool and cannot run in the {} executor",
                request.name,
                tool.class(),
                self.class
            )));
        }
        tool.execute(request.args_value()).await
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("class", &self.class)
            .field("registry", &self.registry)
            .finish()
    }
}
