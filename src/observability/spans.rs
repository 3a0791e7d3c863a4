//! Structured span definitions for tracing.

use std::time::Instant;

use tracing::{Level, Span, field, span};

use crate::conversation::{ConversationId, NodeName};
use crate::types::ToolClass;

/// Span for one engine entry point (`submit`, `approve`, `deny`).
pub fn turn_span(conversation_id: &ConversationId, operation: &'static str) -> Span {
    span!(
        Level::INFO,
        "graph.turn",
        conversation_id = %conversation_id,
        operation = operation,
        otel.name = format!("graph.{}", operation),
        steps = field::Empty,
        outcome = field::Empty,
    )
}

/// Span for a single node execution inside the step loop.
pub fn step_span(node: NodeName, step: u32) -> Span {
    span!(
        Level::DEBUG,
        "graph.step",
        node = %node,
        step = step,
        otel.name = format!("graph.step.{}", node),
    )
}

/// Tracks one reasoning call including its corrective retries.
pub struct ReasoningSpan {
    span: Span,
    start: Instant,
}

impl ReasoningSpan {
    pub fn new(max_attempts: u32) -> Self {
        let span = span!(
            Level::INFO,
            "reasoning.step",
            max_attempts = max_attempts,
            otel.name = "reasoning.step",
            attempts = field::Empty,
            tool_requests = field::Empty,
            latency_ms = field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn finish(self, attempts: u32, tool_requests: usize) {
        self.span.record("attempts", attempts);
        self.span.record("tool_requests", tool_requests as u64);
        self.span
            .record("latency_ms", self.start.elapsed().as_millis() as u64);
    }
}

/// Tracks one tool invocation.
pub struct ToolCallSpan {
    span: Span,
    start: Instant,
}

impl ToolCallSpan {
    pub fn new(tool_name: &str, request_id: &str, class: ToolClass) -> Self {
        let span = span!(
            Level::INFO,
            "tool.execute",
            tool_name = tool_name,
            request_id = request_id,
            class = %class,
            otel.name = format!("tool.{}", tool_name),
            is_error = field::Empty,
            duration_ms = field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Records the outcome and returns the elapsed milliseconds.
    pub fn finish(self, is_error: bool) -> u64 {
        let duration_ms = self.start.elapsed().as_millis() as u64;
        self.span.record("is_error", is_error);
        self.span.record("duration_ms", duration_ms);
        duration_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_without_subscriber() {
        let id = ConversationId::from("c1");
        let turn = turn_span(&id, "submit");
        turn.record("steps", 3u32);
        let _step = step_span(NodeName::SafeTools, 1);

        let reasoning = ReasoningSpan::new(5);
        reasoning.finish(2, 1);

        let tool = ToolCallSpan::new("search_products", "call-1", ToolClass::Safe);
        let _ = tool.finish(false);
    }
}
