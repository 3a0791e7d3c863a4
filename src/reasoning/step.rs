//! Reasoning step: one usable assistant turn per call, or an error.

use std::sync::Arc;
use std::time::Duration;

use tracing::{Instrument, debug, warn};

use super::{InstructionTemplate, Reasoner, ReasoningRequest};
use crate::conversation::{CustomerId, MessageLog};
use crate::observability::{EngineMetrics, ReasoningSpan};
use crate::types::{AssistantTurn, Message, ToolSpec};
use crate::{Error, Result};

/// Appended to the working history after an empty answer.
pub const CORRECTIVE_INSTRUCTION: &str = "Respond with a real output.";

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Calls the reasoner until it returns visible text or a tool request.
///
/// Each empty answer appends [`CORRECTIVE_INSTRUCTION`] to a private copy of
/// the history; corrections accumulate across attempts. The durable log is
/// never touched. After `max_attempts` empty answers the step fails with
/// [`Error::ReasoningExhausted`]; the optional timeout covers the whole loop.
#[derive(Clone)]
pub struct ReasoningStep {
    reasoner: Arc<dyn Reasoner>,
    template: InstructionTemplate,
    max_attempts: u32,
    timeout: Option<Duration>,
    metrics: Option<Arc<EngineMetrics>>,
}

impl ReasoningStep {
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self {
            reasoner,
            template: InstructionTemplate::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: None,
            metrics: None,
        }
    }

    pub fn template(mut self, template: InstructionTemplate) -> Self {
        self.template = template;
        self
    }

    /// Values below one are raised to one.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn attempts_limit(&self) -> u32 {
        self.max_attempts
    }

    pub async fn reason(
        &self,
        log: &MessageLog,
        customer: &CustomerId,
        tools: &[ToolSpec],
    ) -> Result<AssistantTurn> {
        let span = ReasoningSpan::new(self.max_attempts);
        let run = self
            .retry_until_usable(log, customer, tools)
            .instrument(span.span().clone());

        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| Error::ReasoningTimeout(limit))
                .and_then(|r| r),
            None => run.await,
        };

        match outcome {
            Ok((turn, attempts)) => {
                span.finish(attempts, turn.tool_requests.len());
                Ok(turn)
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.reasoning_failures.inc();
                }
                warn!(error = %e, "Reasoning step failed");
                Err(e)
            }
        }
    }

    async fn retry_until_usable(
        &self,
        log: &MessageLog,
        customer: &CustomerId,
        tools: &[ToolSpec],
    ) -> Result<(AssistantTurn, u32)> {
        let mut request = ReasoningRequest {
            messages: log.messages().to_vec(),
            customer: customer.clone(),
            instructions: self.template.render(customer),
            tools: tools.to_vec(),
        };

        for attempt in 1..=self.max_attempts {
            if let Some(metrics) = &self.metrics {
                metrics.reasoning_calls.inc();
            }
            let turn = self.reasoner.reason(&request).await?;
            if !turn.is_empty_response() {
                debug!(
                    attempt,
                    tool_requests = turn.tool_requests.len(),
                    "Reasoner produced a usable turn"
                );
                return Ok((turn, attempt));
            }

            debug!(attempt, "Empty reasoner response, asking again");
            if let Some(metrics) = &self.metrics {
                metrics.reasoning_retries.inc();
            }
            request.messages.push(Message::user(CORRECTIVE_INSTRUCTION));
        }

        Err(Error::ReasoningExhausted {
            attempts: self.max_attempts,
        })
    }
}

impl std::fmt::Debug for ReasoningStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasoningStep")
            .field("reasoner", &self.reasoner.name())
            .field("max_attempts", &self.max_attempts)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::ReasonerError;
    use crate::types::ToolRequest;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    /// Replays queued turns and records what it was sent.
    #[derive(Default)]
    struct Scripted {
        turns: Mutex<VecDeque<AssistantTurn>>,
        seen: Mutex<Vec<ReasoningRequest>>,
    }

    impl Scripted {
        fn new(turns: Vec<AssistantTurn>) -> Arc<Self> {
            Arc::new(Self {
                turns: Mutex::new(turns.into()),
                seen: Mutex::default(),
            })
        }
    }

    #[async_trait]
    impl Reasoner for Scripted {
        async fn reason(
            &self,
            request: &ReasoningRequest,
        ) -> std::result::Result<AssistantTurn, ReasonerError> {
            self.seen.lock().await.push(request.clone());
            self.turns
                .lock()
                .await
                .pop_front()
                .ok_or_else(|| ReasonerError::invalid_response("script exhausted"))
        }
    }

    struct Stalled;

    #[async_trait]
    impl Reasoner for Stalled {
        async fn reason(
            &self,
            _request: &ReasoningRequest,
        ) -> std::result::Result<AssistantTurn, ReasonerError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(AssistantTurn::text("late", "too late"))
        }
    }

    fn history() -> MessageLog {
        let mut log = MessageLog::new();
        log.append_user("hello");
        log
    }

    #[tokio::test]
    async fn test_returns_first_usable_turn() {
        let reasoner = Scripted::new(vec![AssistantTurn::text("m1", "Hi! How can I help?")]);
        let step = ReasoningStep::new(reasoner.clone());

        let turn = step.reason(&history(), &"7".into(), &[]).await.unwrap();
        assert_eq!(turn.id.as_str(), "m1");

        let seen = reasoner.seen.lock().await;
        assert_eq!(seen.len(), 1);
        assert!(seen[0].instructions.contains("Current customer id: 7"));
    }

    #[tokio::test]
    async fn test_corrections_accumulate_in_working_copy() {
        let reasoner = Scripted::new(vec![
            AssistantTurn::new("e1"),
            AssistantTurn::text("e2", "   "),
            AssistantTurn::new("m3").with_request(ToolRequest::new("c1", "search_products")),
        ]);
        let metrics = Arc::new(EngineMetrics::new());
        let step = ReasoningStep::new(reasoner.clone()).with_metrics(metrics.clone());
        let log = history();

        let turn = step.reason(&log, &"7".into(), &[]).await.unwrap();
        assert_eq!(turn.id.as_str(), "m3");
        assert_eq!(log.len(), 1);

        let seen = reasoner.seen.lock().await;
        let lens: Vec<usize> = seen.iter().map(|r| r.messages.len()).collect();
        assert_eq!(lens, vec![1, 2, 3]);
        assert_eq!(seen[2].messages[2], Message::user(CORRECTIVE_INSTRUCTION));
        assert_eq!(metrics.snapshot().reasoning_retries, 2);
        assert_eq!(metrics.snapshot().reasoning_calls, 3);
    }

    #[tokio::test]
    async fn test_exhausted_after_cap() {
        let empties = (0..5).map(|i| AssistantTurn::new(format!("e{}", i))).collect();
        let reasoner = Scripted::new(empties);
        let step = ReasoningStep::new(reasoner.clone());

        let err = step.reason(&history(), &"7".into(), &[]).await.unwrap_err();
        assert!(matches!(err, Error::ReasoningExhausted { attempts: 5 }));
        assert_eq!(reasoner.seen.lock().await.len(), 5);
    }

    #[tokio::test]
    async fn test_custom_cap() {
        let reasoner = Scripted::new(vec![AssistantTurn::new("e1"), AssistantTurn::new("e2")]);
        let step = ReasoningStep::new(reasoner).max_attempts(2);
        let err = step.reason(&history(), &"7".into(), &[]).await.unwrap_err();
        assert!(matches!(err, Error::ReasoningExhausted { attempts: 2 }));
    }

    #[tokio::test]
    async fn test_collaborator_error_propagates() {
        let step = ReasoningStep::new(Scripted::new(vec![]));
        let err = step.reason(&history(), &"7".into(), &[]).await.unwrap_err();
        assert!(matches!(err, Error::Reasoner(ReasonerError::InvalidResponse { .. })));
    }

    #[tokio::test]
    async fn test_timeout() {
        let limit = Duration::from_millis(50);
        let step = ReasoningStep::new(Arc::new(Stalled)).timeout(Some(limit));
        let err = step.reason(&history(), &"7".into(), &[]).await.unwrap_err();
        assert!(matches!(err, Error::ReasoningTimeout(d) if d == limit));
    }
}
