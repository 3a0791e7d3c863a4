//! The graph engine: step loop, checkpointing and the approval protocol.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, info, warn};

use super::router::{Route, route};
use crate::checkpoint::CheckpointStore;
use crate::config::{ConfigError, EngineConfig};
use crate::conversation::{ControlPosition, ConversationId, CustomerId, ExecutionState, NodeName};
use crate::observability::{EngineMetrics, Gauge, spans};
use crate::reasoning::{InstructionTemplate, Reasoner, ReasoningStep};
use crate::tools::{ToolExecutor, ToolRegistry};
use crate::types::{AssistantTurn, Message, ToolRequest, ToolResult};
use crate::{Error, Result};

/// Payload recorded for a denied sensitive request.
pub fn denial_message(reason: &str) -> String {
    format!(
        "API call denied by user. Reasoning: '{}'. Continue assisting, accounting for the user's input.",
        reason
    )
}

/// Payload recorded for the other requests of a turn whose sensitive request was denied.
pub fn skipped_message(denied_tool: &str) -> String {
    format!(
        "Not executed because the user denied the {} request in the same turn.",
        denied_tool
    )
}

/// External decision on a paused sensitive request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Deny { reason: String },
}

/// What a caller sees after an engine entry point returns.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnView {
    pub conversation_id: ConversationId,
    /// Last assistant turn produced during this call.
    pub reply: Option<AssistantTurn>,
    /// Sensitive request awaiting a decision, if execution paused.
    pub pending: Option<ToolRequest>,
    pub position: ControlPosition,
    /// Messages appended during this call, in log order.
    pub appended: Vec<Message>,
    pub version: u64,
}

impl TurnView {
    fn from_state(state: &ExecutionState, start: usize) -> Self {
        let appended = state.log.messages().get(start..).unwrap_or_default().to_vec();
        let reply = appended
            .iter()
            .rev()
            .find_map(Message::as_assistant)
            .cloned();
        Self {
            conversation_id: state.conversation_id.clone(),
            reply,
            pending: state.pending_approval().cloned(),
            position: state.position.clone(),
            appended,
            version: state.version,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.pending.is_some()
    }

    pub fn reply_text(&self) -> Option<&str> {
        self.reply.as_ref().and_then(|t| t.text.as_deref())
    }
}

struct ActiveTurn<'a>(&'a Gauge);

impl<'a> ActiveTurn<'a> {
    fn enter(gauge: &'a Gauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for ActiveTurn<'_> {
    fn drop(&mut self) {
        self.0.dec();
    }
}

/// Drives conversations through assistant, safe-tool and sensitive-tool nodes.
///
/// Every completed step is checkpointed. Execution suspends only right
/// before the sensitive node; [`GraphEngine::approve_pending`] and
/// [`GraphEngine::deny_pending`] continue from there. Calls for the same
/// conversation are serialized, calls for different conversations run in
/// parallel.
pub struct GraphEngine {
    store: Arc<dyn CheckpointStore>,
    registry: Arc<ToolRegistry>,
    reasoning: ReasoningStep,
    safe: ToolExecutor,
    sensitive: ToolExecutor,
    metrics: Arc<EngineMetrics>,
    max_steps: u32,
    default_customer: CustomerId,
    locks: DashMap<ConversationId, Arc<Mutex<()>>>,
}

impl GraphEngine {
    pub fn builder() -> GraphEngineBuilder {
        GraphEngineBuilder::default()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    fn lock_for(&self, id: &ConversationId) -> Arc<Mutex<()>> {
        self.locks.entry(id.clone()).or_default().clone()
    }

    /// Adds a user turn for the default customer and runs until halt or pause.
    ///
    /// See [`GraphEngine::submit_user_turn_as`] for how replayed turns and
    /// reused request ids are handled.
    pub async fn submit_user_turn(
        &self,
        conversation_id: &ConversationId,
        text: impl Into<String>,
    ) -> Result<TurnView> {
        let customer = self.default_customer.clone();
        self.submit_user_turn_as(conversation_id, &customer, text)
            .await
    }

    /// Adds a user turn and runs until halt or pause.
    ///
    /// The customer is fixed when the conversation is created; later values
    /// are ignored. Fails with [`Error::ApprovalPending`] while a sensitive
    /// request awaits a decision.
    ///
    /// If the reasoner answers with a turn id that is already logged, the
    /// replay is dropped and the conversation halts; the returned
    /// [`TurnView::reply`] is then `None`. A turn that reuses an already
    /// logged tool request id fails with [`Error::Log`] and is not stored.
    pub async fn submit_user_turn_as(
        &self,
        conversation_id: &ConversationId,
        customer: &CustomerId,
        text: impl Into<String>,
    ) -> Result<TurnView> {
        let text = text.into();
        let span = spans::turn_span(conversation_id, "submit");
        async {
            let lock = self.lock_for(conversation_id);
            let _guard = lock.lock().await;
            let _active = ActiveTurn::enter(&self.metrics.active_turns);

            let mut state = match self.store.load(conversation_id).await? {
                Some(state) => state,
                None => {
                    info!(customer_id = %customer, "Starting new conversation");
                    ExecutionState::new(conversation_id.clone(), customer.clone())
                }
            };

            match &state.position {
                ControlPosition::PausedBeforeSensitive(pending) => {
                    return Err(Error::ApprovalPending {
                        conversation_id: conversation_id.to_string(),
                        request_id: pending.id.clone(),
                    });
                }
                ControlPosition::Running(node) if *node != NodeName::Assistant => {
                    return Err(Error::InvalidState(format!(
                        "conversation was interrupted before {}; continue it first",
                        node
                    )));
                }
                ControlPosition::Running(_) | ControlPosition::Halted => {}
            }

            let start = state.log.len();
            state.log.append_user(text);
            state.position = ControlPosition::Running(NodeName::Assistant);
            self.drive(&mut state).await?;
            Ok(TurnView::from_state(&state, start))
        }
        .instrument(span)
        .await
    }

    /// Runs the paused sensitive request and continues the loop.
    pub async fn approve_pending(&self, conversation_id: &ConversationId) -> Result<TurnView> {
        self.resume(conversation_id, ApprovalDecision::Approve, None)
            .await
    }

    /// Records a denial carrying `reason` instead of running the paused request.
    pub async fn deny_pending(
        &self,
        conversation_id: &ConversationId,
        reason: impl Into<String>,
    ) -> Result<TurnView> {
        self.resume(
            conversation_id,
            ApprovalDecision::Deny {
                reason: reason.into(),
            },
            None,
        )
        .await
    }

    /// Applies `decision` to the paused request.
    ///
    /// When `expected_request_id` is given it must match the pending request,
    /// so a decision made on an outdated view is rejected.
    pub async fn resume(
        &self,
        conversation_id: &ConversationId,
        decision: ApprovalDecision,
        expected_request_id: Option<&str>,
    ) -> Result<TurnView> {
        let operation = match decision {
            ApprovalDecision::Approve => "approve",
            ApprovalDecision::Deny { .. } => "deny",
        };
        let span = spans::turn_span(conversation_id, operation);
        async {
            let lock = self.lock_for(conversation_id);
            let _guard = lock.lock().await;
            let _active = ActiveTurn::enter(&self.metrics.active_turns);

            let no_pending = || Error::NoPendingApproval {
                conversation_id: conversation_id.to_string(),
            };
            let mut state = self.store.load(conversation_id).await?.ok_or_else(no_pending)?;
            state.validate()?;
            let pending = state.pending_approval().cloned().ok_or_else(no_pending)?;
            if let Some(expected) = expected_request_id
                && expected != pending.id
            {
                return Err(Error::StaleApproval {
                    pending: pending.id,
                    supplied: expected.to_string(),
                });
            }

            let start = state.log.len();
            match decision {
                ApprovalDecision::Approve => {
                    state.position = ControlPosition::Running(NodeName::SensitiveTools);
                    // Claim the decision before the side effect; a competing
                    // writer on the same store fails here with a version conflict.
                    self.checkpoint(&mut state).await?;
                    self.metrics.approvals.inc();
                    info!(request_id = %pending.id, tool_name = %pending.name, "Sensitive request approved");
                }
                ApprovalDecision::Deny { reason } => {
                    self.substitute_denial(&mut state, &pending, &reason)?;
                    state.position = ControlPosition::Running(NodeName::Assistant);
                    self.checkpoint(&mut state).await?;
                    self.metrics.denials.inc();
                    info!(request_id = %pending.id, tool_name = %pending.name, "Sensitive request denied");
                }
            }

            self.drive(&mut state).await?;
            Ok(TurnView::from_state(&state, start))
        }
        .instrument(span)
        .await
    }

    /// Re-enters the step loop of a conversation whose last run stopped on an error.
    pub async fn continue_interrupted(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<TurnView> {
        let span = spans::turn_span(conversation_id, "continue");
        async {
            let lock = self.lock_for(conversation_id);
            let _guard = lock.lock().await;
            let _active = ActiveTurn::enter(&self.metrics.active_turns);

            let mut state = self.store.load(conversation_id).await?.ok_or_else(|| {
                Error::InvalidState(format!("conversation {} does not exist", conversation_id))
            })?;
            match &state.position {
                ControlPosition::Running(_) => {}
                ControlPosition::PausedBeforeSensitive(pending) => {
                    return Err(Error::ApprovalPending {
                        conversation_id: conversation_id.to_string(),
                        request_id: pending.id.clone(),
                    });
                }
                ControlPosition::Halted => {
                    return Err(Error::InvalidState(
                        "conversation is halted; submit a user turn".into(),
                    ));
                }
            }

            let start = state.log.len();
            self.drive(&mut state).await?;
            Ok(TurnView::from_state(&state, start))
        }
        .instrument(span)
        .await
    }

    pub async fn pending_approval(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<ToolRequest>> {
        Ok(self
            .store
            .load(conversation_id)
            .await?
            .and_then(|s| s.pending_approval().cloned()))
    }

    pub async fn snapshot(&self, conversation_id: &ConversationId) -> Result<Option<ExecutionState>> {
        Ok(self.store.load(conversation_id).await?)
    }

    /// Conversations that have waited on approval for longer than `idle`.
    pub async fn stale_pauses(&self, idle: Duration) -> Result<Vec<ConversationId>> {
        let idle = chrono::Duration::from_std(idle)
            .map_err(|e| Error::InvalidState(format!("idle duration out of range: {}", e)))?;
        Ok(self.store.list_paused_before(Utc::now() - idle).await?)
    }

    fn substitute_denial(
        &self,
        state: &mut ExecutionState,
        pending: &ToolRequest,
        reason: &str,
    ) -> Result<()> {
        let turn = state
            .log
            .last_assistant()
            .cloned()
            .ok_or_else(|| Error::InvalidState("paused without an assistant turn".into()))?;
        let results: Vec<ToolResult> = state
            .log
            .unanswered_requests(&turn)
            .into_iter()
            .map(|request| {
                if request.id == pending.id {
                    ToolResult::error(request, denial_message(reason))
                } else {
                    ToolResult::error(request, skipped_message(&pending.name))
                }
            })
            .collect();
        state.log.append_results(results)?;
        Ok(())
    }

    async fn checkpoint(&self, state: &mut ExecutionState) -> Result<()> {
        state.next_revision();
        self.store.save(state).await?;
        debug!(
            version = state.version,
            position = state.position.label(),
            messages = state.log.len(),
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Runs steps until the state halts or pauses, checkpointing after each one.
    ///
    /// A failing step leaves `state` partially updated in memory only; the
    /// store keeps the last completed step.
    async fn drive(&self, state: &mut ExecutionState) -> Result<()> {
        let mut step = 0;
        loop {
            let node = match &state.position {
                ControlPosition::Running(node) => *node,
                ControlPosition::PausedBeforeSensitive(_) | ControlPosition::Halted => {
                    tracing::Span::current().record("steps", step);
                    tracing::Span::current().record("outcome", state.position.label());
                    return Ok(());
                }
            };
            if step >= self.max_steps {
                warn!(limit = self.max_steps, "Step limit reached");
                return Err(Error::StepLimitExceeded {
                    limit: self.max_steps,
                });
            }
            step += 1;
            self.metrics.steps.inc();

            let next = self
                .run_node(node, state)
                .instrument(spans::step_span(node, step))
                .await?;
            state.position = next;
            self.checkpoint(state).await?;
        }
    }

    async fn run_node(&self, node: NodeName, state: &mut ExecutionState) -> Result<ControlPosition> {
        match node {
            NodeName::Assistant => {
                let specs = self.registry.specs();
                let turn = self
                    .reasoning
                    .reason(&state.log, &state.customer_id, &specs)
                    .await?;
                let decision = route(&turn, &self.registry)?;
                let next = decision.next_position(&turn);
                let turn_id = turn.id.clone();
                if !state.log.append(turn)? {
                    // The logged copy was already routed when it first arrived.
                    warn!(message_id = %turn_id, "Reasoner replayed an already logged turn; halting without a reply");
                    return Ok(ControlPosition::Halted);
                }
                if decision == Route::RouteSensitive {
                    self.metrics.pauses.inc();
                    info!("Paused before sensitive tool");
                }
                Ok(next)
            }
            NodeName::SafeTools => {
                self.run_tools(&self.safe, state).await?;
                Ok(ControlPosition::Running(NodeName::Assistant))
            }
            NodeName::SensitiveTools => {
                self.run_tools(&self.sensitive, state).await?;
                Ok(ControlPosition::Running(NodeName::Assistant))
            }
        }
    }

    async fn run_tools(&self, executor: &ToolExecutor, state: &mut ExecutionState) -> Result<()> {
        let turn = state
            .log
            .last_assistant()
            .cloned()
            .ok_or_else(|| Error::InvalidState("tool step without an assistant turn".into()))?;
        let requests: Vec<ToolRequest> = state
            .log
            .unanswered_requests(&turn)
            .into_iter()
            .cloned()
            .collect();
        let results = executor.execute(&requests).await;
        state.log.append_results(results)?;
        Ok(())
    }
}

impl std::fmt::Debug for GraphEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphEngine")
            .field("store", &self.store.name())
            .field("registry", &self.registry)
            .field("reasoning", &self.reasoning)
            .field("max_steps", &self.max_steps)
            .finish()
    }
}

#[derive(Default)]
pub struct GraphEngineBuilder {
    store: Option<Arc<dyn CheckpointStore>>,
    reasoner: Option<Arc<dyn Reasoner>>,
    registry: Option<Arc<ToolRegistry>>,
    template: Option<InstructionTemplate>,
    metrics: Option<Arc<EngineMetrics>>,
    config: EngineConfig,
}

impl GraphEngineBuilder {
    pub fn store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn reasoner(mut self, reasoner: Arc<dyn Reasoner>) -> Self {
        self.reasoner = Some(reasoner);
        self
    }

    pub fn registry(mut self, registry: impl Into<Arc<ToolRegistry>>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    pub fn template(mut self, template: InstructionTemplate) -> Self {
        self.template = Some(template);
        self
    }

    pub fn metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<GraphEngine> {
        let store = self.store.ok_or(ConfigError::Missing { what: "store" })?;
        let reasoner = self.reasoner.ok_or(ConfigError::Missing { what: "reasoner" })?;
        let registry = self.registry.ok_or(ConfigError::Missing { what: "registry" })?;
        let metrics = self.metrics.unwrap_or_default();
        let config = self.config;

        let reasoning = ReasoningStep::new(reasoner)
            .template(self.template.unwrap_or_default())
            .max_attempts(config.max_reasoning_attempts)
            .timeout(config.reasoning_timeout)
            .with_metrics(metrics.clone());

        Ok(GraphEngine {
            safe: ToolExecutor::safe(registry.clone()).with_metrics(metrics.clone()),
            sensitive: ToolExecutor::sensitive(registry.clone()).with_metrics(metrics.clone()),
            store,
            registry,
            reasoning,
            metrics,
            max_steps: config.max_steps_per_turn.max(1),
            default_customer: config.default_customer,
            locks: DashMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denial_message_embeds_reason() {
        let text = denial_message("changed my mind");
        assert!(text.contains("'changed my mind'"));
        assert!(text.starts_with("API call denied by user."));
    }

    #[test]
    fn test_builder_requires_collaborators() {
        let err = GraphEngine::builder().build().unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::Missing { what: "store" })
        ));
    }

    #[test]
    fn test_turn_view_reply_is_last_new_assistant_turn() {
        let mut state = ExecutionState::new("c1".into(), CustomerId::default());
        state.log.append_user("earlier");
        state.log.append(AssistantTurn::text("old", "old reply")).unwrap();
        let start = state.log.len();
        state.log.append_user("now");
        state.position = ControlPosition::Halted;

        let view = TurnView::from_state(&state, start);
        assert!(view.reply.is_none());
        assert_eq!(view.appended.len(), 1);

        state.log.append(AssistantTurn::text("new", "new reply")).unwrap();
        let view = TurnView::from_state(&state, start);
        assert_eq!(view.reply_text(), Some("new reply"));
        assert!(!view.is_paused());
    }
}
