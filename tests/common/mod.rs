//! Shared test doubles for the integration suites.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sales_agent::checkpoint::{CheckpointResult, CheckpointStore};
use sales_agent::conversation::{ConversationId, ExecutionState};
use sales_agent::config::EngineConfig;
use sales_agent::reasoning::{Reasoner, ReasonerError, ReasoningRequest};
use sales_agent::tools::{Tool, ToolRegistry};
use sales_agent::types::{AssistantTurn, ToolClass, ToolError, ToolRequest};
use sales_agent::GraphEngine;
use serde_json::{Value, json};
use tokio::sync::Barrier;

/// Replays a fixed list of assistant turns and records every request it sees.
#[derive(Default)]
pub struct ScriptedReasoner {
    script: Mutex<VecDeque<AssistantTurn>>,
    seen: Mutex<Vec<ReasoningRequest>>,
}

impl ScriptedReasoner {
    pub fn new(turns: impl IntoIterator<Item = AssistantTurn>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(turns.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, turn: AssistantTurn) {
        self.script.lock().unwrap().push_back(turn);
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ReasoningRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn reason(&self, request: &ReasoningRequest) -> Result<AssistantTurn, ReasonerError> {
        self.seen.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ReasonerError::invalid_response("script exhausted"))
    }
}

/// Tool double that counts invocations and remembers their arguments.
pub struct CountingTool {
    name: &'static str,
    class: ToolClass,
    calls: Arc<AtomicUsize>,
    args: Arc<Mutex<Vec<Value>>>,
    fail_with: Option<String>,
}

impl CountingTool {
    pub fn new(name: &'static str, class: ToolClass) -> Self {
        Self {
            name,
            class,
            calls: Arc::new(AtomicUsize::new(0)),
            args: Arc::new(Mutex::new(Vec::new())),
            fail_with: None,
        }
    }

    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn recorded_args(&self) -> Arc<Mutex<Vec<Value>>> {
        self.args.clone()
    }
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "counting test double"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn class(&self) -> ToolClass {
        self.class
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.args.lock().unwrap().push(args);
        if let Some(message) = &self.fail_with {
            return Err(ToolError::execution_failed(message.clone()));
        }
        Ok(json!({"tool": self.name, "call": n}))
    }
}

/// Handles onto the doubles registered by [`doubles_registry`].
pub struct Doubles {
    pub registry: ToolRegistry,
    pub order_status_calls: Arc<AtomicUsize>,
    pub create_order_calls: Arc<AtomicUsize>,
    pub create_order_args: Arc<Mutex<Vec<Value>>>,
}

/// `check_order_status` (safe) and `create_order` (sensitive) counting doubles.
pub fn doubles_registry() -> Doubles {
    let status = CountingTool::new("check_order_status", ToolClass::Safe);
    let order = CountingTool::new("create_order", ToolClass::Sensitive);
    let order_status_calls = status.counter();
    let create_order_calls = order.counter();
    let create_order_args = order.recorded_args();
    Doubles {
        registry: ToolRegistry::builder()
            .tool(status)
            .tool(order)
            .build()
            .unwrap(),
        order_status_calls,
        create_order_calls,
        create_order_args,
    }
}

pub fn engine(
    store: Arc<dyn CheckpointStore>,
    reasoner: Arc<ScriptedReasoner>,
    registry: ToolRegistry,
) -> GraphEngine {
    engine_with_config(store, reasoner, registry, EngineConfig::default())
}

pub fn engine_with_config(
    store: Arc<dyn CheckpointStore>,
    reasoner: Arc<ScriptedReasoner>,
    registry: ToolRegistry,
    config: EngineConfig,
) -> GraphEngine {
    GraphEngine::builder()
        .store(store)
        .reasoner(reasoner)
        .registry(registry)
        .config(config)
        .build()
        .unwrap()
}

pub fn reply(id: &str, text: &str) -> AssistantTurn {
    AssistantTurn::text(id, text)
}

pub fn call(turn_id: &str, request_id: &str, tool: &str, args: Value) -> AssistantTurn {
    AssistantTurn::new(turn_id).with_request(ToolRequest::new(request_id, tool).with_args(args))
}

pub fn empty(turn_id: &str) -> AssistantTurn {
    AssistantTurn::new(turn_id)
}

/// Store wrapper that, once armed, holds every load at a shared barrier.
///
/// Two engines given rendezvous wrappers over one store both read the same
/// version before either of them writes.
pub struct RendezvousStore {
    inner: Arc<dyn CheckpointStore>,
    barrier: Arc<Barrier>,
    armed: Arc<AtomicBool>,
}

impl RendezvousStore {
    pub fn pair(inner: Arc<dyn CheckpointStore>) -> (Arc<Self>, Arc<Self>, Arc<AtomicBool>) {
        let barrier = Arc::new(Barrier::new(2));
        let armed = Arc::new(AtomicBool::new(false));
        let make = || {
            Arc::new(Self {
                inner: inner.clone(),
                barrier: barrier.clone(),
                armed: armed.clone(),
            })
        };
        (make(), make(), armed.clone())
    }
}

#[async_trait]
impl CheckpointStore for RendezvousStore {
    fn name(&self) -> &str {
        "rendezvous"
    }

    async fn save(&self, state: &ExecutionState) -> CheckpointResult<()> {
        self.inner.save(state).await
    }

    async fn load(&self, id: &ConversationId) -> CheckpointResult<Option<ExecutionState>> {
        let loaded = self.inner.load(id).await?;
        if self.armed.load(Ordering::SeqCst) {
            self.barrier.wait().await;
            self.armed.store(false, Ordering::SeqCst);
        }
        Ok(loaded)
    }

    async fn delete(&self, id: &ConversationId) -> CheckpointResult<bool> {
        self.inner.delete(id).await
    }

    async fn list(&self) -> CheckpointResult<Vec<ConversationId>> {
        self.inner.list().await
    }
}
