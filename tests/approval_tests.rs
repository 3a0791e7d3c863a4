//! Approval protocol tests
//!
//! Pausing before sensitive tools, approve/deny handling and the errors
//! raised when a decision does not match the conversation's position.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{ScriptedReasoner, call, doubles_registry, engine, engine_with_config, reply};
use sales_agent::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use sales_agent::config::EngineConfig;
use sales_agent::graph::ApprovalDecision;
use sales_agent::types::{AssistantTurn, ToolRequest};
use sales_agent::{ControlPosition, ConversationId, Error, ErrorCategory, LogError, NodeName};
use serde_json::json;

fn order_call(turn_id: &str, request_id: &str) -> AssistantTurn {
    call(
        turn_id,
        request_id,
        "create_order",
        json!({"customer_id": "123456789", "items": [{"product_name": "AirPods Pro", "quantity": 1}]}),
    )
}

// ============================================================================
// Approve path
// ============================================================================

mod approve_tests {
    use super::*;

    #[tokio::test]
    async fn test_approve_runs_pending_request_once() {
        let doubles = doubles_registry();
        let store = Arc::new(MemoryCheckpointStore::new());
        let reasoner = ScriptedReasoner::new([
            order_call("a1", "call-order"),
            reply("a2", "Your order is placed."),
        ]);
        let engine = engine(store.clone(), reasoner, doubles.registry);
        let conversation = ConversationId::from("approve-once");

        let view = engine
            .submit_user_turn(&conversation, "Buy AirPods")
            .await
            .unwrap();
        assert!(view.is_paused());
        assert_eq!(doubles.create_order_calls.load(Ordering::SeqCst), 0);

        let pending = engine.pending_approval(&conversation).await.unwrap().unwrap();
        assert_eq!(pending.id, "call-order");

        let view = engine.approve_pending(&conversation).await.unwrap();
        assert_eq!(doubles.create_order_calls.load(Ordering::SeqCst), 1);
        assert_eq!(view.position, ControlPosition::Halted);
        assert_eq!(view.reply_text(), Some("Your order is placed."));

        let args = doubles.create_order_args.lock().unwrap().clone();
        assert_eq!(args[0]["items"][0]["product_name"], "AirPods Pro");

        let state = store.load(&conversation).await.unwrap().unwrap();
        let result = state.log.find_result("call-order").unwrap();
        assert_eq!(result.request_id, "call-order");
        assert!(!result.is_error());
        assert!(engine.pending_approval(&conversation).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resume_with_matching_request_id() {
        let doubles = doubles_registry();
        let store = Arc::new(MemoryCheckpointStore::new());
        let reasoner =
            ScriptedReasoner::new([order_call("a1", "call-order"), reply("a2", "Done.")]);
        let engine = engine(store, reasoner, doubles.registry);
        let conversation = ConversationId::from("approve-expected");

        engine.submit_user_turn(&conversation, "Buy").await.unwrap();
        let view = engine
            .resume(&conversation, ApprovalDecision::Approve, Some("call-order"))
            .await
            .unwrap();
        assert_eq!(view.position, ControlPosition::Halted);
        assert_eq!(doubles.create_order_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sensitive_tool_in_later_position_is_refused() {
        let doubles = doubles_registry();
        let store = Arc::new(MemoryCheckpointStore::new());
        let turn = AssistantTurn::new("a1")
            .with_request(ToolRequest::new("call-status", "check_order_status"))
            .with_request(ToolRequest::new("call-order", "create_order"));
        let reasoner = ScriptedReasoner::new([turn, reply("a2", "Checked your order.")]);
        let engine = engine(store.clone(), reasoner, doubles.registry);
        let conversation = ConversationId::from("first-request-routing");

        let view = engine
            .submit_user_turn(&conversation, "Status, then reorder")
            .await
            .unwrap();

        // Routed on the first request only, so the safe node answers both.
        assert_eq!(view.position, ControlPosition::Halted);
        assert_eq!(doubles.order_status_calls.load(Ordering::SeqCst), 1);
        assert_eq!(doubles.create_order_calls.load(Ordering::SeqCst), 0);

        let state = store.load(&conversation).await.unwrap().unwrap();
        let results: Vec<&str> = state
            .log
            .iter()
            .filter_map(|m| m.as_tool_result())
            .map(|r| r.request_id.as_str())
            .collect();
        assert_eq!(results, vec!["call-status", "call-order"]);
        assert!(state.log.find_result("call-order").unwrap().is_error());
    }
}

// ============================================================================
// Protocol errors
// ============================================================================

mod protocol_error_tests {
    use super::*;

    #[tokio::test]
    async fn test_no_pending_approval() {
        let doubles = doubles_registry();
        let store = Arc::new(MemoryCheckpointStore::new());
        let reasoner = ScriptedReasoner::new([reply("a1", "Hello!")]);
        let engine = engine(store.clone(), reasoner, doubles.registry);
        let conversation = ConversationId::from("nothing-pending");

        let err = engine.approve_pending(&conversation).await.unwrap_err();
        assert!(matches!(err, Error::NoPendingApproval { .. }));

        engine.submit_user_turn(&conversation, "hi").await.unwrap();
        let before = store.load(&conversation).await.unwrap().unwrap();
        let err = engine
            .deny_pending(&conversation, "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoPendingApproval { ref conversation_id } if conversation_id == "nothing-pending"));
        assert_eq!(store.load(&conversation).await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_stale_request_id_rejected() {
        let doubles = doubles_registry();
        let store = Arc::new(MemoryCheckpointStore::new());
        let reasoner = ScriptedReasoner::new([order_call("a1", "call-order")]);
        let engine = engine(store, reasoner, doubles.registry);
        let conversation = ConversationId::from("stale");

        engine.submit_user_turn(&conversation, "Buy").await.unwrap();
        let err = engine
            .resume(
                &conversation,
                ApprovalDecision::Deny {
                    reason: "no".into(),
                },
                Some("call-old"),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::StaleApproval { ref pending, ref supplied } if pending == "call-order" && supplied == "call-old"
        ));
        assert!(engine.pending_approval(&conversation).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_user_turn_while_paused_is_rejected() {
        let doubles = doubles_registry();
        let store = Arc::new(MemoryCheckpointStore::new());
        let reasoner = ScriptedReasoner::new([order_call("a1", "call-order")]);
        let engine = engine(store.clone(), reasoner.clone(), doubles.registry);
        let conversation = ConversationId::from("paused-submit");

        engine.submit_user_turn(&conversation, "Buy").await.unwrap();
        let err = engine
            .submit_user_turn(&conversation, "actually, wait")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ApprovalPending { ref request_id, .. } if request_id == "call-order"));
        assert_eq!(reasoner.calls(), 1);
        assert_eq!(store.load(&conversation).await.unwrap().unwrap().log.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_does_not_advance() {
        let doubles = doubles_registry();
        let store = Arc::new(MemoryCheckpointStore::new());
        let reasoner = ScriptedReasoner::new([
            reply("a1", "Hi!"),
            call("a2", "call-x", "launch_rocket", json!({})),
        ]);
        let engine = engine(store.clone(), reasoner, doubles.registry);
        let conversation = ConversationId::from("unknown-tool");

        engine.submit_user_turn(&conversation, "hi").await.unwrap();
        let before = store.load(&conversation).await.unwrap().unwrap();

        let err = engine
            .submit_user_turn(&conversation, "go")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTool { ref name } if name == "launch_rocket"));
        assert_eq!(store.load(&conversation).await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_reused_request_id_is_not_stored() {
        let doubles = doubles_registry();
        let store = Arc::new(MemoryCheckpointStore::new());
        let reasoner = ScriptedReasoner::new([
            order_call("a1", "call_0"),
            reply("a2", "Your order is placed."),
            order_call("a3", "call_0"),
        ]);
        let engine = engine(store.clone(), reasoner.clone(), doubles.registry);
        let conversation = ConversationId::from("reused-call-id");

        engine.submit_user_turn(&conversation, "Buy").await.unwrap();
        engine.approve_pending(&conversation).await.unwrap();
        let before = store.load(&conversation).await.unwrap().unwrap();

        let err = engine
            .submit_user_turn(&conversation, "Buy another")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Log(LogError::DuplicateToolRequest { ref request_id }) if request_id == "call_0"
        ));
        assert_eq!(err.category(), ErrorCategory::Reasoning);
        assert_eq!(store.load(&conversation).await.unwrap().unwrap(), before);
        assert_eq!(doubles.create_order_calls.load(Ordering::SeqCst), 1);

        // The conversation is still usable from its last checkpoint.
        reasoner.push(order_call("a4", "call_1"));
        reasoner.push(reply("a5", "Second order placed."));
        let view = engine
            .submit_user_turn(&conversation, "Buy another")
            .await
            .unwrap();
        assert_eq!(view.pending.unwrap().id, "call_1");
        let view = engine.approve_pending(&conversation).await.unwrap();
        assert_eq!(view.position, ControlPosition::Halted);
        assert_eq!(doubles.create_order_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_replayed_turn_halts_without_reply() {
        let doubles = doubles_registry();
        let store = Arc::new(MemoryCheckpointStore::new());
        let reasoner = ScriptedReasoner::new([reply("a1", "Hi!"), reply("a1", "Hi!")]);
        let engine = engine(store.clone(), reasoner, doubles.registry);
        let conversation = ConversationId::from("replayed-turn");

        let first = engine.submit_user_turn(&conversation, "hi").await.unwrap();
        assert_eq!(first.reply_text(), Some("Hi!"));

        let second = engine.submit_user_turn(&conversation, "hello?").await.unwrap();
        assert!(second.reply.is_none());
        assert_eq!(second.position, ControlPosition::Halted);
        assert_eq!(second.appended.len(), 1);

        let state = store.load(&conversation).await.unwrap().unwrap();
        assert_eq!(state.log.len(), 3);
        assert_eq!(state.version, first.version + 1);
    }

    #[tokio::test]
    async fn test_step_limit_stops_tool_loops() {
        let doubles = doubles_registry();
        let store = Arc::new(MemoryCheckpointStore::new());
        let reasoner = ScriptedReasoner::new((0..10).map(|i| {
            call(
                &format!("a{}", i),
                &format!("call-{}", i),
                "check_order_status",
                json!({"order_id": i}),
            )
        }));
        let config = EngineConfig::default().with_max_steps(4);
        let engine = engine_with_config(store.clone(), reasoner, doubles.registry, config);
        let conversation = ConversationId::from("looping");

        let err = engine
            .submit_user_turn(&conversation, "loop forever")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StepLimitExceeded { limit: 4 }));

        // Completed steps stay checkpointed and can be continued.
        let state = store.load(&conversation).await.unwrap().unwrap();
        assert_eq!(state.version, 4);
        assert_eq!(
            state.position,
            ControlPosition::Running(NodeName::Assistant)
        );
        let err = engine
            .continue_interrupted(&conversation)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StepLimitExceeded { .. }));
        let state = store.load(&conversation).await.unwrap().unwrap();
        assert_eq!(state.version, 8);
    }

    #[tokio::test]
    async fn test_continue_interrupted_rejects_halted() {
        let doubles = doubles_registry();
        let store = Arc::new(MemoryCheckpointStore::new());
        let reasoner = ScriptedReasoner::new([reply("a1", "Hi!")]);
        let engine = engine(store, reasoner, doubles.registry);
        let conversation = ConversationId::from("halted");

        engine.submit_user_turn(&conversation, "hi").await.unwrap();
        let err = engine
            .continue_interrupted(&conversation)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }
}
