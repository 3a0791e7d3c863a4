//! In-memory checkpoint store for tests and single-process deployments.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{CheckpointResult, CheckpointStore, check_version};
use crate::conversation::{ConversationId, ExecutionState};

#[derive(Debug, Default, Clone)]
pub struct MemoryCheckpointStore {
    states: Arc<RwLock<HashMap<ConversationId, ExecutionState>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn clear(&self) {
        self.states.write().await.clear();
    }
}

#[async_trait::async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn save(&self, state: &ExecutionState) -> CheckpointResult<()> {
        let mut states = self.states.write().await;
        let stored = states.get(&state.conversation_id).map(|s| s.version);
        check_version(&state.conversation_id, stored, state.version)?;
        states.insert(state.conversation_id.clone(), state.clone());
        Ok(())
    }

    async fn load(&self, id: &ConversationId) -> CheckpointResult<Option<ExecutionState>> {
        Ok(self.states.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &ConversationId) -> CheckpointResult<bool> {
        Ok(self.states.write().await.remove(id).is_some())
    }

    async fn list(&self) -> CheckpointResult<Vec<ConversationId>> {
        Ok(self.states.read().await.keys().cloned().collect())
    }
}
