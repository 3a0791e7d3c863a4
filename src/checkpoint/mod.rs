//! Durable storage of the latest [`ExecutionState`] per conversation.
//!
//! Backends only store and return states; every business rule lives in the
//! graph engine. Saves carry an optimistic version check so two writers that
//! raced past the engine's in-process lock cannot both commit.

#[cfg(feature = "jsonl")]
mod jsonl;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "jsonl")]
pub use jsonl::{JsonlCheckpointStore, JsonlConfig, JsonlConfigBuilder, SyncMode};
pub use memory::MemoryCheckpointStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresCheckpointStore;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::conversation::{ConversationId, ExecutionState};

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint not found: {id}")]
    NotFound { id: String },

    #[error(
        "Version conflict for {conversation_id}: stored version {stored}, incoming {incoming}"
    )]
    VersionConflict {
        conversation_id: String,
        stored: u64,
        incoming: u64,
    },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CheckpointResult<T> = std::result::Result<T, CheckpointError>;

/// Storage contract for checkpoints.
///
/// Implementations must give read-your-writes per conversation and must
/// reject a save whose `version` does not exceed the stored one.
#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    fn name(&self) -> &str;

    async fn save(&self, state: &ExecutionState) -> CheckpointResult<()>;

    async fn load(&self, id: &ConversationId) -> CheckpointResult<Option<ExecutionState>>;

    async fn delete(&self, id: &ConversationId) -> CheckpointResult<bool>;

    async fn list(&self) -> CheckpointResult<Vec<ConversationId>>;

    /// Conversations paused for approval whose last checkpoint predates `cutoff`.
    ///
    /// Abandoned pauses are inert; this lets a housekeeping job find and expire them.
    async fn list_paused_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> CheckpointResult<Vec<ConversationId>> {
        let mut stale = Vec::new();
        for id in self.list().await? {
            if let Some(state) = self.load(&id).await?
                && state.is_paused()
                && state.updated_at < cutoff
            {
                stale.push(id);
            }
        }
        Ok(stale)
    }
}

/// Shared version rule for every backend.
pub(crate) fn check_version(
    id: &ConversationId,
    stored: Option<u64>,
    incoming: u64,
) -> CheckpointResult<()> {
    match stored {
        Some(stored) if incoming <= stored => Err(CheckpointError::VersionConflict {
            conversation_id: id.to_string(),
            stored,
            incoming,
        }),
        _ => Ok(()),
    }
}

#[cfg(any(feature = "postgres", feature = "jsonl"))]
pub(crate) trait StorageResultExt<T> {
    fn storage_err(self) -> CheckpointResult<T>;
    fn storage_err_ctx(self, context: &str) -> CheckpointResult<T>;
}

#[cfg(any(feature = "postgres", feature = "jsonl"))]
impl<T, E: std::fmt::Display> StorageResultExt<T> for std::result::Result<T, E> {
    fn storage_err(self) -> CheckpointResult<T> {
        self.map_err(|e| CheckpointError::Storage {
            message: e.to_string(),
        })
    }

    fn storage_err_ctx(self, context: &str) -> CheckpointResult<T> {
        self.map_err(|e| CheckpointError::Storage {
            message: format!("{}: {}", context, e),
        })
    }
}
