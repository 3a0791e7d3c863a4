//! Append-only JSON Lines checkpoint store.
//!
//! Each conversation gets one `.jsonl` file; every save appends a line and
//! the last well-formed line is the current checkpoint.
//!
//! ```text
//! {base_dir}/
//! ├── {encoded-conversation-id}.jsonl
//! └── ...
//! ```

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{CheckpointResult, CheckpointStore, StorageResultExt, check_version};
use crate::conversation::{ConversationId, ExecutionState};

const FILE_EXTENSION: &str = "jsonl";

/// Sync mode for file operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// No explicit sync (OS buffering only).
    #[default]
    None,
    /// fsync after every checkpoint.
    OnWrite,
}

#[derive(Clone, Debug)]
pub struct JsonlConfig {
    pub base_dir: PathBuf,
    pub sync_mode: SyncMode,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        let base_dir = directories::ProjectDirs::from("", "", "sales-agent")
            .map(|dirs| dirs.data_dir().join("checkpoints"))
            .unwrap_or_else(|| PathBuf::from(".sales-agent").join("checkpoints"));
        Self {
            base_dir,
            sync_mode: SyncMode::default(),
        }
    }
}

impl JsonlConfig {
    pub fn builder() -> JsonlConfigBuilder {
        JsonlConfigBuilder::default()
    }

    fn path_for(&self, id: &ConversationId) -> PathBuf {
        self.base_dir
            .join(format!("{}.{}", encode_file_stem(id.as_str()), FILE_EXTENSION))
    }
}

#[derive(Default)]
pub struct JsonlConfigBuilder {
    base_dir: Option<PathBuf>,
    sync_mode: Option<SyncMode>,
}

impl JsonlConfigBuilder {
    pub fn base_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(path.into());
        self
    }

    pub fn sync_mode(mut self, mode: SyncMode) -> Self {
        self.sync_mode = Some(mode);
        self
    }

    pub fn build(self) -> JsonlConfig {
        let defaults = JsonlConfig::default();
        JsonlConfig {
            base_dir: self.base_dir.unwrap_or(defaults.base_dir),
            sync_mode: self.sync_mode.unwrap_or(defaults.sync_mode),
        }
    }
}

/// Conversation ids are opaque, so anything outside `[A-Za-z0-9_-]` is
/// percent-escaped to keep file names portable and collision free.
fn encode_file_stem(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointLine {
    saved_at: DateTime<Utc>,
    state: ExecutionState,
}

// ============================================================================
// File Operations (blocking, run via spawn_blocking)
// ============================================================================

fn read_latest_sync(path: &Path) -> CheckpointResult<Option<ExecutionState>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = std::fs::File::open(path)
        .storage_err_ctx(&format!("Failed to open {}", path.display()))?;
    let reader = BufReader::with_capacity(64 * 1024, file);
    let mut latest = None;

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.storage_err_ctx(&format!("Read error at line {}", line_num + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<CheckpointLine>(&line) {
            Ok(entry) => latest = Some(entry.state),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    line = line_num + 1,
                    error = %e,
                    "Skipping malformed checkpoint line"
                );
            }
        }
    }

    Ok(latest)
}

fn append_line_sync(path: &Path, line: &CheckpointLine, sync: bool) -> CheckpointResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .storage_err_ctx(&format!("Failed to create directory {}", parent.display()))?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .storage_err_ctx(&format!("Failed to open {} for writing", path.display()))?;

    let mut writer = std::io::BufWriter::new(file);
    serde_json::to_writer(&mut writer, line)?;
    writeln!(writer).storage_err_ctx("Write failed")?;
    writer.flush().storage_err_ctx("Flush failed")?;

    if sync {
        writer
            .into_inner()
            .map_err(|e| e.into_error())
            .storage_err_ctx("Buffer error")?
            .sync_all()
            .storage_err_ctx("Sync failed")?;
    }

    Ok(())
}

fn scan_dir_sync(dir: &Path) -> CheckpointResult<HashMap<ConversationId, (PathBuf, u64)>> {
    let mut index = HashMap::new();
    if !dir.exists() {
        return Ok(index);
    }

    let entries = std::fs::read_dir(dir)
        .storage_err_ctx(&format!("Failed to read {}", dir.display()))?;
    for entry in entries {
        let path = entry.storage_err()?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
            continue;
        }
        if let Some(state) = read_latest_sync(&path)? {
            index.insert(state.conversation_id.clone(), (path, state.version));
        }
    }
    Ok(index)
}

// ============================================================================
// Store
// ============================================================================

pub struct JsonlCheckpointStore {
    config: JsonlConfig,
    /// Conversation id to file path and latest stored version.
    index: Arc<RwLock<HashMap<ConversationId, (PathBuf, u64)>>>,
}

impl JsonlCheckpointStore {
    /// Opens the store, creating the directory and indexing existing files.
    pub async fn open(config: JsonlConfig) -> CheckpointResult<Self> {
        tokio::fs::create_dir_all(&config.base_dir)
            .await
            .storage_err_ctx("Failed to create checkpoint directory")?;

        let dir = config.base_dir.clone();
        let index = tokio::task::spawn_blocking(move || scan_dir_sync(&dir))
            .await
            .storage_err_ctx("Task join error")??;

        tracing::debug!(
            dir = %config.base_dir.display(),
            conversations = index.len(),
            "Opened JSONL checkpoint store"
        );

        Ok(Self {
            config,
            index: Arc::new(RwLock::new(index)),
        })
    }

    pub async fn default_location() -> CheckpointResult<Self> {
        Self::open(JsonlConfig::default()).await
    }

    pub fn base_dir(&self) -> &Path {
        &self.config.base_dir
    }
}

#[async_trait::async_trait]
impl CheckpointStore for JsonlCheckpointStore {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn save(&self, state: &ExecutionState) -> CheckpointResult<()> {
        // Held across the write so version check and append are atomic per store.
        let mut index = self.index.write().await;
        let stored = index.get(&state.conversation_id).map(|(_, v)| *v);
        check_version(&state.conversation_id, stored, state.version)?;

        let path = self.config.path_for(&state.conversation_id);
        let line = CheckpointLine {
            saved_at: Utc::now(),
            state: state.clone(),
        };
        let sync = self.config.sync_mode == SyncMode::OnWrite;
        let write_path = path.clone();
        tokio::task::spawn_blocking(move || append_line_sync(&write_path, &line, sync))
            .await
            .storage_err_ctx("Task join error")??;

        index.insert(state.conversation_id.clone(), (path, state.version));
        Ok(())
    }

    async fn load(&self, id: &ConversationId) -> CheckpointResult<Option<ExecutionState>> {
        let path = {
            let index = self.index.read().await;
            match index.get(id) {
                Some((path, _)) => path.clone(),
                None => return Ok(None),
            }
        };

        tokio::task::spawn_blocking(move || read_latest_sync(&path))
            .await
            .storage_err_ctx("Task join error")?
    }

    async fn delete(&self, id: &ConversationId) -> CheckpointResult<bool> {
        let Some((path, _)) = self.index.write().await.remove(id) else {
            return Ok(false);
        };

        if path.exists() {
            tokio::fs::remove_file(&path)
                .await
                .storage_err_ctx(&format!("Failed to delete {}", path.display()))?;
        }
        Ok(true)
    }

    async fn list(&self) -> CheckpointResult<Vec<ConversationId>> {
        Ok(self.index.read().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointError;
    use crate::conversation::CustomerId;
    use crate::types::AssistantTurn;
    use tempfile::TempDir;

    async fn create_test_store() -> (JsonlCheckpointStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = JsonlConfig::builder()
            .base_dir(temp_dir.path().to_path_buf())
            .build();
        let store = JsonlCheckpointStore::open(config).await.unwrap();
        (store, temp_dir)
    }

    fn state(id: &str, version: u64) -> ExecutionState {
        let mut state = ExecutionState::new(id.into(), CustomerId::default());
        state.version = version;
        state
    }

    #[test]
    fn test_encode_file_stem() {
        assert_eq!(encode_file_stem("abc-123_x"), "abc-123_x");
        assert_eq!(encode_file_stem("a/b"), "a%2Fb");
        assert_eq!(encode_file_stem("../x"), "%2E%2E%2Fx");
    }

    #[tokio::test]
    async fn test_latest_line_wins() {
        let (store, _temp) = create_test_store().await;
        let mut s = state("thread-1", 1);
        s.log.append_user("hi");
        store.save(&s).await.unwrap();

        s.log.append(AssistantTurn::text("m1", "hello")).unwrap();
        s.next_revision();
        store.save(&s).await.unwrap();

        let loaded = store.load(&"thread-1".into()).await.unwrap().unwrap();
        assert_eq!(loaded, s);
        assert_eq!(loaded.log.len(), 2);
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let (store, _temp) = create_test_store().await;
        store.save(&state("c1", 1)).await.unwrap();

        let first = store.load(&"c1".into()).await.unwrap();
        let second = store.load(&"c1".into()).await.unwrap();
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_reopen_rebuilds_index() {
        let temp_dir = TempDir::new().unwrap();
        let config = JsonlConfig::builder()
            .base_dir(temp_dir.path().to_path_buf())
            .sync_mode(SyncMode::OnWrite)
            .build();

        let store = JsonlCheckpointStore::open(config.clone()).await.unwrap();
        store.save(&state("c/1", 1)).await.unwrap();
        store.save(&state("c/1", 2)).await.unwrap();
        drop(store);

        let reopened = JsonlCheckpointStore::open(config).await.unwrap();
        assert_eq!(reopened.list().await.unwrap(), vec![ConversationId::from("c/1")]);
        let err = reopened.save(&state("c/1", 2)).await.unwrap_err();
        assert!(matches!(err, CheckpointError::VersionConflict { stored: 2, .. }));
    }

    #[tokio::test]
    async fn test_malformed_line_is_skipped() {
        let (store, temp) = create_test_store().await;
        store.save(&state("c1", 1)).await.unwrap();

        let path = temp.path().join("c1.jsonl");
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();

        let loaded = store.load(&"c1".into()).await.unwrap().unwrap();
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, temp) = create_test_store().await;
        store.save(&state("c1", 1)).await.unwrap();
        assert!(temp.path().join("c1.jsonl").exists());

        assert!(store.delete(&"c1".into()).await.unwrap());
        assert!(!temp.path().join("c1.jsonl").exists());
        assert!(store.load(&"c1".into()).await.unwrap().is_none());
        assert!(!store.delete(&"c1".into()).await.unwrap());
    }
}
