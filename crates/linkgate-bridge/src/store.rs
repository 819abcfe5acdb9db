//! Poll state persistence.
//!
//! The bridge itself never keeps state between calls. A host that drives
//! polling through [`EventBridge`](crate::EventBridge) hands it a
//! [`PollStateStore`]; the bridge loads the last committed checkpoint before
//! each poll and commits the returned one only after the poll succeeds.
//!
//! Two stores ship with the crate:
//!
//! - [`MemoryPollStateStore`] keeps checkpoints in a [`DashMap`].
//! - [`JsonFilePollStateStore`] keeps them in a single JSON document on disk,
//!   rewritten atomically (write to a temp file, then rename).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::error::{BridgeError, Result};
use crate::event::PollState;

/// Durable home for per-callback poll checkpoints.
#[async_trait]
pub trait PollStateStore: Send + Sync {
    /// Last committed state for `callback_id`, or the default state when
    /// nothing has been committed yet.
    async fn load(&self, callback_id: &str) -> Result<PollState>;

    /// Replace the committed state for `callback_id`.
    async fn commit(&self, callback_id: &str, state: PollState) -> Result<()>;

    /// Forget `callback_id` entirely. The next poll starts from scratch.
    async fn clear(&self, callback_id: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Process-local store. Cheap to clone; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryPollStateStore {
    inner: Arc<DashMap<String, PollState>>,
}

impl MemoryPollStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl PollStateStore for MemoryPollStateStore {
    async fn load(&self, callback_id: &str) -> Result<PollState> {
        Ok(self
            .inner
            .get(callback_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn commit(&self, callback_id: &str, state: PollState) -> Result<()> {
        self.inner.insert(callback_id.to_string(), state);
        Ok(())
    }

    async fn clear(&self, callback_id: &str) -> Result<()> {
        self.inner.remove(callback_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// Store backed by one JSON object on disk, keyed by callback id.
///
/// A missing file reads as an empty store. Writes go through a mutex so
/// concurrent commits from one process never interleave.
#[derive(Debug)]
pub struct JsonFilePollStateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFilePollStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<HashMap<String, PollState>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(HashMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| BridgeError::Store {
                reason: format!("corrupt state file {}: {e}", self.path.display()),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, states: &HashMap<String, PollState>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(states)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl PollStateStore for JsonFilePollStateStore {
    async fn load(&self, callback_id: &str) -> Result<PollState> {
        let _guard = self.lock.lock().await;
        let mut states = self.read_all().await?;
        Ok(states.remove(callback_id).unwrap_or_default())
    }

    async fn commit(&self, callback_id: &str, state: PollState) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut states = self.read_all().await?;
        states.insert(callback_id.to_string(), state);
        self.write_all(&states).await?;
        tracing::debug!(callback_id, path = %self.path.display(), "poll state committed");
        Ok(())
    }

    async fn clear(&self, callback_id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut states = self.read_all().await?;
        if states.remove(callback_id).is_some() {
            self.write_all(&states).await?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_defaults_then_commits() {
        let store = MemoryPollStateStore::new();
        assert!(store.load("cb").await.unwrap().is_initial());

        store
            .commit("cb", PollState::new().with("since", "t1"))
            .await
            .unwrap();
        assert_eq!(store.load("cb").await.unwrap().get_str("since"), Some("t1"));
        assert_eq!(store.len(), 1);

        store.clear("cb").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("poll-state.json");

        let store = JsonFilePollStateStore::new(&path);
        assert!(store.load("cb").await.unwrap().is_initial());
        store
            .commit("cb", PollState::new().with("since", "t1"))
            .await
            .unwrap();
        store
            .commit("other", PollState::new().with("page", 2))
            .await
            .unwrap();

        let reopened = JsonFilePollStateStore::new(&path);
        assert_eq!(
            reopened.load("cb").await.unwrap().get_str("since"),
            Some("t1")
        );
        reopened.clear("cb").await.unwrap();
        assert!(reopened.load("cb").await.unwrap().is_initial());
        assert!(!reopened.load("other").await.unwrap().is_initial());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poll-state.json");
        std::fs::write(&path, "not json").unwrap();

        let err = JsonFilePollStateStore::new(&path)
            .load("cb")
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Store { .. }));
    }
}
