use super::state::LedgerState;
use crate::domain::notification::CallbackRecord;
use crate::domain::order::{Order, OrderPatch};
use crate::domain::ports::LedgerStore;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Name of the snapshot file inside the data directory.
pub const SNAPSHOT_FILE: &str = "ledger.json";

/// The durable ledger store: the full state lives in memory for reads, and
/// every mutation rewrites one JSON snapshot on disk before the caller
/// observes success.
///
/// Mutations are staged on a clone of the state, persisted, and only then
/// swapped into the visible mirror, so a failed persist never leaves memory
/// and disk inconsistent.
///
/// Single-writer, single-process design: whole-snapshot rewrite is only
/// suitable for low write volume.
#[derive(Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    state: Arc<RwLock<LedgerState>>,
}

impl SnapshotStore {
    /// Opens the store rooted at `dir`, creating the directory if needed.
    ///
    /// A missing or unparseable snapshot is recovered silently by
    /// reinitializing (and persisting) an empty state. Failure to create
    /// the directory or to write the initial snapshot is fatal.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let path = dir.join(SNAPSHOT_FILE);
        let state = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(state) => state,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "snapshot unparseable, reinitializing");
                    let state = LedgerState::default();
                    Self::persist(&dir, &state)?;
                    state
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no snapshot found, starting empty");
                let state = LedgerState::default();
                Self::persist(&dir, &state)?;
                state
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            dir,
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Writes the full state to a temp file and renames it over the
    /// snapshot, so the on-disk file is always a complete document.
    fn persist(dir: &Path, state: &LedgerState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, dir.join(SNAPSHOT_FILE))?;
        Ok(())
    }

    /// Runs a mutation against a staged copy of the state, persists the
    /// copy, then swaps it into the visible mirror.
    async fn commit<T>(&self, mutate: impl FnOnce(&mut LedgerState) -> T) -> Result<T> {
        let mut guard = self.state.write().await;
        let mut staged = guard.clone();
        let out = mutate(&mut staged);
        Self::persist(&self.dir, &staged)?;
        *guard = staged;
        Ok(out)
    }
}

#[async_trait]
impl LedgerStore for SnapshotStore {
    async fn claim_notification(&self, key: &str, first_seen: DateTime<Utc>) -> Result<bool> {
        self.commit(|state| state.claim(key, first_seen)).await
    }

    async fn append_callback(&self, record: CallbackRecord) -> Result<()> {
        self.commit(|state| state.append_callback(record)).await
    }

    async fn upsert_order(&self, business_ref: &str, patch: OrderPatch) -> Result<Order> {
        self.commit(|state| state.upsert_order(business_ref, &patch, Utc::now()))
            .await
    }

    async fn mark_paid(&self, business_ref: &str, provider_ref: Option<&str>) -> Result<Order> {
        self.commit(|state| state.mark_paid(business_ref, provider_ref, Utc::now()))
            .await
    }

    async fn get_order(&self, business_ref: &str) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.order(business_ref).cloned())
    }

    async fn list_callbacks(&self, limit: usize) -> Result<Vec<CallbackRecord>> {
        let state = self.state.read().await;
        Ok(state.recent_callbacks(limit).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_creates_empty_snapshot() {
        let dir = tempdir().unwrap();
        let _store = SnapshotStore::open(dir.path()).unwrap();

        let bytes = fs::read(dir.path().join(SNAPSHOT_FILE)).unwrap();
        let state: LedgerState = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(state, LedgerState::default());
    }

    #[tokio::test]
    async fn test_reopen_restores_state() {
        let dir = tempdir().unwrap();

        {
            let store = SnapshotStore::open(dir.path()).unwrap();
            store.claim_notification("n-1", Utc::now()).await.unwrap();
            store
                .upsert_order("A1", OrderPatch::default())
                .await
                .unwrap();
            store.mark_paid("A1", Some("dy-1")).await.unwrap();
        }

        let store = SnapshotStore::open(dir.path()).unwrap();
        let order = store.get_order("A1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.provider_ref.as_deref(), Some("dy-1"));
        assert!(!store.claim_notification("n-1", Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_reinitializes() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(SNAPSHOT_FILE), b"{ not json").unwrap();

        let store = SnapshotStore::open(dir.path()).unwrap();
        assert!(store.get_order("A1").await.unwrap().is_none());

        // The reinitialized state was persisted immediately.
        let bytes = fs::read(dir.path().join(SNAPSHOT_FILE)).unwrap();
        let state: LedgerState = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(state, LedgerState::default());
    }

    #[tokio::test]
    async fn test_mutation_is_durable_before_ack() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();

        store
            .upsert_order("A1", OrderPatch::default())
            .await
            .unwrap();

        // The snapshot on disk already contains the order.
        let bytes = fs::read(dir.path().join(SNAPSHOT_FILE)).unwrap();
        let state: LedgerState = serde_json::from_slice(&bytes).unwrap();
        assert!(state.order("A1").is_some());
    }
}
