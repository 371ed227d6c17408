//! Durable flow store backed by a JSON snapshot file
//!
//! Every mutation is applied to a copy of the index, written to a temporary
//! file and renamed over the snapshot before it becomes visible. A failed
//! write leaves both the file and the in-memory view unchanged.

use crate::documents::Documents;
use async_trait::async_trait;
use chrono::Utc;
use flowrepo_core::{Flow, FlowId, FlowQuery, FlowStore, FlowsResponse, StoreError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotOut<'a> {
    version: u32,
    flows: Vec<&'a Flow>,
}

#[derive(Deserialize)]
struct SnapshotIn {
    version: u32,
    #[serde(default)]
    flows: Vec<Flow>,
}

/// Flow store persisted to a single JSON file
#[derive(Debug)]
pub struct JsonFileFlowStore {
    path: PathBuf,
    documents: RwLock<Documents>,
    /// Serializes writers so snapshots land in mutation order
    write_lock: Mutex<()>,
}

impl JsonFileFlowStore {
    /// Open the snapshot at `path`, starting empty if it does not exist
    ///
    /// # Errors
    /// `StoreError::Unavailable` if the file cannot be read or parsed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let documents = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: SnapshotIn = serde_json::from_slice(&bytes)
                    .map_err(|e| unavailable(&path, e))?;
                if snapshot.version != SNAPSHOT_VERSION {
                    return Err(StoreError::Unavailable(format!(
                        "{}: unsupported snapshot version {}",
                        path.display(),
                        snapshot.version
                    )));
                }
                Documents::from_flows(snapshot.flows)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Documents::default(),
            Err(e) => return Err(unavailable(&path, e)),
        };

        tracing::debug!(path = %path.display(), flows = documents.len(), "opened flow snapshot");

        Ok(Self {
            path,
            documents: RwLock::new(documents),
            write_lock: Mutex::new(()),
        })
    }

    /// Snapshot location
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut Documents) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _writer = self.write_lock.lock().await;

        let mut next = self.documents.read().clone();
        let out = apply(&mut next)?;
        self.write_snapshot(&next).await?;
        *self.documents.write() = next;

        Ok(out)
    }

    async fn write_snapshot(&self, documents: &Documents) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&SnapshotOut {
            version: SNAPSHOT_VERSION,
            flows: documents.snapshot(),
        })
        .map_err(|e| unavailable(&self.path, e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| unavailable(parent, e))?;
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| unavailable(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| unavailable(&self.path, e))
    }
}

fn unavailable(path: &Path, err: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(format!("{}: {err}", path.display()))
}

#[async_trait]
impl FlowStore for JsonFileFlowStore {
    async fn insert(&self, flow: Flow) -> Result<FlowId, StoreError> {
        self.mutate(|docs| docs.insert(flow, Utc::now())).await
    }

    async fn replace(&self, id: &FlowId, flow: Flow) -> Result<(), StoreError> {
        self.mutate(|docs| docs.replace(id, flow, Utc::now())).await
    }

    async fn delete(&self, id: &FlowId) -> Result<(), StoreError> {
        self.mutate(|docs| docs.delete(id).map(|_| ())).await
    }

    async fn find(&self, id: &FlowId) -> Result<Flow, StoreError> {
        self.documents.read().find(id)
    }

    async fn list(&self, query: &FlowQuery) -> Result<FlowsResponse, StoreError> {
        self.documents.read().list(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flows.json");

        let id = {
            let store = JsonFileFlowStore::open(&path).await.unwrap();
            let mut flow = Flow::new("persisted");
            flow.user_id = "alice".into();
            store.insert(flow).await.unwrap()
        };

        let reopened = JsonFileFlowStore::open(&path).await.unwrap();
        let flow = reopened.find(&id).await.unwrap();
        assert_eq!(flow.name, "persisted");
        assert_eq!(flow.user_id, "alice");
    }

    #[tokio::test]
    async fn delete_is_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("flows.json");

        let store = JsonFileFlowStore::open(&path).await.unwrap();
        let keep = store.insert(Flow::new("keep")).await.unwrap();
        let removed = store.insert(Flow::new("removed")).await.unwrap();
        store.delete(&removed).await.unwrap();

        let reopened = JsonFileFlowStore::open(&path).await.unwrap();
        let all = reopened.list(&FlowQuery::default()).await.unwrap();
        assert_eq!(all.total, 1);
        assert_eq!(all.flows[0].id.as_ref(), Some(&keep));
    }

    #[tokio::test]
    async fn failed_mutation_leaves_state_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileFlowStore::open(dir.path().join("flows.json"))
            .await
            .unwrap();

        let missing = FlowId::new("missing");
        assert!(store.replace(&missing, Flow::new("x")).await.is_err());
        assert_eq!(store.list(&FlowQuery::default()).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flows.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let result = JsonFileFlowStore::open(&path).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
