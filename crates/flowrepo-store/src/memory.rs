//! Volatile flow store
//!
//! Used for local runs and as the store double in tests.

use crate::documents::Documents;
use async_trait::async_trait;
use chrono::Utc;
use flowrepo_core::{Flow, FlowId, FlowQuery, FlowStore, FlowsResponse, StoreError};
use parking_lot::RwLock;

/// Flow store kept entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryFlowStore {
    documents: RwLock<Documents>,
}

impl InMemoryFlowStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored flows
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Whether the store holds no flows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FlowStore for InMemoryFlowStore {
    async fn insert(&self, flow: Flow) -> Result<FlowId, StoreError> {
        self.documents.write().insert(flow, Utc::now())
    }

    async fn replace(&self, id: &FlowId, flow: Flow) -> Result<(), StoreError> {
        self.documents.write().replace(id, flow, Utc::now())
    }

    async fn delete(&self, id: &FlowId) -> Result<(), StoreError> {
        self.documents.write().delete(id).map(|_| ())
    }

    async fn find(&self, id: &FlowId) -> Result<Flow, StoreError> {
        self.documents.read().find(id)
    }

    async fn list(&self, query: &FlowQuery) -> Result<FlowsResponse, StoreError> {
        self.documents.read().list(query)
    }
}
