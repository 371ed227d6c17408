//! In-process catalog with a fixed operator table

use async_trait::async_trait;
use dashmap::DashMap;
use flowrepo_core::{CatalogError, Credential, OperatorCatalog, OperatorMetadata};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Catalog answering from an in-memory table
#[derive(Debug, Default)]
pub struct StaticOperatorCatalog {
    operators: DashMap<String, OperatorMetadata>,
    failing: AtomicBool,
    lookups: AtomicUsize,
}

impl StaticOperatorCatalog {
    /// Create an empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With an operator entry
    #[must_use]
    pub fn with_operator(self, operator_id: impl Into<String>, metadata: OperatorMetadata) -> Self {
        self.insert(operator_id, metadata);
        self
    }

    /// Add or replace an operator entry
    pub fn insert(&self, operator_id: impl Into<String>, metadata: OperatorMetadata) {
        self.operators.insert(operator_id.into(), metadata);
    }

    /// Make every lookup fail with a transport error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of lookups served so far, failed ones included
    #[must_use]
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OperatorCatalog for StaticOperatorCatalog {
    async fn get_operator_metadata(
        &self,
        operator_id: &str,
        _user_id: &str,
        _credential: &Credential,
    ) -> Result<OperatorMetadata, CatalogError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CatalogError::Transport("catalog offline".into()));
        }
        self.operators
            .get(operator_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CatalogError::NotFound(operator_id.to_string()))
    }
}
