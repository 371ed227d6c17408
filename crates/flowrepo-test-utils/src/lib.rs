//! Testing utilities for the flow repository workspace
//!
//! Shared fixtures and a harness wiring the repository to in-memory doubles.

#![allow(missing_docs)]

use flowrepo_catalog::StaticOperatorCatalog;
use flowrepo_core::{
    Caller, Cell, Credential, Flow, OperatorMetadata, RepoError, ADMIN_ROLE,
};
use flowrepo_permissions::{InMemoryAuthority, Principal};
use flowrepo_service::{
    bootstrap, AccessControlledRepository, ReconciliationReport, Reconciler, ServiceInfo,
};
use flowrepo_store::InMemoryFlowStore;
use std::sync::Arc;

/// Users registered by [`Harness::new`]
pub const USERS: [&str; 3] = ["alice", "bob", "carol"];

/// Administrator registered by [`Harness::new`]
pub const ADMIN: &str = "root";

/// Operator id the default catalog knows
pub const FILTER_OPERATOR: &str = "op1";

pub fn token_for(user: &str) -> String {
    format!("token-{user}")
}

/// Caller presenting the harness token of `user`
pub fn caller(user: &str) -> Caller {
    Caller::new(user, Credential::bearer(token_for(user)))
}

pub fn admin() -> Caller {
    caller(ADMIN)
}

pub fn filter_metadata() -> OperatorMetadata {
    OperatorMetadata {
        name: "Filter".to_string(),
        image: "registry/filter:1.0".to_string(),
        deployment_type: "cloud".to_string(),
        cost: Some(5),
    }
}

/// Flow with one operator cell carrying client-supplied metadata
pub fn flow_with_operator(name: &str, operator_id: &str) -> Flow {
    let mut cell = Cell::operator("cell-1", operator_id);
    cell.name = Some("client supplied".to_string());
    cell.cost = Some(1000);
    Flow::new(name).with_cell(cell)
}

/// Repository collaborators held in memory
#[derive(Debug, Clone)]
pub struct Harness {
    pub store: Arc<InMemoryFlowStore>,
    pub authority: Arc<InMemoryAuthority>,
    pub catalog: Arc<StaticOperatorCatalog>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    /// Empty store, authority knowing [`USERS`] and [`ADMIN`], catalog
    /// knowing [`FILTER_OPERATOR`]
    pub fn new() -> Self {
        let authority = InMemoryAuthority::new();
        for user in USERS {
            authority.register_principal(token_for(user), Principal::user(user));
        }
        authority.register_principal(token_for(ADMIN), Principal::user(ADMIN).with_role(ADMIN_ROLE));

        Self {
            store: Arc::new(InMemoryFlowStore::new()),
            authority: Arc::new(authority),
            catalog: Arc::new(
                StaticOperatorCatalog::new().with_operator(FILTER_OPERATOR, filter_metadata()),
            ),
        }
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.store.clone(), self.authority.clone())
    }

    /// Reconcile once and return the ready repository
    pub async fn repository(&self) -> Result<(AccessControlledRepository, ReconciliationReport), RepoError> {
        bootstrap(
            self.store.clone(),
            self.authority.clone(),
            self.catalog.clone(),
            ServiceInfo::new("flowrepo", "test"),
        )
        .await
    }
}
