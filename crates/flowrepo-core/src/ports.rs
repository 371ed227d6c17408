//! Collaborator interfaces
//!
//! The repository depends only on these traits. Implementations live in
//! `flowrepo-store`, `flowrepo-permissions` and `flowrepo-catalog`; tests
//! substitute in-memory doubles.

use crate::error::{AuthorityError, CatalogError, StoreError};
use crate::permissions::{Capability, Credential, PermissionRecord, ResourceClass, ResourcePermissions};
use crate::query::FlowQuery;
use crate::types::{Flow, FlowId, FlowsResponse, OperatorMetadata};
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Document persistence for flows, without authorization
#[async_trait]
pub trait FlowStore: Send + Sync {
    /// Persist a new flow, assigning its id and both timestamps
    async fn insert(&self, flow: Flow) -> Result<FlowId, StoreError>;

    /// Replace the document `id`, refreshing `dateUpdated`
    ///
    /// The stored id, owner and creation time are preserved.
    async fn replace(&self, id: &FlowId, flow: Flow) -> Result<(), StoreError>;

    /// Remove the document `id`
    async fn delete(&self, id: &FlowId) -> Result<(), StoreError>;

    /// Fetch the document `id`
    async fn find(&self, id: &FlowId) -> Result<Flow, StoreError>;

    /// One page of matching flows plus the unpaginated match count
    async fn list(&self, query: &FlowQuery) -> Result<FlowsResponse, StoreError>;
}

/// Client of the external permission authority
#[async_trait]
pub trait PermissionGateway: Send + Sync {
    /// Declare a resource class and its default role grants (idempotent)
    async fn register_resource_class(&self, class: &ResourceClass) -> Result<(), AuthorityError>;

    /// Upsert the full grant table of one resource
    async fn set_permissions(
        &self,
        credential: &Credential,
        class_id: &str,
        resource_id: &str,
        permissions: &ResourcePermissions,
    ) -> Result<(), AuthorityError>;

    /// Whether the credential holds `capability` on the resource
    async fn check_capability(
        &self,
        credential: &Credential,
        class_id: &str,
        resource_id: &str,
        capability: Capability,
    ) -> Result<bool, AuthorityError>;

    /// Whether the credential holds `capability` on every resource of the
    /// class through the class default role grants
    async fn check_class_capability(
        &self,
        credential: &Credential,
        class_id: &str,
        capability: Capability,
    ) -> Result<bool, AuthorityError>;

    /// Ids of resources the credential holds at least `capability` on
    async fn list_accessible_resource_ids(
        &self,
        credential: &Credential,
        class_id: &str,
        capability: Capability,
    ) -> Result<BTreeSet<String>, AuthorityError>;

    /// Every record of the class visible to an administrator
    async fn list_resources_with_admin_capability(
        &self,
        credential: &Credential,
        class_id: &str,
    ) -> Result<Vec<PermissionRecord>, AuthorityError>;

    /// Delete the record of one resource; absence is not an error
    async fn remove_resource(
        &self,
        credential: &Credential,
        class_id: &str,
        resource_id: &str,
    ) -> Result<(), AuthorityError>;
}

/// Lookup into the external operator catalog
#[async_trait]
pub trait OperatorCatalog: Send + Sync {
    /// Current metadata of `operator_id`, fetched on behalf of the caller
    async fn get_operator_metadata(
        &self,
        operator_id: &str,
        user_id: &str,
        credential: &Credential,
    ) -> Result<OperatorMetadata, CatalogError>;
}
