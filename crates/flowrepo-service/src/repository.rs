//! Access-controlled flow repository
//!
//! Every operation authorizes independently against the permission
//! authority:
//! - create: any caller; the caller becomes owner and receives full rights
//! - update: `write` on the flow
//! - delete: `administrate` on the flow
//! - get: `read` on the flow, failing closed
//! - list: flows the caller owns or may `read`; class administrators see all
//!
//! Store and authority writes are two independent steps. A failure between
//! them leaves drift that [`Reconciler`](crate::Reconciler) repairs.

use crate::enrichment::enrich_operator_cells;
use crate::info::{InfoReport, ServiceInfo};
use flowrepo_core::{
    Caller, Capability, Credential, Flow, FlowId, FlowQuery, FlowStore, FlowsResponse, ListArgs,
    OperatorCatalog, PermissionGateway, RepoError, ResourcePermissions, FLOW_RESOURCE_CLASS,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Authorization-enforcing facade over the flow store
#[derive(Clone)]
pub struct AccessControlledRepository {
    store: Arc<dyn FlowStore>,
    gateway: Arc<dyn PermissionGateway>,
    catalog: Arc<dyn OperatorCatalog>,
    info: ServiceInfo,
}

impl std::fmt::Debug for AccessControlledRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessControlledRepository")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl AccessControlledRepository {
    /// Wire a repository to its collaborators
    ///
    /// Does not reconcile. Use [`bootstrap`](crate::bootstrap) to obtain a
    /// repository that is ready for traffic.
    #[must_use]
    pub fn new(
        store: Arc<dyn FlowStore>,
        gateway: Arc<dyn PermissionGateway>,
        catalog: Arc<dyn OperatorCatalog>,
        info: ServiceInfo,
    ) -> Self {
        Self {
            store,
            gateway,
            catalog,
            info,
        }
    }

    /// Store a new flow owned by the caller
    ///
    /// Operator cells are enriched first; nothing is stored if that fails.
    /// The owner grant is written after the insert with the internal
    /// credential. If that write fails the error is returned and the flow
    /// remains stored without a record until the next reconciliation.
    ///
    /// # Errors
    /// `EnrichmentFailed`, store errors, or authority errors of the owner grant.
    pub async fn create_flow(&self, mut flow: Flow, caller: &Caller) -> Result<FlowId, RepoError> {
        enrich_operator_cells(self.catalog.as_ref(), &mut flow, caller).await?;

        flow.id = None;
        flow.user_id.clone_from(&caller.user_id);
        let id = self.store.insert(flow).await?;

        let grants = ResourcePermissions::owned_by(&caller.user_id);
        if let Err(err) = self
            .gateway
            .set_permissions(
                &Credential::InternalAdmin,
                FLOW_RESOURCE_CLASS,
                id.as_str(),
                &grants,
            )
            .await
        {
            tracing::warn!(
                flow_id = %id,
                user_id = %caller.user_id,
                error = %err,
                "flow stored without owner grant"
            );
            return Err(err.into());
        }

        tracing::info!(flow_id = %id, user_id = %caller.user_id, "created flow");
        Ok(id)
    }

    /// Replace the content of a flow the caller may write
    ///
    /// Id, owner and creation time of the stored flow are kept.
    ///
    /// # Errors
    /// `PermissionDenied` without `write`; the store is not touched then.
    pub async fn update_flow(
        &self,
        id: &FlowId,
        mut flow: Flow,
        caller: &Caller,
    ) -> Result<(), RepoError> {
        self.require(caller, id, Capability::Write).await?;
        enrich_operator_cells(self.catalog.as_ref(), &mut flow, caller).await?;

        self.store.replace(id, flow).await?;
        tracing::info!(flow_id = %id, user_id = %caller.user_id, "updated flow");
        Ok(())
    }

    /// Delete a flow the caller administrates, then its permission record
    ///
    /// # Errors
    /// `PermissionDenied` without `administrate`, `NotFound` from the store,
    /// or the authority error of the record removal. In the last case the
    /// document is already gone and the record is left for reconciliation.
    pub async fn delete_flow(&self, id: &FlowId, caller: &Caller) -> Result<(), RepoError> {
        self.require(caller, id, Capability::Administrate).await?;
        self.store.delete(id).await?;

        if let Err(err) = self
            .gateway
            .remove_resource(&caller.credential, FLOW_RESOURCE_CLASS, id.as_str())
            .await
        {
            tracing::warn!(
                flow_id = %id,
                user_id = %caller.user_id,
                error = %err,
                "flow deleted but permission record remains"
            );
            return Err(err.into());
        }

        tracing::info!(flow_id = %id, user_id = %caller.user_id, "deleted flow");
        Ok(())
    }

    /// Fetch a flow the caller may read
    ///
    /// # Errors
    /// `PermissionDenied` without `read`, then `NotFound`.
    pub async fn get_flow(&self, id: &FlowId, caller: &Caller) -> Result<Flow, RepoError> {
        self.require(caller, id, Capability::Read).await?;
        Ok(self.store.find(id).await?)
    }

    /// One page of the flows visible to the caller
    ///
    /// Pagination, ordering and search are applied unchanged. The total
    /// counts every visible match.
    ///
    /// # Errors
    /// Authority or store failures, `InvalidQuery` for a bad search pattern.
    pub async fn list_flows(
        &self,
        caller: &Caller,
        args: ListArgs,
    ) -> Result<FlowsResponse, RepoError> {
        let query = FlowQuery::from_args(args);
        let unrestricted = self
            .gateway
            .check_class_capability(
                &caller.credential,
                FLOW_RESOURCE_CLASS,
                Capability::Administrate,
            )
            .await?;

        let query = if unrestricted {
            query
        } else {
            let granted: BTreeSet<FlowId> = self
                .gateway
                .list_accessible_resource_ids(
                    &caller.credential,
                    FLOW_RESOURCE_CLASS,
                    Capability::Read,
                )
                .await?
                .into_iter()
                .map(FlowId::from)
                .collect();
            tracing::debug!(user_id = %caller.user_id, granted = granted.len(), "resolved readable flows");
            query.owned_or_granted(caller.user_id.clone(), granted)
        };

        Ok(self.store.list(&query).await?)
    }

    /// Liveness probe
    ///
    /// # Errors
    /// Never fails.
    #[allow(clippy::unused_async)]
    pub async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }

    /// Service identity and uptime
    #[must_use]
    pub fn info(&self) -> InfoReport {
        self.info.report()
    }

    async fn require(
        &self,
        caller: &Caller,
        id: &FlowId,
        capability: Capability,
    ) -> Result<(), RepoError> {
        let allowed = self
            .gateway
            .check_capability(&caller.credential, FLOW_RESOURCE_CLASS, id.as_str(), capability)
            .await?;
        if allowed {
            Ok(())
        } else {
            tracing::debug!(flow_id = %id, user_id = %caller.user_id, %capability, "capability denied");
            Err(RepoError::denied(capability, id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flowrepo_catalog::StaticOperatorCatalog;
    use flowrepo_core::{
        AuthorityError, Cell, PermissionRecord, PermissionsMap, ResourceClass, StoreError,
        ADMIN_ROLE,
    };
    use flowrepo_permissions::{InMemoryAuthority, Principal};
    use flowrepo_store::InMemoryFlowStore;
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        Store {}

        #[async_trait]
        impl FlowStore for Store {
            async fn insert(&self, flow: Flow) -> Result<FlowId, StoreError>;
            async fn replace(&self, id: &FlowId, flow: Flow) -> Result<(), StoreError>;
            async fn delete(&self, id: &FlowId) -> Result<(), StoreError>;
            async fn find(&self, id: &FlowId) -> Result<Flow, StoreError>;
            async fn list(&self, query: &FlowQuery) -> Result<FlowsResponse, StoreError>;
        }
    }

    mock! {
        Gateway {}

        #[async_trait]
        impl PermissionGateway for Gateway {
            async fn register_resource_class(&self, class: &ResourceClass) -> Result<(), AuthorityError>;
            async fn set_permissions(
                &self,
                credential: &Credential,
                class_id: &str,
                resource_id: &str,
                permissions: &ResourcePermissions,
            ) -> Result<(), AuthorityError>;
            async fn check_capability(
                &self,
                credential: &Credential,
                class_id: &str,
                resource_id: &str,
                capability: Capability,
            ) -> Result<bool, AuthorityError>;
            async fn check_class_capability(
                &self,
                credential: &Credential,
                class_id: &str,
                capability: Capability,
            ) -> Result<bool, AuthorityError>;
            async fn list_accessible_resource_ids(
                &self,
                credential: &Credential,
                class_id: &str,
                capability: Capability,
            ) -> Result<BTreeSet<String>, AuthorityError>;
            async fn list_resources_with_admin_capability(
                &self,
                credential: &Credential,
                class_id: &str,
            ) -> Result<Vec<PermissionRecord>, AuthorityError>;
            async fn remove_resource(
                &self,
                credential: &Credential,
                class_id: &str,
                resource_id: &str,
            ) -> Result<(), AuthorityError>;
        }
    }

    fn alice() -> Caller {
        Caller::new("alice", Credential::bearer("t-alice"))
    }

    fn bob() -> Caller {
        Caller::new("bob", Credential::bearer("t-bob"))
    }

    fn root() -> Caller {
        Caller::new("root", Credential::bearer("t-root"))
    }

    /// Authority where `f1` belongs to alice and bob may only read it
    async fn authority() -> Arc<InMemoryAuthority> {
        let authority = InMemoryAuthority::new();
        authority
            .register_resource_class(&ResourceClass::flows())
            .await
            .unwrap();
        authority.register_principal("t-alice", Principal::user("alice"));
        authority.register_principal("t-bob", Principal::user("bob"));
        authority.register_principal("t-root", Principal::user("root").with_role(ADMIN_ROLE));
        authority.seed_record(
            FLOW_RESOURCE_CLASS,
            "f1",
            ResourcePermissions::owned_by("alice").with_user("bob", PermissionsMap::read_only()),
        );
        Arc::new(authority)
    }

    fn repository(
        store: Arc<dyn FlowStore>,
        gateway: Arc<dyn PermissionGateway>,
        catalog: Arc<StaticOperatorCatalog>,
    ) -> AccessControlledRepository {
        AccessControlledRepository::new(store, gateway, catalog, ServiceInfo::new("flowrepo", "test"))
    }

    #[tokio::test]
    async fn update_without_write_never_reaches_store_or_catalog() {
        let mut store = MockStore::new();
        store.expect_replace().never();
        let catalog = Arc::new(StaticOperatorCatalog::new());
        let repo = repository(Arc::new(store), authority().await, catalog.clone());

        let flow = Flow::new("hijack").with_cell(Cell::operator("c1", "op1"));
        let result = repo.update_flow(&FlowId::new("f1"), flow, &bob()).await;

        assert_eq!(
            result,
            Err(RepoError::denied(Capability::Write, &FlowId::new("f1")))
        );
        assert_eq!(catalog.lookup_count(), 0);
    }

    #[tokio::test]
    async fn delete_without_administrate_leaves_everything() {
        let mut store = MockStore::new();
        store.expect_delete().never();
        let authority = authority().await;
        let before = authority.record(FLOW_RESOURCE_CLASS, "f1");
        let repo = repository(Arc::new(store), authority.clone(), Arc::default());

        let result = repo.delete_flow(&FlowId::new("f1"), &bob()).await;

        assert_eq!(
            result,
            Err(RepoError::denied(Capability::Administrate, &FlowId::new("f1")))
        );
        assert_eq!(authority.record(FLOW_RESOURCE_CLASS, "f1"), before);
        assert_eq!(authority.mutation_count(), 0);
    }

    #[tokio::test]
    async fn get_without_read_fails_closed() {
        let mut store = MockStore::new();
        store.expect_find().never();
        let authority = authority().await;
        authority.register_principal("t-eve", Principal::user("eve"));
        let repo = repository(Arc::new(store), authority, Arc::default());

        let eve = Caller::new("eve", Credential::bearer("t-eve"));
        let result = repo.get_flow(&FlowId::new("f1"), &eve).await;
        assert!(matches!(result, Err(RepoError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn failed_enrichment_persists_nothing() {
        let mut store = MockStore::new();
        store.expect_insert().never();
        let catalog = Arc::new(StaticOperatorCatalog::new());
        catalog.set_failing(true);
        let authority = authority().await;
        let repo = repository(Arc::new(store), authority.clone(), catalog);

        let flow = Flow::new("p1").with_cell(Cell::operator("c1", "op1"));
        let result = repo.create_flow(flow, &alice()).await;

        assert!(matches!(result, Err(RepoError::EnrichmentFailed { .. })));
        assert_eq!(authority.mutation_count(), 0);
    }

    #[tokio::test]
    async fn owner_grant_failure_keeps_stored_flow() {
        let mut store = MockStore::new();
        store
            .expect_insert()
            .withf(|flow| flow.user_id == "alice" && flow.id.is_none())
            .times(1)
            .returning(|_| Ok(FlowId::new("f9")));
        let authority = authority().await;
        authority.set_unavailable(true);
        let repo = repository(Arc::new(store), authority, Arc::default());

        let result = repo.create_flow(Flow::new("p1"), &alice()).await;
        assert!(matches!(result, Err(RepoError::AuthorityUnavailable(_))));
    }

    #[tokio::test]
    async fn create_ignores_client_owner_and_id() {
        let store = Arc::new(InMemoryFlowStore::new());
        let authority = authority().await;
        let repo = repository(store.clone(), authority.clone(), Arc::default());

        let mut flow = Flow::new("p1");
        flow.user_id = "mallory".into();
        flow.id = Some(FlowId::new("chosen"));
        let id = repo.create_flow(flow, &alice()).await.unwrap();

        assert_ne!(id.as_str(), "chosen");
        assert_eq!(store.find(&id).await.unwrap().user_id, "alice");
        assert_eq!(
            authority.record(FLOW_RESOURCE_CLASS, id.as_str()),
            Some(ResourcePermissions::owned_by("alice"))
        );
    }

    #[tokio::test]
    async fn record_removal_failure_surfaces_after_delete() {
        let store = Arc::new(InMemoryFlowStore::new());
        let id = store.insert(Flow::new("p1")).await.unwrap();

        let mut gateway = MockGateway::new();
        gateway
            .expect_check_capability()
            .withf(|_, class, _, capability| {
                class == FLOW_RESOURCE_CLASS && *capability == Capability::Administrate
            })
            .returning(|_, _, _, _| Ok(true));
        gateway
            .expect_remove_resource()
            .times(1)
            .returning(|_, _, _| Err(AuthorityError::Unavailable("timeout".into())));
        let repo = repository(store.clone(), Arc::new(gateway), Arc::default());

        let result = repo.delete_flow(&id, &alice()).await;

        assert!(matches!(result, Err(RepoError::AuthorityUnavailable(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn delete_of_missing_flow_is_not_found() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_check_capability()
            .returning(|_, _, _, _| Ok(true));
        gateway.expect_remove_resource().never();
        let repo = repository(Arc::new(InMemoryFlowStore::new()), Arc::new(gateway), Arc::default());

        let missing = FlowId::new("missing");
        assert_eq!(
            repo.delete_flow(&missing, &root()).await,
            Err(RepoError::NotFound(missing))
        );
    }

    #[tokio::test]
    async fn list_scopes_non_admin_to_owned_or_granted() {
        let mut store = MockStore::new();
        store
            .expect_list()
            .withf(|query| {
                query.owner_id.as_deref() == Some("bob")
                    && query.id_subset == Some(BTreeSet::from([FlowId::new("f1")]))
                    && query.limit == Some(5)
            })
            .times(1)
            .returning(|_| Ok(FlowsResponse::default()));
        let repo = repository(Arc::new(store), authority().await, Arc::default());

        repo.list_flows(&bob(), ListArgs::default().with_limit(5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn list_for_class_admin_is_unscoped() {
        let mut store = MockStore::new();
        store
            .expect_list()
            .with(eq(FlowQuery::default()))
            .times(1)
            .returning(|_| Ok(FlowsResponse::default()));
        let repo = repository(Arc::new(store), authority().await, Arc::default());

        repo.list_flows(&root(), ListArgs::default()).await.unwrap();
    }

    #[tokio::test]
    async fn health_and_info_are_passthrough() {
        let repo = repository(Arc::new(MockStore::new()), Arc::new(MockGateway::new()), Arc::default());
        assert_eq!(repo.health_check().await, Ok(()));
        assert_eq!(repo.info().name, "flowrepo");
    }
}
