//! Permission reconciliation
//!
//! Brings the authority's records for the flow class in line with the store:
//! - every stored flow gets a record whose owner entry grants everything,
//!   keeping whatever other grants the record already has
//! - every record without a stored flow is removed
//!
//! Records that already match are left alone, so a second run without
//! intervening writes makes no mutating authority call. The first failing
//! write aborts the run.

use crate::info::ServiceInfo;
use crate::repository::AccessControlledRepository;
use flowrepo_core::{
    Credential, FlowQuery, FlowStore, OperatorCatalog, PermissionGateway, RepoError,
    ResourceClass, ResourcePermissions, FLOW_RESOURCE_CLASS,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Outcome of one reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Flows read from the store
    pub flows_scanned: usize,
    /// Records created or repaired
    pub records_written: usize,
    /// Records that already matched
    pub records_unchanged: usize,
    /// Records removed because their flow no longer exists
    pub orphans_removed: usize,
}

impl ReconciliationReport {
    /// Whether the run changed anything at the authority
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.records_written == 0 && self.orphans_removed == 0
    }
}

impl std::fmt::Display for ReconciliationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} flows scanned, {} records written, {} unchanged, {} orphans removed",
            self.flows_scanned, self.records_written, self.records_unchanged, self.orphans_removed
        )
    }
}

/// Startup repair of flow permission records
pub struct Reconciler {
    store: Arc<dyn FlowStore>,
    gateway: Arc<dyn PermissionGateway>,
}

impl Reconciler {
    #[must_use]
    pub fn new(store: Arc<dyn FlowStore>, gateway: Arc<dyn PermissionGateway>) -> Self {
        Self { store, gateway }
    }

    /// Register the flow class, then repair every record
    ///
    /// Acts with the internal credential throughout.
    ///
    /// # Errors
    /// The first store or authority error encountered.
    pub async fn run(&self) -> Result<ReconciliationReport, RepoError> {
        let admin = Credential::InternalAdmin;
        self.gateway
            .register_resource_class(&ResourceClass::flows())
            .await?;

        let everything = FlowQuery::default();
        let (stored, records) = tokio::try_join!(
            async { self.store.list(&everything).await.map_err(RepoError::from) },
            async {
                self.gateway
                    .list_resources_with_admin_capability(&admin, FLOW_RESOURCE_CLASS)
                    .await
                    .map_err(RepoError::from)
            },
        )?;

        let mut remaining: BTreeMap<String, ResourcePermissions> = records
            .into_iter()
            .map(|record| (record.id, record.permissions))
            .collect();
        let mut report = ReconciliationReport {
            flows_scanned: stored.flows.len(),
            ..ReconciliationReport::default()
        };

        for flow in &stored.flows {
            let Some(id) = flow.id.as_ref() else {
                continue;
            };
            let current = remaining.remove(id.as_str());
            let mut desired = current.clone().unwrap_or_default();
            desired.grant_owner(&flow.user_id);

            if current.as_ref() == Some(&desired) {
                report.records_unchanged += 1;
                continue;
            }

            self.gateway
                .set_permissions(&admin, FLOW_RESOURCE_CLASS, id.as_str(), &desired)
                .await?;
            report.records_written += 1;
            tracing::debug!(
                flow_id = %id,
                user_id = %flow.user_id,
                created = current.is_none(),
                "wrote owner grant"
            );
        }

        for orphan in remaining.keys() {
            self.gateway
                .remove_resource(&admin, FLOW_RESOURCE_CLASS, orphan)
                .await?;
            report.orphans_removed += 1;
            tracing::warn!(resource_id = %orphan, "removed permission record without flow");
        }

        tracing::info!(
            flows_scanned = report.flows_scanned,
            records_written = report.records_written,
            records_unchanged = report.records_unchanged,
            orphans_removed = report.orphans_removed,
            "reconciled flow permissions"
        );
        Ok(report)
    }
}

/// Reconcile, then hand out the repository
///
/// The repository is only returned once reconciliation has succeeded.
///
/// # Errors
/// The error that aborted reconciliation.
pub async fn bootstrap(
    store: Arc<dyn FlowStore>,
    gateway: Arc<dyn PermissionGateway>,
    catalog: Arc<dyn OperatorCatalog>,
    info: ServiceInfo,
) -> Result<(AccessControlledRepository, ReconciliationReport), RepoError> {
    let report = Reconciler::new(store.clone(), gateway.clone())
        .run()
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "reconciliation failed");
            err
        })?;

    Ok((
        AccessControlledRepository::new(store, gateway, catalog, info),
        report,
    ))
}
