//! Operator cell enrichment
//!
//! The catalog owns name, image, deployment type and cost of operator cells.
//! Whatever the client sent for those fields is replaced before a flow is
//! written. Lookups run concurrently and the first failure aborts the write.

use flowrepo_core::{Caller, Flow, OperatorCatalog, RepoError};
use futures::future::try_join_all;

/// Overwrite the catalog-owned fields of every operator cell in `flow`
///
/// # Errors
/// `RepoError::EnrichmentFailed` if an operator cell has no `operatorId` or
/// its lookup fails. `flow` may be partially enriched in that case.
pub async fn enrich_operator_cells(
    catalog: &dyn OperatorCatalog,
    flow: &mut Flow,
    caller: &Caller,
) -> Result<usize, RepoError> {
    let lookups = flow.operator_cells_mut().map(move |cell| async move {
        let Some(operator_id) = cell.operator_id.clone() else {
            return Err(RepoError::enrichment(
                format!("cell {}", cell.id),
                "operator cell without operatorId",
            ));
        };
        let metadata = catalog
            .get_operator_metadata(&operator_id, &caller.user_id, &caller.credential)
            .await
            .map_err(|e| RepoError::enrichment(operator_id.as_str(), e))?;
        cell.apply_metadata(&metadata);
        Ok::<(), RepoError>(())
    });

    let enriched = try_join_all(lookups).await?.len();
    tracing::debug!(user_id = %caller.user_id, cells = enriched, "enriched operator cells");
    Ok(enriched)
}
