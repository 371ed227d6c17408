//! Query evaluation over in-memory flows

use flowrepo_core::{Flow, FlowQuery, FlowsResponse, SortDirection, SortField, StoreError};
use regex::Regex;
use std::cmp::Ordering;

/// Apply scope, search, ordering and pagination to `flows`
///
/// `total` counts every flow that passes scope and search, independent of
/// `limit` and `offset`.
pub(crate) fn evaluate<'a, I>(flows: I, query: &FlowQuery) -> Result<FlowsResponse, StoreError>
where
    I: IntoIterator<Item = &'a Flow>,
{
    let search = query
        .search
        .as_deref()
        .map(Regex::new)
        .transpose()
        .map_err(|e| StoreError::InvalidQuery(format!("search: {e}")))?;

    let mut matched: Vec<&Flow> = flows
        .into_iter()
        .filter(|flow| query.in_scope(flow))
        .filter(|flow| search.as_ref().map_or(true, |re| re.is_match(&flow.name)))
        .collect();

    if let Some(order) = query.order {
        matched.sort_by(|a, b| {
            let ordering = compare(a, b, order.field);
            match order.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
    }

    let total = matched.len() as u64;
    let offset = usize::try_from(query.offset.unwrap_or(0)).unwrap_or(usize::MAX);
    let limit = query
        .limit
        .filter(|l| *l > 0)
        .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

    let flows = matched
        .into_iter()
        .skip(offset)
        .take(limit)
        .cloned()
        .collect();

    Ok(FlowsResponse { flows, total })
}

fn compare(a: &Flow, b: &Flow, field: SortField) -> Ordering {
    match field {
        SortField::Id => a.id.cmp(&b.id),
        SortField::Name => a.name.cmp(&b.name),
        SortField::Description => a.description.cmp(&b.description),
        SortField::UserId => a.user_id.cmp(&b.user_id),
        SortField::DateCreated => a.date_created.cmp(&b.date_created),
        SortField::DateUpdated => a.date_updated.cmp(&b.date_updated),
    }
}
