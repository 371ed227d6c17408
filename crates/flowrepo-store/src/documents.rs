//! Insertion-ordered flow index shared by the store implementations

use crate::filter;
use chrono::{DateTime, Utc};
use flowrepo_core::{Flow, FlowId, FlowQuery, FlowsResponse, StoreError};
use indexmap::IndexMap;
use ulid::Ulid;

/// Flow documents keyed by id, in insertion order
#[derive(Debug, Clone, Default)]
pub(crate) struct Documents {
    flows: IndexMap<FlowId, Flow>,
}

impl Documents {
    /// Rebuild from previously persisted flows
    pub(crate) fn from_flows(flows: Vec<Flow>) -> Result<Self, StoreError> {
        let mut documents = Self::default();
        for flow in flows {
            let id = flow
                .id
                .clone()
                .ok_or_else(|| StoreError::Unavailable("snapshot contains flow without id".into()))?;
            if documents.flows.insert(id.clone(), flow).is_some() {
                return Err(StoreError::Conflict(id));
            }
        }
        Ok(documents)
    }

    pub(crate) fn insert(&mut self, mut flow: Flow, now: DateTime<Utc>) -> Result<FlowId, StoreError> {
        let id = FlowId::new(Ulid::new().to_string());
        if self.flows.contains_key(&id) {
            return Err(StoreError::Conflict(id));
        }
        flow.id = Some(id.clone());
        flow.date_created = Some(now);
        flow.date_updated = Some(now);
        self.flows.insert(id.clone(), flow);
        Ok(id)
    }

    pub(crate) fn replace(
        &mut self,
        id: &FlowId,
        mut flow: Flow,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let existing = self
            .flows
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        flow.id = Some(id.clone());
        flow.user_id = std::mem::take(&mut existing.user_id);
        flow.date_created = existing.date_created;
        flow.date_updated = Some(now);
        *existing = flow;
        Ok(())
    }

    pub(crate) fn delete(&mut self, id: &FlowId) -> Result<Flow, StoreError> {
        self.flows
            .shift_remove(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    pub(crate) fn find(&self, id: &FlowId) -> Result<Flow, StoreError> {
        self.flows
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    pub(crate) fn list(&self, query: &FlowQuery) -> Result<FlowsResponse, StoreError> {
        filter::evaluate(self.flows.values(), query)
    }

    pub(crate) fn snapshot(&self) -> Vec<&Flow> {
        self.flows.values().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.flows.len()
    }
}
