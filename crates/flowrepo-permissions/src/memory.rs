//! In-process permission authority
//!
//! Deterministic stand-in for the remote authority. Bearer tokens are mapped
//! to registered principals; `InternalAdmin` acts with class-admin rights.
//! Mutating calls are counted so callers can assert that a process made no
//! writes, and the whole authority can be switched to fail as unreachable.

use async_trait::async_trait;
use dashmap::DashMap;
use flowrepo_core::{
    AuthorityError, Capability, Credential, PermissionGateway, PermissionRecord, ResourceClass,
    ResourcePermissions,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Identity behind a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Principal {
    pub user_id: String,
    pub groups: Vec<String>,
    pub roles: Vec<String>,
}

impl Principal {
    #[must_use]
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }
}

enum Acting {
    Internal,
    Principal(Principal),
}

/// Permission authority held in memory
#[derive(Debug, Default)]
pub struct InMemoryAuthority {
    classes: DashMap<String, ResourceClass>,
    /// class id -> resource id -> grants
    records: RwLock<BTreeMap<String, BTreeMap<String, ResourcePermissions>>>,
    principals: DashMap<String, Principal>,
    unavailable: AtomicBool,
    mutations: AtomicUsize,
}

impl InMemoryAuthority {
    /// Create an authority with no classes, records or principals
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `token` to `principal`
    pub fn register_principal(&self, token: impl Into<String>, principal: Principal) {
        self.principals.insert(token.into(), principal);
    }

    /// Write a record directly, bypassing authorization and validation
    pub fn seed_record(&self, class_id: &str, resource_id: &str, permissions: ResourcePermissions) {
        self.records
            .write()
            .entry(class_id.to_string())
            .or_default()
            .insert(resource_id.to_string(), permissions);
    }

    /// Current record of a resource
    #[must_use]
    pub fn record(&self, class_id: &str, resource_id: &str) -> Option<ResourcePermissions> {
        self.records
            .read()
            .get(class_id)
            .and_then(|records| records.get(resource_id))
            .cloned()
    }

    /// Ids of every record in a class
    #[must_use]
    pub fn resource_ids(&self, class_id: &str) -> BTreeSet<String> {
        self.records
            .read()
            .get(class_id)
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `class_id` has been registered
    #[must_use]
    pub fn is_registered(&self, class_id: &str) -> bool {
        self.classes.contains_key(class_id)
    }

    /// Make every call fail as if the authority were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful record writes and removals so far
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn ensure_reachable(&self) -> Result<(), AuthorityError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(AuthorityError::Unavailable("authority offline".into()))
        } else {
            Ok(())
        }
    }

    fn resolve(&self, credential: &Credential) -> Result<Acting, AuthorityError> {
        match credential {
            Credential::InternalAdmin => Ok(Acting::Internal),
            Credential::Bearer(token) => self
                .principals
                .get(token)
                .map(|p| Acting::Principal(p.clone()))
                .ok_or_else(|| AuthorityError::Rejected("unknown credential".into())),
        }
    }

    fn class(&self, class_id: &str) -> Result<ResourceClass, AuthorityError> {
        self.classes
            .get(class_id)
            .map(|c| c.clone())
            .ok_or_else(|| AuthorityError::Rejected(format!("unknown resource class {class_id}")))
    }

    fn allows(
        acting: &Acting,
        class: &ResourceClass,
        record: Option<&ResourcePermissions>,
        capability: Capability,
    ) -> bool {
        match acting {
            Acting::Internal => true,
            Acting::Principal(p) => {
                class
                    .default_permissions
                    .allows(&p.user_id, &p.groups, &p.roles, capability)
                    || record.is_some_and(|r| r.allows(&p.user_id, &p.groups, &p.roles, capability))
            }
        }
    }
}

#[async_trait]
impl PermissionGateway for InMemoryAuthority {
    async fn register_resource_class(&self, class: &ResourceClass) -> Result<(), AuthorityError> {
        self.ensure_reachable()?;
        self.classes.insert(class.id.clone(), class.clone());
        Ok(())
    }

    async fn set_permissions(
        &self,
        credential: &Credential,
        class_id: &str,
        resource_id: &str,
        permissions: &ResourcePermissions,
    ) -> Result<(), AuthorityError> {
        self.ensure_reachable()?;
        let acting = self.resolve(credential)?;
        let class = self.class(class_id)?;

        if !permissions.has_user_admin() {
            return Err(AuthorityError::Rejected(
                "record must grant administrate to at least one user".into(),
            ));
        }

        let mut records = self.records.write();
        let class_records = records.entry(class_id.to_string()).or_default();
        let existing = class_records.get(resource_id);
        if existing.is_some()
            && !Self::allows(&acting, &class, existing, Capability::Administrate)
        {
            return Err(AuthorityError::Rejected(format!(
                "missing administrate rights on {resource_id}"
            )));
        }

        class_records.insert(resource_id.to_string(), permissions.clone());
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn check_capability(
        &self,
        credential: &Credential,
        class_id: &str,
        resource_id: &str,
        capability: Capability,
    ) -> Result<bool, AuthorityError> {
        self.ensure_reachable()?;
        let acting = self.resolve(credential)?;
        let class = self.class(class_id)?;
        let records = self.records.read();
        let record = records.get(class_id).and_then(|r| r.get(resource_id));
        Ok(Self::allows(&acting, &class, record, capability))
    }

    async fn check_class_capability(
        &self,
        credential: &Credential,
        class_id: &str,
        capability: Capability,
    ) -> Result<bool, AuthorityError> {
        self.ensure_reachable()?;
        let acting = self.resolve(credential)?;
        let class = self.class(class_id)?;
        Ok(Self::allows(&acting, &class, None, capability))
    }

    async fn list_accessible_resource_ids(
        &self,
        credential: &Credential,
        class_id: &str,
        capability: Capability,
    ) -> Result<BTreeSet<String>, AuthorityError> {
        self.ensure_reachable()?;
        let acting = self.resolve(credential)?;
        let class = self.class(class_id)?;
        let records = self.records.read();
        Ok(records
            .get(class_id)
            .into_iter()
            .flatten()
            .filter(|(_, record)| Self::allows(&acting, &class, Some(record), capability))
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn list_resources_with_admin_capability(
        &self,
        credential: &Credential,
        class_id: &str,
    ) -> Result<Vec<PermissionRecord>, AuthorityError> {
        self.ensure_reachable()?;
        let acting = self.resolve(credential)?;
        let class = self.class(class_id)?;
        let records = self.records.read();
        Ok(records
            .get(class_id)
            .into_iter()
            .flatten()
            .filter(|(_, record)| {
                Self::allows(&acting, &class, Some(record), Capability::Administrate)
            })
            .map(|(id, record)| PermissionRecord {
                id: id.clone(),
                permissions: record.clone(),
            })
            .collect())
    }

    async fn remove_resource(
        &self,
        credential: &Credential,
        class_id: &str,
        resource_id: &str,
    ) -> Result<(), AuthorityError> {
        self.ensure_reachable()?;
        let acting = self.resolve(credential)?;
        let class = self.class(class_id)?;

        let mut records = self.records.write();
        let Some(class_records) = records.get_mut(class_id) else {
            return Ok(());
        };
        let Some(existing) = class_records.get(resource_id) else {
            return Ok(());
        };
        if !Self::allows(&acting, &class, Some(existing), Capability::Administrate) {
            return Err(AuthorityError::Rejected(format!(
                "missing administrate rights on {resource_id}"
            )));
        }

        class_records.remove(resource_id);
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
