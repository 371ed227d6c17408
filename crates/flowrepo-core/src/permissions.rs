//! Permission model
//!
//! Capabilities, per-resource grant tables and the credentials callers
//! present to the permission authority.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource-class namespace for flows in the permission authority
pub const FLOW_RESOURCE_CLASS: &str = "flow-instance";

/// Role that receives full capabilities on every flow by class default
pub const ADMIN_ROLE: &str = "admin";

/// A single capability on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Read,
    Write,
    Execute,
    Administrate,
}

impl Capability {
    /// All capabilities
    pub const ALL: [Capability; 4] = [
        Capability::Read,
        Capability::Write,
        Capability::Execute,
        Capability::Administrate,
    ];

    /// Single-letter code used on the authority wire
    #[inline]
    #[must_use]
    pub fn code(self) -> char {
        match self {
            Capability::Read => 'r',
            Capability::Write => 'w',
            Capability::Execute => 'x',
            Capability::Administrate => 'a',
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Capability::Read => "read",
            Capability::Write => "write",
            Capability::Execute => "execute",
            Capability::Administrate => "administrate",
        };
        f.write_str(name)
    }
}

/// Capability set held by one user, group or role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PermissionsMap {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
    pub administrate: bool,
}

impl PermissionsMap {
    /// Every capability granted
    #[must_use]
    pub const fn full() -> Self {
        Self {
            read: true,
            write: true,
            execute: true,
            administrate: true,
        }
    }

    /// Only read granted
    #[must_use]
    pub const fn read_only() -> Self {
        Self {
            read: true,
            write: false,
            execute: false,
            administrate: false,
        }
    }

    /// Whether `capability` is granted
    #[inline]
    #[must_use]
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::Read => self.read,
            Capability::Write => self.write,
            Capability::Execute => self.execute,
            Capability::Administrate => self.administrate,
        }
    }
}

/// Grant tables for one resource
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResourcePermissions {
    #[serde(default)]
    pub user_permissions: BTreeMap<String, PermissionsMap>,
    #[serde(default)]
    pub group_permissions: BTreeMap<String, PermissionsMap>,
    #[serde(default)]
    pub role_permissions: BTreeMap<String, PermissionsMap>,
}

impl ResourcePermissions {
    /// Grant table giving `owner` every capability
    #[must_use]
    pub fn owned_by(owner: &str) -> Self {
        let mut permissions = Self::default();
        permissions.grant_owner(owner);
        permissions
    }

    /// Force a full-capability entry for `owner`, leaving other grants intact
    pub fn grant_owner(&mut self, owner: &str) {
        self.user_permissions
            .insert(owner.to_string(), PermissionsMap::full());
    }

    /// With a user grant
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>, permissions: PermissionsMap) -> Self {
        self.user_permissions.insert(user.into(), permissions);
        self
    }

    /// With a group grant
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>, permissions: PermissionsMap) -> Self {
        self.group_permissions.insert(group.into(), permissions);
        self
    }

    /// With a role grant
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>, permissions: PermissionsMap) -> Self {
        self.role_permissions.insert(role.into(), permissions);
        self
    }

    /// Whether any of the principal's entries grants `capability`
    #[must_use]
    pub fn allows(
        &self,
        user: &str,
        groups: &[String],
        roles: &[String],
        capability: Capability,
    ) -> bool {
        self.user_permissions
            .get(user)
            .is_some_and(|p| p.allows(capability))
            || groups
                .iter()
                .filter_map(|g| self.group_permissions.get(g))
                .any(|p| p.allows(capability))
            || roles
                .iter()
                .filter_map(|r| self.role_permissions.get(r))
                .any(|p| p.allows(capability))
    }

    /// Whether at least one user holds administrate
    ///
    /// The authority refuses records that would leave a resource unmanageable.
    #[must_use]
    pub fn has_user_admin(&self) -> bool {
        self.user_permissions.values().any(|p| p.administrate)
    }
}

/// Permission record of one resource as known to the authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub id: String,
    #[serde(flatten)]
    pub permissions: ResourcePermissions,
}

/// Resource class declaration with its default role grants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceClass {
    pub id: String,
    pub default_permissions: ResourcePermissions,
}

impl ResourceClass {
    /// The flow class: `admin` role holds every capability on every flow
    #[must_use]
    pub fn flows() -> Self {
        Self {
            id: FLOW_RESOURCE_CLASS.to_string(),
            default_permissions: ResourcePermissions::default()
                .with_role(ADMIN_ROLE, PermissionsMap::full()),
        }
    }
}

/// Credential presented to the permission authority
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Caller's opaque bearer token
    Bearer(String),
    /// Privileged internal credential with class-admin rights
    InternalAdmin,
}

impl Credential {
    /// Bearer token credential
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(token.into())
    }

    /// Raw token of a bearer credential
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Bearer(token) => Some(token),
            Self::InternalAdmin => None,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Self::InternalAdmin => f.write_str("InternalAdmin"),
        }
    }
}

/// Authenticated caller of a repository operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub credential: Credential,
}

impl Caller {
    #[must_use]
    pub fn new(user_id: impl Into<String>, credential: Credential) -> Self {
        Self {
            user_id: user_id.into(),
            credential,
        }
    }
}
