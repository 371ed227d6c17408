//! Flow Repository Core
//!
//! Shared vocabulary of the flow repository:
//! - The persisted [`Flow`] graph model
//! - Capabilities, grant tables and credentials
//! - The error taxonomy surfaced by repository operations
//! - The collaborator ports: [`FlowStore`], [`PermissionGateway`], [`OperatorCatalog`]
//!
//! # Example
//!
//! ```rust
//! use flowrepo_core::{Cell, Flow, ListArgs};
//!
//! let flow = Flow::new("pipeline").with_cell(Cell::operator("c1", "op1"));
//! assert!(flow.model.cells[0].is_operator());
//!
//! let args = ListArgs::from_query_pairs([("limit", "20"), ("order", "name:asc")]).unwrap();
//! assert_eq!(args.limit, Some(20));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod permissions;
pub mod ports;
pub mod query;
pub mod types;

// Re-exports for convenience
pub use error::{AuthorityError, CatalogError, RepoError, StoreError};
pub use permissions::{
    Caller, Capability, Credential, PermissionRecord, PermissionsMap, ResourceClass,
    ResourcePermissions, ADMIN_ROLE, FLOW_RESOURCE_CLASS,
};
pub use ports::{FlowStore, OperatorCatalog, PermissionGateway};
pub use query::{FlowQuery, ListArgs, SortDirection, SortField, SortOrder};
pub use types::{
    Cell, CellConfigValue, CellLink, CellPosition, Flow, FlowId, FlowsResponse, Model,
    OperatorMetadata, Share, OPERATOR_CELL_TYPE,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the flow repository
    pub use crate::{
        Caller, Capability, Credential, Flow, FlowId, FlowQuery, FlowStore, ListArgs,
        OperatorCatalog, PermissionGateway, RepoError,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
