//! Flow Repository Service
//!
//! Access-controlled repository of flow definitions:
//! - [`AccessControlledRepository`] authorizes every operation against the
//!   permission authority before touching the store
//! - [`Reconciler`] repairs drift between stored flows and their permission
//!   records, once, before the repository serves traffic
//! - [`api`] exposes the repository over HTTP
//! - [`config`] and [`telemetry`] carry the process setup used by the
//!   `flowrepo` binary
//!
//! # Example
//!
//! ```rust,no_run
//! use flowrepo_service::{bootstrap, ServiceInfo};
//! use flowrepo_catalog::StaticOperatorCatalog;
//! use flowrepo_permissions::InMemoryAuthority;
//! use flowrepo_store::InMemoryFlowStore;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), flowrepo_core::RepoError> {
//! let (repository, report) = bootstrap(
//!     Arc::new(InMemoryFlowStore::new()),
//!     Arc::new(InMemoryAuthority::new()),
//!     Arc::new(StaticOperatorCatalog::new()),
//!     ServiceInfo::new("flowrepo", "0.1.0"),
//! )
//! .await?;
//! assert_eq!(report.flows_scanned, 0);
//! # let _ = repository;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod api;
pub mod config;
pub mod enrichment;
pub mod info;
pub mod reconcile;
pub mod repository;
pub mod telemetry;

// Re-exports for convenience
pub use config::{ConfigError, LoggerConfig, ServiceConfig};
pub use info::{InfoReport, ServiceInfo};
pub use reconcile::{bootstrap, ReconciliationReport, Reconciler};
pub use repository::AccessControlledRepository;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
