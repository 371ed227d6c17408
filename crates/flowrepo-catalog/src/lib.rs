//! Operator Catalog
//!
//! [`OperatorCatalog`](flowrepo_core::OperatorCatalog) implementations:
//! - [`HttpOperatorCatalog`] querying the operator repository service
//! - [`StaticOperatorCatalog`], a fixed table for tests and offline runs

#![warn(unreachable_pub)]

pub mod fixed;
pub mod http;

pub use fixed::StaticOperatorCatalog;
pub use http::HttpOperatorCatalog;
