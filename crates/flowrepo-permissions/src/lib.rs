//! Permission Gateways
//!
//! [`PermissionGateway`](flowrepo_core::PermissionGateway) implementations:
//! - [`HttpPermissionGateway`] talking to the remote permissions service
//! - [`InMemoryAuthority`], a complete in-process authority for tests and
//!   local runs
//!
//! [`TokenClaims`] reads subject and roles out of caller tokens.

#![warn(unreachable_pub)]

pub mod claims;
pub mod http;
pub mod memory;

pub use claims::{strip_bearer, unsigned_token, ClaimsError, TokenClaims};
pub use http::HttpPermissionGateway;
pub use memory::{InMemoryAuthority, Principal};
