//! Flow Stores
//!
//! [`FlowStore`](flowrepo_core::FlowStore) implementations:
//! - [`InMemoryFlowStore`] for local runs and tests
//! - [`JsonFileFlowStore`] persisting every mutation to a snapshot file
//!
//! Both assign ULID identifiers, keep insertion order for unordered
//! listings and evaluate [`FlowQuery`](flowrepo_core::FlowQuery) filters
//! the same way.

#![warn(unreachable_pub)]

mod documents;
mod filter;

pub mod file;
pub mod memory;

pub use file::JsonFileFlowStore;
pub use memory::InMemoryFlowStore;
