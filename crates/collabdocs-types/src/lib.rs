//! Shared types, adapter traits, and core utilities for collabdocs.
//!
//! This crate holds everything the relay, the storage adapters and the HTTP
//! server need to agree on, so adapter crates do not depend on the server.

pub mod error;
pub mod meta_adapter;
pub mod prelude;
pub mod snapshot_adapter;
pub mod types;
pub mod utils;

// vim: ts=4
