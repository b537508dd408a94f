//! Collabdocs is a self-hosted server for collaborative documents.
//!
//! # Features
//!
//! - REST API for document metadata and anchored comments
//! - Realtime websocket relay
//!		- one broadcast room per document
//!		- opaque CRDT payloads, persisted as an update log and a latest snapshot
//!		- presence and comment notifications relayed to the room
//! - SQLite storage through pluggable adapters

#![forbid(unsafe_code)]

pub mod app;
pub mod comments;
pub mod docs;
pub mod extract;
pub mod health;
pub mod prelude;
pub mod routes;
pub mod websocket;

pub use collabdocs_relay::{Relay, RelayConfig};
pub use collabdocs_types::{error, meta_adapter, snapshot_adapter, types, utils};

pub use crate::app::{App, AppBuilder, AppState};

// vim: ts=4
