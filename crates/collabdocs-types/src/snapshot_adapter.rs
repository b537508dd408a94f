//! Snapshot and update log adapter
//!
//! The persistence side of the realtime relay. Document content is opaque here:
//! a snapshot is the latest full serialized state of a document and an update is an
//! incremental delta. Neither is inspected, merged or validated beyond emptiness.
//!
//! Writes for documents that do not exist are silently discarded.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::prelude::*;

#[async_trait]
pub trait SnapshotAdapter: Debug + Send + Sync {
	/// Returns the latest snapshot of a document, if one was ever stored
	async fn read_snapshot(&self, doc_id: &DocId) -> CdResult<Option<Vec<u8>>>;

	/// Replaces the snapshot of a document
	///
	/// An empty snapshot is rejected with `Error::ValidationError`.
	async fn upsert_snapshot(&self, doc_id: &DocId, snapshot: &[u8]) -> CdResult<()>;

	/// Appends an incremental update to the update log of a document
	///
	/// An empty update is rejected with `Error::ValidationError`.
	async fn append_update(&self, doc_id: &DocId, update: &[u8]) -> CdResult<()>;

	/// Returns the update log of a document in append order
	async fn list_updates(&self, doc_id: &DocId) -> CdResult<Vec<Vec<u8>>>;
}

// vim: ts=4
