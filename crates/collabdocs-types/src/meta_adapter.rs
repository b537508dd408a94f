//! Document and comment metadata adapter
//!
//! Records owned by the REST layer: document titles and the comments anchored
//! to text ranges of a document. The realtime relay never touches these; it only
//! talks to the [`SnapshotAdapter`](crate::snapshot_adapter::SnapshotAdapter).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::prelude::*;

pub const DEFAULT_DOC_TITLE: &str = "Untitled Document";

/// A collaborative document
#[derive(Debug, Clone, Serialize)]
pub struct Document {
	pub id: DocId,
	pub title: Box<str>,
	#[serde(skip)]
	pub created_at: Timestamp,
	#[serde(rename = "updatedAt")]
	pub updated_at: Timestamp,
}

/// A comment attached to a range of a document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
	pub id: Box<str>,
	pub doc_id: DocId,
	pub author_name: Box<str>,
	pub from_pos: i64,
	pub to_pos: i64,
	pub text: Box<str>,
	pub resolved: bool,
	pub created_at: Timestamp,
}

/// Validated input for a new comment
#[derive(Debug)]
pub struct CreateCommentData<'a> {
	pub id: &'a str,
	pub author_name: &'a str,
	pub from_pos: i64,
	pub to_pos: i64,
	pub text: &'a str,
}

/// Partial comment update, `None` fields are left unchanged
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCommentData {
	pub resolved: Option<bool>,
	pub text: Option<Box<str>>,
}

#[async_trait]
pub trait MetaAdapter: Debug + Send + Sync {
	// Documents
	//***********

	/// Creates a document with the given id and (already normalized) title
	async fn create_document(&self, doc_id: &DocId, title: &str) -> CdResult<Document>;

	/// Reads a document, `Error::NotFound` if it does not exist
	async fn read_document(&self, doc_id: &DocId) -> CdResult<Document>;

	/// Replaces the title and bumps `updated_at`
	async fn update_document_title(&self, doc_id: &DocId, title: &str) -> CdResult<Document>;

	/// Deletes a document together with its comments, snapshot and updates
	async fn delete_document(&self, doc_id: &DocId) -> CdResult<()>;

	// Comments
	//**********

	/// Lists the comments of a document, newest first
	async fn list_comments(&self, doc_id: &DocId) -> CdResult<Vec<Comment>>;

	/// Stores a new comment, `Error::NotFound` if the document does not exist
	async fn create_comment(&self, doc_id: &DocId, comment: &CreateCommentData<'_>)
	-> CdResult<Comment>;

	/// Applies a partial update to a comment of the given document
	async fn update_comment(
		&self,
		doc_id: &DocId,
		comment_id: &str,
		data: &UpdateCommentData,
	) -> CdResult<Comment>;

	// Health
	//********

	/// Cheap round trip to the backing store
	async fn ping(&self) -> CdResult<()>;
}

// vim: ts=4
