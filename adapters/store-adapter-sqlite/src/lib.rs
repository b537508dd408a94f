//! SQLite storage adapter for collabdocs
//!
//! Implements both the metadata adapter (documents, comments) and the snapshot
//! adapter (latest snapshot, update log) on a single SQLite database.

use async_trait::async_trait;
use sqlx::sqlite::{self, SqlitePool};
use std::{path::Path, str::FromStr};

use collabdocs::meta_adapter::{Comment, CreateCommentData, Document, MetaAdapter, UpdateCommentData};
use collabdocs::prelude::*;
use collabdocs::snapshot_adapter::SnapshotAdapter;

mod comment;
mod document;
mod schema;
mod snapshot;
mod utils;

use crate::utils::inspect;

#[derive(Debug)]
pub struct StoreAdapterSqlite {
	db: SqlitePool,
}

impl StoreAdapterSqlite {
	/// Opens (or creates) the database file at `path`
	pub async fn new(path: impl AsRef<Path>) -> CdResult<Self> {
		if let Some(parent) = path.as_ref().parent()
			&& !parent.as_os_str().is_empty()
		{
			tokio::fs::create_dir_all(parent).await?;
		}
		let opts = sqlite::SqliteConnectOptions::new().filename(path.as_ref());
		Self::connect_with(opts).await
	}

	/// Opens a database from a DSN, either a `sqlite:` URL or a plain file path
	pub async fn from_dsn(dsn: &str) -> CdResult<Self> {
		if dsn.starts_with("sqlite:") {
			let opts = sqlite::SqliteConnectOptions::from_str(dsn)
				.map_err(|err| Error::ConfigError(format!("invalid DB_DSN: {}", err)))?;
			Self::connect_with(opts).await
		} else {
			Self::new(dsn).await
		}
	}

	async fn connect_with(opts: sqlite::SqliteConnectOptions) -> CdResult<Self> {
		let opts = opts
			.create_if_missing(true)
			.foreign_keys(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal);
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(5)
			.connect_with(opts)
			.await
			.inspect_err(inspect)
			.or(Err(Error::DbError))?;

		schema::init_db(&db).await.inspect_err(inspect).or(Err(Error::DbError))?;

		Ok(Self { db })
	}
}

#[async_trait]
impl MetaAdapter for StoreAdapterSqlite {
	// Documents
	//***********
	async fn create_document(&self, doc_id: &DocId, title: &str) -> CdResult<Document> {
		document::create(&self.db, doc_id, title).await
	}

	async fn read_document(&self, doc_id: &DocId) -> CdResult<Document> {
		document::read(&self.db, doc_id).await
	}

	async fn update_document_title(&self, doc_id: &DocId, title: &str) -> CdResult<Document> {
		document::update_title(&self.db, doc_id, title).await
	}

	async fn delete_document(&self, doc_id: &DocId) -> CdResult<()> {
		document::delete(&self.db, doc_id).await
	}

	// Comments
	//**********
	async fn list_comments(&self, doc_id: &DocId) -> CdResult<Vec<Comment>> {
		comment::list(&self.db, doc_id).await
	}

	async fn create_comment(
		&self,
		doc_id: &DocId,
		comment: &CreateCommentData<'_>,
	) -> CdResult<Comment> {
		comment::create(&self.db, doc_id, comment).await
	}

	async fn update_comment(
		&self,
		doc_id: &DocId,
		comment_id: &str,
		data: &UpdateCommentData,
	) -> CdResult<Comment> {
		comment::update(&self.db, doc_id, comment_id, data).await
	}

	// Health
	//********
	async fn ping(&self) -> CdResult<()> {
		sqlx::query("SELECT 1")
			.execute(&self.db)
			.await
			.inspect_err(inspect)
			.map_err(|_| Error::DbError)?;
		Ok(())
	}
}

#[async_trait]
impl SnapshotAdapter for StoreAdapterSqlite {
	async fn read_snapshot(&self, doc_id: &DocId) -> CdResult<Option<Vec<u8>>> {
		snapshot::read(&self.db, doc_id).await
	}

	async fn upsert_snapshot(&self, doc_id: &DocId, data: &[u8]) -> CdResult<()> {
		snapshot::upsert(&self.db, doc_id, data).await
	}

	async fn append_update(&self, doc_id: &DocId, update: &[u8]) -> CdResult<()> {
		snapshot::append_update(&self.db, doc_id, update).await
	}

	async fn list_updates(&self, doc_id: &DocId) -> CdResult<Vec<Vec<u8>>> {
		snapshot::list_updates(&self.db, doc_id).await
	}
}

// vim: ts=4
