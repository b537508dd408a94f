//! Document records

use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use crate::utils::{get_doc_id, get_timestamp, inspect, map_res};
use collabdocs::meta_adapter::Document;
use collabdocs::prelude::*;

fn from_row(row: SqliteRow) -> Result<Document, sqlx::Error> {
	Ok(Document {
		id: get_doc_id(&row, "id")?,
		title: row.try_get::<String, _>("title")?.into(),
		created_at: get_timestamp(&row, "created_at")?,
		updated_at: get_timestamp(&row, "updated_at")?,
	})
}

pub(crate) async fn create(db: &SqlitePool, doc_id: &DocId, title: &str) -> CdResult<Document> {
	let now = Timestamp::now();
	sqlx::query("INSERT INTO docs (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)")
		.bind(doc_id.as_str())
		.bind(title)
		.bind(now.0)
		.execute(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	debug!(doc_id = %doc_id, "Document created");
	Ok(Document { id: doc_id.clone(), title: title.into(), created_at: now, updated_at: now })
}

pub(crate) async fn read(db: &SqlitePool, doc_id: &DocId) -> CdResult<Document> {
	let res = sqlx::query("SELECT id, title, created_at, updated_at FROM docs WHERE id = ?1")
		.bind(doc_id.as_str())
		.fetch_one(db)
		.await;
	map_res(res, from_row)
}

pub(crate) async fn update_title(
	db: &SqlitePool,
	doc_id: &DocId,
	title: &str,
) -> CdResult<Document> {
	let res = sqlx::query(
		"UPDATE docs SET title = ?2, updated_at = ?3 WHERE id = ?1
		RETURNING id, title, created_at, updated_at",
	)
	.bind(doc_id.as_str())
	.bind(title)
	.bind(Timestamp::now().0)
	.fetch_one(db)
	.await;
	map_res(res, from_row)
}

pub(crate) async fn delete(db: &SqlitePool, doc_id: &DocId) -> CdResult<()> {
	let res = sqlx::query("DELETE FROM docs WHERE id = ?1")
		.bind(doc_id.as_str())
		.execute(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	if res.rows_affected() == 0 {
		return Err(Error::NotFound);
	}
	debug!(doc_id = %doc_id, "Document deleted");
	Ok(())
}

// vim: ts=4
