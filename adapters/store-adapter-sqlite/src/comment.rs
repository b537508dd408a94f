//! Comments anchored to text ranges of a document

use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use crate::utils::{collect_res, get_doc_id, get_timestamp, inspect, map_res, map_write_err};
use collabdocs::meta_adapter::{Comment, CreateCommentData, UpdateCommentData};
use collabdocs::prelude::*;

const COLUMNS: &str = "id, doc_id, author_name, from_pos, to_pos, text, resolved, created_at";

fn from_row(row: &SqliteRow) -> Result<Comment, sqlx::Error> {
	Ok(Comment {
		id: row.try_get::<String, _>("id")?.into(),
		doc_id: get_doc_id(row, "doc_id")?,
		author_name: row.try_get::<String, _>("author_name")?.into(),
		from_pos: row.try_get("from_pos")?,
		to_pos: row.try_get("to_pos")?,
		text: row.try_get::<String, _>("text")?.into(),
		resolved: row.try_get("resolved")?,
		created_at: get_timestamp(row, "created_at")?,
	})
}

/// Newest first, ties broken by insertion order
pub(crate) async fn list(db: &SqlitePool, doc_id: &DocId) -> CdResult<Vec<Comment>> {
	let rows = sqlx::query(&format!(
		"SELECT {} FROM doc_comments WHERE doc_id = ?1 ORDER BY created_at DESC, rowid DESC",
		COLUMNS
	))
	.bind(doc_id.as_str())
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	collect_res(rows.iter().map(from_row))
}

pub(crate) async fn create(
	db: &SqlitePool,
	doc_id: &DocId,
	comment: &CreateCommentData<'_>,
) -> CdResult<Comment> {
	let now = Timestamp::now();
	sqlx::query(
		"INSERT INTO doc_comments (id, doc_id, author_name, from_pos, to_pos, text, resolved, created_at)
		VALUES (?1, ?2, ?3, ?4, ?5, ?6, false, ?7)",
	)
	.bind(comment.id)
	.bind(doc_id.as_str())
	.bind(comment.author_name)
	.bind(comment.from_pos)
	.bind(comment.to_pos)
	.bind(comment.text)
	.bind(now.0)
	.execute(db)
	.await
	.map_err(map_write_err)?;

	debug!(doc_id = %doc_id, comment_id = %comment.id, "Comment created");
	Ok(Comment {
		id: comment.id.into(),
		doc_id: doc_id.clone(),
		author_name: comment.author_name.into(),
		from_pos: comment.from_pos,
		to_pos: comment.to_pos,
		text: comment.text.into(),
		resolved: false,
		created_at: now,
	})
}

pub(crate) async fn update(
	db: &SqlitePool,
	doc_id: &DocId,
	comment_id: &str,
	data: &UpdateCommentData,
) -> CdResult<Comment> {
	let res = sqlx::query(&format!(
		"UPDATE doc_comments SET resolved = COALESCE(?3, resolved), text = COALESCE(?4, text)
		WHERE id = ?1 AND doc_id = ?2
		RETURNING {}",
		COLUMNS
	))
	.bind(comment_id)
	.bind(doc_id.as_str())
	.bind(data.resolved)
	.bind(data.text.as_deref())
	.fetch_one(db)
	.await;

	map_res(res, |row| from_row(&row))
}

// vim: ts=4
