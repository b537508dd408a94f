//! Document snapshots and the append-only update log
//!
//! Writes are conditional on the document existing, so a client still connected to
//! a deleted document cannot resurrect its rows.

use sqlx::{Row, SqlitePool};

use crate::utils::{inspect, map_write_err};
use collabdocs::prelude::*;

pub(crate) async fn read(db: &SqlitePool, doc_id: &DocId) -> CdResult<Option<Vec<u8>>> {
	let row = sqlx::query("SELECT snapshot FROM doc_snapshots WHERE doc_id = ?1")
		.bind(doc_id.as_str())
		.fetch_optional(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	match row {
		Some(row) => {
			Ok(Some(row.try_get("snapshot").inspect_err(inspect).map_err(|_| Error::DbError)?))
		}
		None => Ok(None),
	}
}

pub(crate) async fn upsert(db: &SqlitePool, doc_id: &DocId, snapshot: &[u8]) -> CdResult<()> {
	if snapshot.is_empty() {
		return Err(Error::ValidationError("empty snapshot".to_string()));
	}

	let res = sqlx::query(
		"INSERT INTO doc_snapshots (doc_id, snapshot, updated_at)
		SELECT ?1, ?2, ?3 WHERE EXISTS (SELECT 1 FROM docs WHERE id = ?1)
		ON CONFLICT(doc_id) DO UPDATE SET snapshot = excluded.snapshot, updated_at = excluded.updated_at",
	)
	.bind(doc_id.as_str())
	.bind(snapshot)
	.bind(Timestamp::now().0)
	.execute(db)
	.await
	.map_err(map_write_err)?;

	if res.rows_affected() == 0 {
		debug!(doc_id = %doc_id, "Snapshot for unknown document discarded");
	}
	Ok(())
}

pub(crate) async fn append_update(db: &SqlitePool, doc_id: &DocId, update: &[u8]) -> CdResult<()> {
	if update.is_empty() {
		return Err(Error::ValidationError("empty update".to_string()));
	}

	let res = sqlx::query(
		"INSERT INTO doc_updates (doc_id, data, created_at)
		SELECT ?1, ?2, ?3 WHERE EXISTS (SELECT 1 FROM docs WHERE id = ?1)",
	)
	.bind(doc_id.as_str())
	.bind(update)
	.bind(Timestamp::now().0)
	.execute(db)
	.await
	.map_err(map_write_err)?;

	if res.rows_affected() == 0 {
		debug!(doc_id = %doc_id, "Update for unknown document discarded");
	}
	Ok(())
}

pub(crate) async fn list_updates(db: &SqlitePool, doc_id: &DocId) -> CdResult<Vec<Vec<u8>>> {
	let rows = sqlx::query("SELECT data FROM doc_updates WHERE doc_id = ?1 ORDER BY seq")
		.bind(doc_id.as_str())
		.fetch_all(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	rows.iter()
		.map(|row| row.try_get("data"))
		.collect::<Result<Vec<Vec<u8>>, _>>()
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)
}

// vim: ts=4
