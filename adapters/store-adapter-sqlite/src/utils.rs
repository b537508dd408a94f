//! Shared utilities for the SQLite adapter
//!
//! Error mapping helpers used across the domain modules.

use collabdocs::prelude::*;
use sqlx::{Row, sqlite::SqliteRow};

/// Log database error for debugging
pub(crate) fn inspect(err: &sqlx::Error) {
	warn!("DB: {:#?}", err);
}

/// Map a single-row query result, translating SQL errors to CdResult
pub(crate) fn map_res<T, F>(row: Result<SqliteRow, sqlx::Error>, f: F) -> CdResult<T>
where
	F: FnOnce(SqliteRow) -> Result<T, sqlx::Error>,
{
	match row {
		Ok(row) => f(row).inspect_err(inspect).map_err(|_| Error::DbError),
		Err(sqlx::Error::RowNotFound) => Err(Error::NotFound),
		Err(err) => {
			inspect(&err);
			Err(Error::DbError)
		}
	}
}

/// Collect an iterator of row mapping results, translating errors
pub(crate) fn collect_res<T>(
	iter: impl Iterator<Item = Result<T, sqlx::Error>>,
) -> CdResult<Vec<T>> {
	let mut items = Vec::new();
	for item in iter {
		items.push(item.inspect_err(inspect).map_err(|_| Error::DbError)?);
	}
	Ok(items)
}

/// Map a write error, a violated reference to a document means the document is gone
pub(crate) fn map_write_err(err: sqlx::Error) -> Error {
	match &err {
		sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => Error::NotFound,
		_ => {
			inspect(&err);
			Error::DbError
		}
	}
}

/// Read a document id column
pub(crate) fn get_doc_id(row: &SqliteRow, column: &str) -> Result<DocId, sqlx::Error> {
	let id: String = row.try_get(column)?;
	DocId::parse(&id).map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

/// Read a unix seconds column
pub(crate) fn get_timestamp(row: &SqliteRow, column: &str) -> Result<Timestamp, sqlx::Error> {
	Ok(Timestamp(row.try_get(column)?))
}

// vim: ts=4
