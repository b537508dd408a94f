//! Database schema initialization
//!
//! All statements are idempotent, so the schema is (re)applied on every start.

use sqlx::SqlitePool;

/// Initialize the database schema with all required tables and indexes
pub(crate) async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	// Documents
	//***********
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS docs (
		id text NOT NULL,
		title text NOT NULL,
		created_at integer NOT NULL DEFAULT (unixepoch()),
		updated_at integer NOT NULL DEFAULT (unixepoch()),
		PRIMARY KEY(id)
	)",
	)
	.execute(&mut *tx)
	.await?;

	// Comments
	//**********
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS doc_comments (
		id text NOT NULL,
		doc_id text NOT NULL REFERENCES docs(id) ON DELETE CASCADE,
		author_name text NOT NULL,
		from_pos integer NOT NULL CHECK (from_pos >= 0),
		to_pos integer NOT NULL CHECK (to_pos >= from_pos),
		text text NOT NULL,
		resolved boolean NOT NULL DEFAULT false,
		created_at integer NOT NULL DEFAULT (unixepoch()),
		PRIMARY KEY(id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_doc_comments_doc ON doc_comments(doc_id, created_at)",
	)
	.execute(&mut *tx)
	.await?;

	// Snapshots
	//***********
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS doc_snapshots (
		doc_id text NOT NULL REFERENCES docs(id) ON DELETE CASCADE,
		snapshot blob NOT NULL,
		updated_at integer NOT NULL DEFAULT (unixepoch()),
		PRIMARY KEY(doc_id)
	)",
	)
	.execute(&mut *tx)
	.await?;

	// Update log
	//************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS doc_updates (
		seq integer PRIMARY KEY AUTOINCREMENT,
		doc_id text NOT NULL REFERENCES docs(id) ON DELETE CASCADE,
		data blob NOT NULL,
		created_at integer NOT NULL DEFAULT (unixepoch())
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_doc_updates_doc ON doc_updates(doc_id, seq)")
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;
	Ok(())
}

// vim: ts=4
