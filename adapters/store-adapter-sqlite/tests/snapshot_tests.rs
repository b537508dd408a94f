//! Snapshot and update log tests

use collabdocs::error::Error;
use collabdocs::meta_adapter::MetaAdapter;
use collabdocs::snapshot_adapter::SnapshotAdapter;
use collabdocs::types::DocId;
use collabdocs_store_adapter_sqlite::StoreAdapterSqlite;
use tempfile::TempDir;

async fn create_test_adapter() -> (StoreAdapterSqlite, TempDir) {
	let temp_dir = TempDir::new().expect("Failed to create temp directory");

	let adapter = StoreAdapterSqlite::new(temp_dir.path().join("collabdocs.db"))
		.await
		.expect("Failed to create adapter");

	(adapter, temp_dir)
}

async fn create_doc(adapter: &StoreAdapterSqlite) -> DocId {
	let doc_id = DocId::new_v4();
	adapter.create_document(&doc_id, "Doc").await.expect("Failed to create document");
	doc_id
}

#[tokio::test]
async fn test_snapshot_absent_by_default() {
	let (adapter, _temp) = create_test_adapter().await;
	let doc_id = create_doc(&adapter).await;

	assert_eq!(adapter.read_snapshot(&doc_id).await.unwrap(), None);
}

#[tokio::test]
async fn test_snapshot_upsert_replaces() {
	let (adapter, _temp) = create_test_adapter().await;
	let doc_id = create_doc(&adapter).await;

	adapter.upsert_snapshot(&doc_id, &[1, 2, 3]).await.unwrap();
	assert_eq!(adapter.read_snapshot(&doc_id).await.unwrap(), Some(vec![1, 2, 3]));

	adapter.upsert_snapshot(&doc_id, &[9]).await.unwrap();
	assert_eq!(adapter.read_snapshot(&doc_id).await.unwrap(), Some(vec![9]));
}

#[tokio::test]
async fn test_empty_payloads_rejected() {
	let (adapter, _temp) = create_test_adapter().await;
	let doc_id = create_doc(&adapter).await;

	assert!(matches!(adapter.upsert_snapshot(&doc_id, &[]).await, Err(Error::ValidationError(_))));
	assert!(matches!(adapter.append_update(&doc_id, &[]).await, Err(Error::ValidationError(_))));
	assert_eq!(adapter.read_snapshot(&doc_id).await.unwrap(), None);
	assert!(adapter.list_updates(&doc_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_updates_kept_in_append_order() {
	let (adapter, _temp) = create_test_adapter().await;
	let doc_id = create_doc(&adapter).await;
	let other_doc = create_doc(&adapter).await;

	for i in 1..=5u8 {
		adapter.append_update(&doc_id, &[i, i]).await.unwrap();
	}
	adapter.append_update(&other_doc, &[42]).await.unwrap();

	let updates = adapter.list_updates(&doc_id).await.unwrap();
	assert_eq!(updates, (1..=5u8).map(|i| vec![i, i]).collect::<Vec<_>>());
	assert_eq!(adapter.list_updates(&other_doc).await.unwrap(), vec![vec![42]]);
}

#[tokio::test]
async fn test_writes_for_unknown_document_are_discarded() {
	let (adapter, _temp) = create_test_adapter().await;
	let doc_id = DocId::new_v4();

	adapter.upsert_snapshot(&doc_id, &[1]).await.expect("Upsert should be a no-op");
	adapter.append_update(&doc_id, &[2]).await.expect("Append should be a no-op");

	assert_eq!(adapter.read_snapshot(&doc_id).await.unwrap(), None);
	assert!(adapter.list_updates(&doc_id).await.unwrap().is_empty());
}

// vim: ts=4
