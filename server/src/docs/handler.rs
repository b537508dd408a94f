use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::extract::{DocIdParam, JsonBody};
use crate::meta_adapter::Document;
use crate::prelude::*;
use crate::utils::{MAX_TITLE_LENGTH, check_max_chars, normalize_title};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateDocRequest {
	title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateDocRequest {
	title: String,
}

pub async fn post_doc(
	State(app): State<App>,
	JsonBody(req): JsonBody<CreateDocRequest>,
) -> CdResult<(StatusCode, Json<Document>)> {
	let title = normalize_title(req.title.as_deref())?;
	let doc_id = DocId::new_v4();

	let doc = app.meta_adapter.create_document(&doc_id, &title).await?;
	info!(doc_id = %doc.id, "Document created");

	Ok((StatusCode::OK, Json(doc)))
}

pub async fn get_doc(
	State(app): State<App>,
	DocIdParam(doc_id): DocIdParam,
) -> CdResult<(StatusCode, Json<Document>)> {
	let doc = app.meta_adapter.read_document(&doc_id).await?;

	Ok((StatusCode::OK, Json(doc)))
}

pub async fn patch_doc(
	State(app): State<App>,
	DocIdParam(doc_id): DocIdParam,
	JsonBody(req): JsonBody<UpdateDocRequest>,
) -> CdResult<(StatusCode, Json<Document>)> {
	let title = req.title.trim();
	if title.is_empty() {
		return Err(Error::ValidationError("title required".to_string()));
	}
	check_max_chars("title", title, MAX_TITLE_LENGTH)?;

	let doc = app.meta_adapter.update_document_title(&doc_id, title).await?;

	Ok((StatusCode::OK, Json(doc)))
}

pub async fn delete_doc(
	State(app): State<App>,
	DocIdParam(doc_id): DocIdParam,
) -> CdResult<(StatusCode, Json<Value>)> {
	app.meta_adapter.delete_document(&doc_id).await?;
	info!(doc_id = %doc_id, "Document deleted");

	Ok((StatusCode::OK, Json(json!({ "status": "deleted" }))))
}

// vim: ts=4
