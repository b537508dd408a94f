use axum::{Json, extract::Path, extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::extract::{DocIdParam, JsonBody};
use crate::meta_adapter::{CreateCommentData, UpdateCommentData};
use crate::prelude::*;
use crate::utils::{check_max_chars, parse_uuid_v4, random_id};

pub const MAX_AUTHOR_NAME_LENGTH: usize = 40;
pub const MAX_COMMENT_TEXT_LENGTH: usize = 2000;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateCommentRequest {
	author_name: String,
	from_pos: i64,
	to_pos: i64,
	text: String,
}

fn required<'a>(field: &str, value: &'a str, max: usize) -> CdResult<&'a str> {
	let value = value.trim();
	if value.is_empty() {
		return Err(Error::ValidationError(format!("{} required", field)));
	}
	check_max_chars(field, value, max)?;
	Ok(value)
}

pub async fn list_comments(
	State(app): State<App>,
	DocIdParam(doc_id): DocIdParam,
) -> CdResult<(StatusCode, Json<Value>)> {
	let comments = app.meta_adapter.list_comments(&doc_id).await?;

	Ok((StatusCode::OK, Json(json!({ "comments": comments }))))
}

pub async fn post_comment(
	State(app): State<App>,
	DocIdParam(doc_id): DocIdParam,
	JsonBody(req): JsonBody<CreateCommentRequest>,
) -> CdResult<(StatusCode, Json<Value>)> {
	let author_name = required("authorName", &req.author_name, MAX_AUTHOR_NAME_LENGTH)?;
	let text = required("text", &req.text, MAX_COMMENT_TEXT_LENGTH)?;
	if req.from_pos < 0 || req.to_pos < 0 {
		return Err(Error::ValidationError("positions must not be negative".to_string()));
	}
	if req.from_pos > req.to_pos {
		return Err(Error::ValidationError("fromPos must not exceed toPos".to_string()));
	}

	let comment_id = random_id();
	let comment = app
		.meta_adapter
		.create_comment(
			&doc_id,
			&CreateCommentData {
				id: &comment_id,
				author_name,
				from_pos: req.from_pos,
				to_pos: req.to_pos,
				text,
			},
		)
		.await?;
	debug!(doc_id = %doc_id, comment_id = %comment.id, "Comment created");

	Ok((StatusCode::OK, Json(json!({ "comment": comment }))))
}

pub async fn patch_comment(
	State(app): State<App>,
	DocIdParam(doc_id): DocIdParam,
	Path((_, comment_id)): Path<(String, String)>,
	JsonBody(mut data): JsonBody<UpdateCommentData>,
) -> CdResult<(StatusCode, Json<Value>)> {
	let comment_id = parse_uuid_v4("commentId", &comment_id)?;
	if data.resolved.is_none() && data.text.is_none() {
		return Err(Error::ValidationError("nothing to update".to_string()));
	}
	if let Some(text) = data.text.take() {
		let text = text.trim();
		check_max_chars("text", text, MAX_COMMENT_TEXT_LENGTH)?;
		data.text = Some(text.into());
	}

	let comment = app.meta_adapter.update_comment(&doc_id, &comment_id, &data).await?;

	Ok((StatusCode::OK, Json(json!({ "comment": comment }))))
}

// vim: ts=4
