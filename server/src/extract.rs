//! Request extractors with errors rendered in the API error format

use axum::extract::{FromRequest, FromRequestParts, Json, Path, Request, rejection::JsonRejection};
use axum::http::request::Parts;
use std::collections::HashMap;

use crate::prelude::*;

// DocIdParam //
//************//

/// The `{doc_id}` path segment, which must be a UUID v4
#[derive(Clone, Debug)]
pub struct DocIdParam(pub DocId);

impl<S> FromRequestParts<S> for DocIdParam
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
		let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
			.await
			.map_err(|_| Error::ValidationError("invalid docId".to_string()))?;
		let doc_id = params.get("doc_id").map(String::as_str).unwrap_or_default();
		Ok(DocIdParam(DocId::parse_v4(doc_id)?))
	}
}

// JsonBody //
//**********//

/// JSON request body; any decoding failure becomes a `bad_request` error
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
	Json<T>: FromRequest<S, Rejection = JsonRejection>,
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
		match Json::<T>::from_request(req, state).await {
			Ok(Json(value)) => Ok(JsonBody(value)),
			Err(err) => {
				debug!("Rejected request body: {}", err.body_text());
				Err(Error::BadRequest("Invalid JSON body".to_string()))
			}
		}
	}
}

// vim: ts=4
