//! Error type shared by the relay, the adapters and the HTTP layer.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::prelude::*;

pub type CdResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	NotFound,
	ValidationError(String),
	BadRequest(String),
	DbError,

	// relay
	ConnectionClosed,
	Transport(String),
	ShuttingDown,

	Unavailable(String),
	ConfigError(String),
	Internal(String),

	// externals
	Io(std::io::Error),
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		warn!("serde_json error: {}", err);
		Self::BadRequest(err.to_string())
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Error::NotFound => write!(f, "not found"),
			Error::ValidationError(msg) => write!(f, "validation error: {}", msg),
			Error::BadRequest(msg) => write!(f, "bad request: {}", msg),
			Error::DbError => write!(f, "database error"),
			Error::ConnectionClosed => write!(f, "connection closed"),
			Error::Transport(msg) => write!(f, "transport error: {}", msg),
			Error::ShuttingDown => write!(f, "shutting down"),
			Error::Unavailable(msg) => write!(f, "unavailable: {}", msg),
			Error::ConfigError(msg) => write!(f, "configuration error: {}", msg),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(err) => write!(f, "I/O error: {}", err),
		}
	}
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error: ErrorDetails,
}

#[derive(Debug, Serialize)]
struct ErrorDetails {
	code: &'static str,
	message: String,
}

impl Error {
	/// Status code and machine readable error code for the HTTP layer
	pub fn status(&self) -> (StatusCode, &'static str) {
		match self {
			Error::NotFound => (StatusCode::NOT_FOUND, "not_found"),
			Error::ValidationError(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
			Error::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
			Error::ShuttingDown | Error::Unavailable(_) => {
				(StatusCode::SERVICE_UNAVAILABLE, "unavailable")
			}
			_ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
		}
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> axum::response::Response {
		let (status, code) = self.status();
		let message = match self {
			Error::NotFound => "Not found".to_string(),
			Error::ValidationError(msg) | Error::BadRequest(msg) | Error::Unavailable(msg) => msg,
			Error::ShuttingDown => "Server is shutting down".to_string(),
			err => {
				// Internal details stay in the log
				error!("Internal error: {}", err);
				"Internal server error".to_string()
			}
		};
		(status, Json(ErrorBody { error: ErrorDetails { code, message } })).into_response()
	}
}


// vim: ts=4
