use axum::{
	Router,
	http::{HeaderName, HeaderValue, Method, StatusCode, header},
	routing::{get, patch, post},
};
use std::time::Duration;
use tower_http::{
	cors::{AllowOrigin, CorsLayer},
	timeout::TimeoutLayer,
	trace::TraceLayer,
};

use crate::prelude::*;
use crate::{comments, docs, health, websocket};

/// Upper bound for REST requests; websocket sessions are not affected
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const CORS_MAX_AGE: Duration = Duration::from_secs(300);

fn cors_layer(origins: &[Box<str>]) -> CdResult<CorsLayer> {
	let origins = origins
		.iter()
		.map(|origin| {
			HeaderValue::from_str(origin)
				.map_err(|_| Error::ConfigError(format!("invalid CORS origin: {}", origin)))
		})
		.collect::<CdResult<Vec<_>>>()?;

	Ok(CorsLayer::new()
		.allow_origin(AllowOrigin::list(origins))
		.allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
		.allow_headers([
			header::ACCEPT,
			header::AUTHORIZATION,
			header::CONTENT_TYPE,
			HeaderName::from_static("x-csrf-token"),
		])
		.allow_credentials(true)
		.max_age(CORS_MAX_AGE))
}

fn init_api() -> Router<App> {
	Router::new()
		.route("/docs", post(docs::handler::post_doc))
		.route(
			"/docs/{doc_id}",
			get(docs::handler::get_doc)
				.patch(docs::handler::patch_doc)
				.delete(docs::handler::delete_doc),
		)
		.route(
			"/docs/{doc_id}/comments",
			get(comments::handler::list_comments).post(comments::handler::post_comment),
		)
		.route("/docs/{doc_id}/comments/{comment_id}", patch(comments::handler::patch_comment))
		.route("/healthz", get(health::get_healthz))
		.route("/readyz", get(health::get_readyz))
		.route("/stats", get(health::get_stats))
		.layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, REQUEST_TIMEOUT))
}

fn init_ws() -> Router<App> {
	Router::new().route("/ws", get(websocket::get_ws))
}

pub fn init(app: App) -> CdResult<Router> {
	let cors = cors_layer(&app.opts.cors_origins)?;

	Ok(Router::new()
		.merge(init_api())
		.merge(init_ws())
		.layer(cors)
		.layer(TraceLayer::new_for_http())
		.with_state(app))
}

// vim: ts=4
