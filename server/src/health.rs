//! Liveness, readiness and relay statistics

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::prelude::*;
use collabdocs_relay::hub::HubStats;

pub async fn get_healthz() -> (StatusCode, Json<Value>) {
	(StatusCode::OK, Json(json!({ "status": "ok" })))
}

pub async fn get_readyz(State(app): State<App>) -> CdResult<(StatusCode, Json<Value>)> {
	if let Err(err) = app.meta_adapter.ping().await {
		warn!("Readiness check failed: {}", err);
		return Err(Error::Unavailable("database unavailable".to_string()));
	}

	Ok((StatusCode::OK, Json(json!({ "status": "ready" }))))
}

pub async fn get_stats(State(app): State<App>) -> (StatusCode, Json<HubStats>) {
	(StatusCode::OK, Json(app.relay.stats()))
}

// vim: ts=4
