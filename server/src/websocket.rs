//! Websocket endpoint of the realtime relay

use axum::{
	extract::{
		Query, State,
		rejection::QueryRejection,
		ws::{WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
	},
	response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::prelude::*;
use collabdocs_relay::JoinParams;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinQuery {
	doc_id: Option<String>,
	name: Option<String>,
}

/// `GET /ws?docId=<uuid>&name=<display name>`
///
/// Join parameters are validated before the upgrade, so a bad request gets a
/// JSON error response instead of a websocket.
pub async fn get_ws(
	State(app): State<App>,
	query: Result<Query<JoinQuery>, QueryRejection>,
	ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
	let query = query.map(|Query(query)| query).unwrap_or_default();
	let params = match JoinParams::parse(query.doc_id.as_deref(), query.name.as_deref()) {
		Ok(params) => params,
		Err(err) => return err.into_response(),
	};
	let ws = match ws {
		Ok(ws) => ws,
		Err(rejection) => {
			debug!(doc_id = %params.doc_id, "Websocket upgrade rejected: {}", rejection.body_text());
			return rejection.into_response();
		}
	};

	let relay = app.relay.clone();
	let limit = relay.config().read_limit();
	ws.max_message_size(limit)
		.max_frame_size(limit)
		.on_upgrade(move |socket| async move { relay.serve(socket, params).await })
}

// vim: ts=4
