//! Relay service: the hub, the snapshot store and the frame size limits

use axum::extract::ws::{Message, WebSocket};
use futures::{Stream, StreamExt};
use std::sync::Arc;

use crate::connection::Connection;
use crate::hub::{Hub, HubStats};
use crate::prelude::*;
use crate::room::RoomConfig;
use crate::session::{JoinParams, Session};
use collabdocs_types::snapshot_adapter::SnapshotAdapter;

#[derive(Clone, Debug)]
pub struct RelayConfig {
	pub max_binary_bytes: usize,
	pub max_text_bytes: usize,
	pub room: RoomConfig,
}

impl Default for RelayConfig {
	fn default() -> Self {
		Self { max_binary_bytes: 1024 * 1024, max_text_bytes: 64 * 1024, room: RoomConfig::default() }
	}
}

impl RelayConfig {
	/// Transport level read limit
	///
	/// Kept well above both frame ceilings so the session sees oversized frames and
	/// can close with the size code. Anything beyond it fails in the transport,
	/// which the session also reports as a size violation.
	pub fn read_limit(&self) -> usize {
		self.max_binary_bytes.max(self.max_text_bytes).saturating_mul(2)
	}
}

#[derive(Debug)]
pub struct Relay {
	hub: Hub,
	snapshots: Option<Arc<dyn SnapshotAdapter>>,
	config: RelayConfig,
}

impl Relay {
	pub fn new(config: RelayConfig, snapshots: Option<Arc<dyn SnapshotAdapter>>) -> Self {
		Self { hub: Hub::new(config.room.clone()), snapshots, config }
	}

	pub fn hub(&self) -> &Hub {
		&self.hub
	}

	pub fn config(&self) -> &RelayConfig {
		&self.config
	}

	pub(crate) fn snapshots(&self) -> Option<&dyn SnapshotAdapter> {
		self.snapshots.as_deref()
	}

	pub fn stats(&self) -> HubStats {
		self.hub.stats()
	}

	/// Drives an upgraded websocket until the participant leaves
	pub async fn serve(&self, socket: WebSocket, params: JoinParams) {
		let (sink, stream) = socket.split();
		let conn = Connection::new(Box::pin(sink));
		self.run_session(params, conn, stream).await;
	}

	/// Drives a session over an already split transport
	pub async fn run_session<S>(&self, params: JoinParams, conn: Arc<Connection>, inbound: S)
	where
		S: Stream<Item = Result<Message, axum::Error>> + Unpin,
	{
		Session::new(self, params, conn).run(inbound).await;
	}

	/// Closes every room, disconnecting all participants
	pub async fn shutdown(&self) -> usize {
		self.hub.shutdown_all().await
	}
}

// vim: ts=4
