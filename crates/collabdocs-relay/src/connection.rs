//! A single participant's websocket connection
//!
//! Writes to the transport are serialized through a mutex around the sink, so the
//! room loop and the session can both send without interleaving. Closing cancels a
//! token first, which makes the closed state visible immediately even while a slow
//! write still holds the sink.

use axum::extract::ws::{CloseFrame, Message, close_code};
use futures::{Sink, SinkExt};
use std::{pin::Pin, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::prelude::*;
use crate::protocol::Frame;
use collabdocs_types::utils::random_id;

/// Upper bound for delivering the close frame to the peer
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

pub type WsSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;

/// Connection identifier, unique per session
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnId(Box<str>);

impl ConnId {
	pub fn new() -> Self {
		Self(random_id().into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Default for ConnId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for ConnId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for ConnId {
	fn from(id: &str) -> Self {
		Self(id.into())
	}
}

pub struct Connection {
	id: ConnId,
	sink: Mutex<Option<WsSink>>,
	closed: CancellationToken,
}

impl std::fmt::Debug for Connection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Connection")
			.field("id", &self.id)
			.field("closed", &self.closed.is_cancelled())
			.finish_non_exhaustive()
	}
}

impl Connection {
	pub fn new(sink: WsSink) -> Arc<Self> {
		Self::with_id(ConnId::new(), sink)
	}

	pub fn with_id(id: ConnId, sink: WsSink) -> Arc<Self> {
		Arc::new(Self { id, sink: Mutex::new(Some(sink)), closed: CancellationToken::new() })
	}

	pub fn id(&self) -> &ConnId {
		&self.id
	}

	pub fn is_closed(&self) -> bool {
		self.closed.is_cancelled()
	}

	/// Resolves once the connection has been closed, by anyone
	pub async fn closed(&self) {
		self.closed.cancelled().await;
	}

	/// Sends one frame, waiting for any in-flight write to finish first
	pub async fn send(&self, frame: Frame) -> CdResult<()> {
		let mut sink = self.sink.lock().await;
		if self.is_closed() {
			return Err(Error::ConnectionClosed);
		}
		let Some(sink) = sink.as_mut() else {
			return Err(Error::ConnectionClosed);
		};
		sink.send(frame.into()).await.map_err(|err| Error::Transport(err.to_string()))
	}

	/// Closes the connection with a normal close frame
	pub async fn close(&self) -> CdResult<()> {
		self.close_with(close_code::NORMAL, "").await
	}

	/// Closes the connection with the given close code and reason
	///
	/// Only the first call sends a close frame, later calls return `Ok(())`.
	pub async fn close_with(&self, code: u16, reason: &str) -> CdResult<()> {
		self.closed.cancel();

		let close = async {
			let Some(mut sink) = self.sink.lock().await.take() else {
				return;
			};
			let frame = CloseFrame { code, reason: reason.to_string().into() };
			// The peer may already be gone
			let _ = sink.send(Message::Close(Some(frame))).await;
			let _ = sink.close().await;
			debug!(conn_id = %self.id, code = code, "Connection closed");
		};
		if tokio::time::timeout(CLOSE_TIMEOUT, close).await.is_err() {
			debug!(conn_id = %self.id, "Timed out sending close frame");
		}
		Ok(())
	}
}


// vim: ts=4
