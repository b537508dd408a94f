//! Per-connection session driver
//!
//! A session joins the document room, sends the stored snapshot, then reads frames
//! from the participant until the transport fails, the participant leaves or the
//! connection is closed from the server side. Inbound frames are size checked,
//! persisted where applicable and broadcast to the rest of the room.
//!
//! ```text
//! Connecting -> Active -> Closing -> Closed
//! ```

use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes, close_code};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio_tungstenite::tungstenite;

use crate::connection::Connection;
use crate::prelude::*;
use crate::protocol::{self, Frame, Inbound, ServerMessage};
use crate::relay::Relay;
use crate::room::Room;

/// Validated join request
#[derive(Debug, Clone)]
pub struct JoinParams {
	pub doc_id: DocId,
	pub name: Box<str>,
}

impl JoinParams {
	pub fn parse(doc_id: Option<&str>, name: Option<&str>) -> CdResult<Self> {
		let doc_id = DocId::parse(doc_id.unwrap_or_default())?;
		let name = name.map(str::trim).unwrap_or_default();
		if name.is_empty() {
			return Err(Error::ValidationError("name required".to_string()));
		}
		Ok(Self { doc_id, name: name.into() })
	}
}

/// Frame rejected by the transport read limit
fn is_capacity_error(err: &axum::Error) -> bool {
	std::error::Error::source(err)
		.and_then(|source| source.downcast_ref::<tungstenite::Error>())
		.is_some_and(|err| matches!(err, tungstenite::Error::Capacity(_)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Connecting,
	Active,
	Closing,
	Closed,
}

pub(crate) struct Session<'a> {
	relay: &'a Relay,
	params: JoinParams,
	conn: Arc<Connection>,
	state: SessionState,
}

impl<'a> Session<'a> {
	pub(crate) fn new(relay: &'a Relay, params: JoinParams, conn: Arc<Connection>) -> Self {
		Self { relay, params, conn, state: SessionState::Connecting }
	}

	fn transition(&mut self, next: SessionState) {
		debug!(doc_id = %self.params.doc_id, conn_id = %self.conn.id(), from = ?self.state, to = ?next, "Session state");
		self.state = next;
	}

	pub(crate) async fn run<S>(mut self, mut inbound: S)
	where
		S: Stream<Item = Result<Message, axum::Error>> + Unpin,
	{
		let room = match self.relay.hub().get_or_create_room(&self.params.doc_id) {
			Ok(room) => room,
			Err(err) => {
				info!(doc_id = %self.params.doc_id, "Join rejected: {}", err);
				let _ = self.conn.close_with(close_code::AWAY, "server shutting down").await;
				self.transition(SessionState::Closed);
				return;
			}
		};

		self.join(&room).await;
		self.read_loop(&room, &mut inbound).await;
		self.leave(&room).await;
	}

	async fn join(&mut self, room: &Room) {
		info!(doc_id = %self.params.doc_id, conn_id = %self.conn.id(), name = %self.params.name, "Participant connected");

		// Broadcasts for us are held by the room until the snapshot is out
		room.register_pending(self.conn.clone()).await;
		if let Some(frame) = self.load_snapshot().await
			&& let Err(err) = self.conn.send(frame).await
		{
			debug!(conn_id = %self.conn.id(), "Failed to send snapshot: {}", err);
		}
		room.activate(self.conn.id());

		self.transition(SessionState::Active);
	}

	async fn load_snapshot(&self) -> Option<Frame> {
		let store = self.relay.snapshots()?;
		match store.read_snapshot(&self.params.doc_id).await {
			Ok(Some(snapshot)) if !snapshot.is_empty() => {
				ServerMessage::snapshot(&snapshot).to_frame().ok()
			}
			Ok(_) => None,
			Err(err) => {
				warn!(doc_id = %self.params.doc_id, "Failed to read snapshot: {}", err);
				None
			}
		}
	}

	async fn read_loop<S>(&mut self, room: &Room, inbound: &mut S)
	where
		S: Stream<Item = Result<Message, axum::Error>> + Unpin,
	{
		let relay = self.relay;
		let limits = relay.config();
		loop {
			let msg = tokio::select! {
				() = self.conn.closed() => break,
				msg = inbound.next() => msg,
			};

			match msg {
				Some(Ok(Message::Binary(data))) => {
					if data.len() > limits.max_binary_bytes {
						self.reject_oversized("binary message too large", data.len()).await;
						break;
					}
					self.on_binary(room, data).await;
				}
				Some(Ok(Message::Text(text))) => {
					if text.as_str().len() > limits.max_text_bytes {
						self.reject_oversized("text message too large", text.as_str().len()).await;
						break;
					}
					self.on_text(room, text).await;
				}
				Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
				Some(Ok(Message::Close(_))) | None => break,
				Some(Err(err)) if is_capacity_error(&err) => {
					self.reject_oversized("message too large", limits.read_limit()).await;
					break;
				}
				Some(Err(err)) => {
					debug!(conn_id = %self.conn.id(), "Read error: {}", err);
					break;
				}
			}
		}
	}

	async fn reject_oversized(&mut self, reason: &str, size: usize) {
		info!(doc_id = %self.params.doc_id, conn_id = %self.conn.id(), size = size, "Closing connection: {}", reason);
		self.transition(SessionState::Closing);
		let _ = self.conn.close_with(close_code::SIZE, reason).await;
	}

	async fn on_binary(&self, room: &Room, data: Bytes) {
		if !data.is_empty()
			&& let Some(store) = self.relay.snapshots()
			&& let Err(err) = store.append_update(&self.params.doc_id, &data).await
		{
			warn!(doc_id = %self.params.doc_id, "Failed to append update: {}", err);
		}
		room.broadcast(self.conn.id(), Frame::Binary(data));
	}

	async fn on_text(&self, room: &Room, text: Utf8Bytes) {
		match protocol::decode_text(text.as_str()) {
			Inbound::Snapshot(snapshot) => {
				if let Some(store) = self.relay.snapshots()
					&& let Err(err) = store.upsert_snapshot(&self.params.doc_id, &snapshot).await
				{
					warn!(doc_id = %self.params.doc_id, "Failed to store snapshot: {}", err);
				}
				room.broadcast(self.conn.id(), Frame::Text(text));
			}
			Inbound::Relay(kind) => {
				debug!(conn_id = %self.conn.id(), kind = kind.as_str(), "Relaying text frame");
				room.broadcast(self.conn.id(), Frame::Text(text));
			}
			Inbound::Ignore => {
				debug!(conn_id = %self.conn.id(), "Ignoring text frame");
			}
		}
	}

	async fn leave(&mut self, room: &Room) {
		if self.state != SessionState::Closing {
			self.transition(SessionState::Closing);
		}
		room.unregister(self.conn.id());
		let _ = self.conn.close().await;

		match ServerMessage::presence_leave(&self.params.name).to_frame() {
			Ok(frame) => {
				room.broadcast(self.conn.id(), frame);
			}
			Err(err) => warn!("Failed to build leave frame: {}", err),
		}

		info!(doc_id = %self.params.doc_id, conn_id = %self.conn.id(), name = %self.params.name, "Participant disconnected");
		self.transition(SessionState::Closed);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::connection::tests::test_conn;
	use crate::relay::RelayConfig;
	use async_trait::async_trait;
	use collabdocs_types::snapshot_adapter::SnapshotAdapter;
	use futures::channel::mpsc;
	use parking_lot::Mutex;
	use std::collections::HashMap;
	use std::time::Duration;

	const WAIT: Duration = Duration::from_secs(2);

	#[derive(Debug, Default)]
	struct MemoryStore {
		snapshots: Mutex<HashMap<DocId, Vec<u8>>>,
		updates: Mutex<Vec<(DocId, Vec<u8>)>>,
		read_delay: Mutex<Option<Duration>>,
		fail: bool,
	}

	#[async_trait]
	impl SnapshotAdapter for MemoryStore {
		async fn read_snapshot(&self, doc_id: &DocId) -> CdResult<Option<Vec<u8>>> {
			let delay = *self.read_delay.lock();
			if let Some(delay) = delay {
				tokio::time::sleep(delay).await;
			}
			Ok(self.snapshots.lock().get(doc_id).cloned())
		}

		async fn upsert_snapshot(&self, doc_id: &DocId, snapshot: &[u8]) -> CdResult<()> {
			if self.fail {
				return Err(Error::DbError);
			}
			self.snapshots.lock().insert(doc_id.clone(), snapshot.to_vec());
			Ok(())
		}

		async fn append_update(&self, doc_id: &DocId, update: &[u8]) -> CdResult<()> {
			if self.fail {
				return Err(Error::DbError);
			}
			self.updates.lock().push((doc_id.clone(), update.to_vec()));
			Ok(())
		}

		async fn list_updates(&self, doc_id: &DocId) -> CdResult<Vec<Vec<u8>>> {
			Ok(self
				.updates
				.lock()
				.iter()
				.filter(|(id, _)| id == doc_id)
				.map(|(_, data)| data.clone())
				.collect())
		}
	}

	type Inbox = mpsc::UnboundedSender<Result<Message, axum::Error>>;
	type Outbox = mpsc::UnboundedReceiver<Message>;

	struct Peer {
		conn: Arc<Connection>,
		inbox: Inbox,
		outbox: Outbox,
		task: tokio::task::JoinHandle<()>,
	}

	impl Peer {
		fn send(&self, msg: Message) {
			self.inbox.unbounded_send(Ok(msg)).unwrap();
		}

		async fn recv(&mut self) -> Message {
			tokio::time::timeout(WAIT, self.outbox.next()).await.unwrap().unwrap()
		}
	}

	fn relay_with(store: Option<Arc<MemoryStore>>, config: RelayConfig) -> Arc<Relay> {
		let store = store.map(|store| store as Arc<dyn SnapshotAdapter>);
		Arc::new(Relay::new(config, store))
	}

	/// Starts a session and waits until it is registered in its room
	async fn join(relay: &Arc<Relay>, doc: &DocId, name: &str) -> Peer {
		let (conn, outbox) = test_conn(name);
		let (inbox, inbound) = mpsc::unbounded();
		let params = JoinParams::parse(Some(doc.as_str()), Some(name)).unwrap();
		let task = {
			let relay = relay.clone();
			let conn = conn.clone();
			tokio::spawn(async move { relay.run_session(params, conn, inbound).await })
		};

		let room = relay.hub().get_or_create_room(doc).unwrap();
		tokio::time::timeout(WAIT, async {
			while !room.participants().await.contains(conn.id()) {
				tokio::time::sleep(Duration::from_millis(5)).await;
			}
		})
		.await
		.unwrap();

		Peer { conn, inbox, outbox, task }
	}

	fn text(s: &str) -> Message {
		Message::Text(s.to_string().into())
	}

	#[test]
	fn test_join_params() {
		let doc = DocId::new_v4();
		let params = JoinParams::parse(Some(doc.as_str()), Some("  Ann ")).unwrap();
		assert_eq!(&*params.name, "Ann");
		assert_eq!(params.doc_id, doc);

		assert!(matches!(
			JoinParams::parse(Some("nope"), Some("Ann")),
			Err(Error::ValidationError(msg)) if msg == "invalid docId"
		));
		assert!(matches!(
			JoinParams::parse(Some(doc.as_str()), Some("   ")),
			Err(Error::ValidationError(msg)) if msg == "name required"
		));
		assert!(JoinParams::parse(None, Some("Ann")).is_err());
		assert!(JoinParams::parse(Some(doc.as_str()), None).is_err());
	}

	#[tokio::test]
	async fn test_binary_is_persisted_and_relayed() {
		let store = Arc::new(MemoryStore::default());
		let relay = relay_with(Some(store.clone()), RelayConfig::default());
		let doc = DocId::new_v4();
		let mut a = join(&relay, &doc, "a").await;
		let mut b = join(&relay, &doc, "b").await;

		a.send(Message::Binary(vec![1, 2, 3].into()));
		assert_eq!(b.recv().await, Message::Binary(vec![1, 2, 3].into()));
		assert_eq!(store.list_updates(&doc).await.unwrap(), vec![vec![1, 2, 3]]);

		b.send(text(r#"{"type":"presence","name":"b"}"#));
		assert_eq!(a.recv().await, text(r#"{"type":"presence","name":"b"}"#));
	}

	#[tokio::test]
	async fn test_unrecognized_text_is_not_relayed() {
		let store = Arc::new(MemoryStore::default());
		let relay = relay_with(Some(store.clone()), RelayConfig::default());
		let doc = DocId::new_v4();
		let a = join(&relay, &doc, "a").await;
		let mut b = join(&relay, &doc, "b").await;

		a.send(text(r#"{"type":"cursor","x":1}"#));
		a.send(text(r#"{"type":7}"#));
		a.send(text(r#"{"dataB64":"AQID"}"#));
		a.send(text("garbage"));
		a.send(text(r#"{"type":"snapshot","dataB64":""}"#));
		a.send(text(r#"{"type":"snapshot","dataB64":"***"}"#));
		a.send(text(r#"{"type":"comment:add","id":"c1"}"#));

		// FIFO per room: the first relayed frame is the comment
		assert_eq!(b.recv().await, text(r#"{"type":"comment:add","id":"c1"}"#));
		assert!(store.snapshots.lock().is_empty());
		assert!(store.updates.lock().is_empty());
	}

	#[tokio::test]
	async fn test_snapshot_frame_is_stored_and_relayed_verbatim() {
		let store = Arc::new(MemoryStore::default());
		let relay = relay_with(Some(store.clone()), RelayConfig::default());
		let doc = DocId::new_v4();
		let a = join(&relay, &doc, "a").await;
		let mut b = join(&relay, &doc, "b").await;

		let frame = r#"{"type":"snapshot","dataB64":"AQID","extra":true}"#;
		a.send(text(frame));

		assert_eq!(b.recv().await, text(frame));
		assert_eq!(store.read_snapshot(&doc).await.unwrap(), Some(vec![1, 2, 3]));
	}

	#[tokio::test]
	async fn test_snapshot_sent_before_broadcasts() {
		let store = Arc::new(MemoryStore::default());
		let doc = DocId::new_v4();
		store.snapshots.lock().insert(doc.clone(), vec![9, 9]);
		let relay = relay_with(Some(store.clone()), RelayConfig::default());

		let a = join(&relay, &doc, "a").await;
		let mut b = join(&relay, &doc, "b").await;
		a.send(text(r#"{"type":"presence","name":"a"}"#));

		assert_eq!(b.recv().await, text(r#"{"type":"snapshot","dataB64":"CQk="}"#));
		assert_eq!(b.recv().await, text(r#"{"type":"presence","name":"a"}"#));
	}

	#[tokio::test]
	async fn test_slow_snapshot_read_does_not_delay_room() {
		let store = Arc::new(MemoryStore::default());
		let doc = DocId::new_v4();
		store.snapshots.lock().insert(doc.clone(), vec![9, 9]);
		let relay = relay_with(Some(store.clone()), RelayConfig::default());
		let a = join(&relay, &doc, "a").await;
		let mut b = join(&relay, &doc, "b").await;
		assert_eq!(b.recv().await, text(r#"{"type":"snapshot","dataB64":"CQk="}"#));

		*store.read_delay.lock() = Some(Duration::from_secs(1));
		let mut c = join(&relay, &doc, "c").await;
		a.send(text(r#"{"type":"presence","name":"a"}"#));

		// b is served while c is still waiting for its snapshot
		let msg = tokio::time::timeout(Duration::from_millis(500), b.outbox.next()).await.unwrap();
		assert_eq!(msg, Some(text(r#"{"type":"presence","name":"a"}"#)));

		assert_eq!(c.recv().await, text(r#"{"type":"snapshot","dataB64":"CQk="}"#));
		assert_eq!(c.recv().await, text(r#"{"type":"presence","name":"a"}"#));
	}

	#[tokio::test]
	async fn test_persistence_failure_does_not_stop_relay() {
		let store = Arc::new(MemoryStore { fail: true, ..Default::default() });
		let relay = relay_with(Some(store), RelayConfig::default());
		let doc = DocId::new_v4();
		let a = join(&relay, &doc, "a").await;
		let mut b = join(&relay, &doc, "b").await;

		a.send(Message::Binary(vec![7].into()));
		a.send(text(r#"{"type":"snapshot","dataB64":"Bw=="}"#));

		assert_eq!(b.recv().await, Message::Binary(vec![7].into()));
		assert_eq!(b.recv().await, text(r#"{"type":"snapshot","dataB64":"Bw=="}"#));
		assert!(!a.conn.is_closed());
	}

	#[tokio::test]
	async fn test_oversized_binary_closes_connection() {
		let store = Arc::new(MemoryStore::default());
		let config = RelayConfig { max_binary_bytes: 8, ..Default::default() };
		let relay = relay_with(Some(store.clone()), config);
		let doc = DocId::new_v4();
		let mut a = join(&relay, &doc, "a").await;
		let mut b = join(&relay, &doc, "b").await;

		a.send(Message::Binary(vec![0; 9].into()));

		let Message::Close(Some(frame)) = a.recv().await else {
			panic!("expected close frame");
		};
		assert_eq!(frame.code, close_code::SIZE);
		assert_eq!(frame.reason.as_str(), "binary message too large");
		tokio::time::timeout(WAIT, &mut a.task).await.unwrap().unwrap();

		// the only thing b hears is the departure
		assert_eq!(
			b.recv().await,
			text(r##"{"type":"presence","name":"a","color":"#000000","typing":false,"cursor":null}"##)
		);
		assert!(store.updates.lock().is_empty());
	}

	#[tokio::test]
	async fn test_oversized_text_closes_connection() {
		let config = RelayConfig { max_text_bytes: 16, ..Default::default() };
		let relay = relay_with(None, config);
		let doc = DocId::new_v4();
		let mut a = join(&relay, &doc, "a").await;

		a.send(text(r#"{"type":"presence","name":"a"}"#));

		let Message::Close(Some(frame)) = a.recv().await else {
			panic!("expected close frame");
		};
		assert_eq!(frame.code, close_code::SIZE);
		assert_eq!(frame.reason.as_str(), "text message too large");
	}

	#[tokio::test]
	async fn test_transport_capacity_error_closes_with_size() {
		let relay = relay_with(None, RelayConfig::default());
		let doc = DocId::new_v4();
		let mut a = join(&relay, &doc, "a").await;

		let err = tungstenite::Error::Capacity(tungstenite::error::CapacityError::MessageTooLong {
			size: 10_000_000,
			max_size: relay.config().read_limit(),
		});
		a.inbox.unbounded_send(Err(axum::Error::new(err))).unwrap();

		let Message::Close(Some(frame)) = a.recv().await else {
			panic!("expected close frame");
		};
		assert_eq!(frame.code, close_code::SIZE);
		assert_eq!(frame.reason.as_str(), "message too large");
	}

	#[tokio::test]
	async fn test_abnormal_disconnect_announces_leave() {
		let relay = relay_with(None, RelayConfig::default());
		let doc = DocId::new_v4();
		let a = join(&relay, &doc, "Ann").await;
		let mut b = join(&relay, &doc, "b").await;

		a.inbox.unbounded_send(Err(axum::Error::new(std::io::Error::other("reset")))).unwrap();

		assert_eq!(
			b.recv().await,
			text(r##"{"type":"presence","name":"Ann","color":"#000000","typing":false,"cursor":null}"##)
		);
		tokio::time::timeout(WAIT, a.task).await.unwrap().unwrap();
		assert!(a.conn.is_closed());
		let room = relay.hub().get_or_create_room(&doc).unwrap();
		assert_eq!(room.participants().await, vec![b.conn.id().clone()]);
	}

	#[tokio::test]
	async fn test_shutdown_disconnects_sessions() {
		let relay = relay_with(None, RelayConfig::default());
		let doc = DocId::new_v4();
		let mut a = join(&relay, &doc, "a").await;
		let mut b = join(&relay, &doc, "b").await;

		assert_eq!(tokio::time::timeout(WAIT, relay.shutdown()).await.unwrap(), 1);

		assert!(matches!(a.recv().await, Message::Close(_)));
		assert!(matches!(b.recv().await, Message::Close(_)));
		tokio::time::timeout(WAIT, &mut a.task).await.unwrap().unwrap();
		tokio::time::timeout(WAIT, &mut b.task).await.unwrap().unwrap();

		// joining afterwards fails fast instead of hanging
		let (late, mut outbox) = test_conn("late");
		let (_inbox, inbound) = mpsc::unbounded::<Result<Message, axum::Error>>();
		let params = JoinParams::parse(Some(doc.as_str()), Some("late")).unwrap();
		tokio::time::timeout(WAIT, relay.run_session(params, late.clone(), inbound)).await.unwrap();
		assert!(late.is_closed());
		assert!(matches!(outbox.next().await, Some(Message::Close(_))));
		assert!(relay.hub().get_or_create_room(&doc).is_err());
	}

	#[tokio::test]
	async fn test_sender_never_receives_own_frames() {
		let relay = relay_with(None, RelayConfig::default());
		let doc = DocId::new_v4();
		let mut a = join(&relay, &doc, "a").await;
		let b = join(&relay, &doc, "b").await;

		a.send(text(r#"{"type":"presence","name":"a"}"#));
		b.send(text(r#"{"type":"presence","name":"b"}"#));

		assert_eq!(a.recv().await, text(r#"{"type":"presence","name":"b"}"#));
		assert_eq!(relay.stats().participants, 2);
	}
}

// vim: ts=4
