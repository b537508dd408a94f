//! Per-document broadcast room
//!
//! Each room is an actor: one spawned task owns the participant set and processes
//! register/unregister commands and broadcast messages one at a time. Commands travel
//! over an unbounded control channel, broadcasts over a bounded mailbox that drops
//! new messages when full instead of blocking the sender.
//!
//! A participant can join as pending: frames for it are held in a backlog until the
//! session activates it, which lets the session send the stored snapshot first
//! without blocking delivery to everyone else.

use axum::extract::ws::close_code;
use std::{
	collections::{HashMap, VecDeque},
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
use tokio::{
	sync::{mpsc, oneshot},
	task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::connection::{ConnId, Connection};
use crate::prelude::*;
use crate::protocol::Frame;

/// Room configuration
#[derive(Clone, Debug)]
pub struct RoomConfig {
	/// Maximum number of broadcasts waiting for delivery
	pub mailbox_capacity: usize,
	/// Upper bound for a single recipient write
	pub send_timeout: Duration,
}

impl Default for RoomConfig {
	fn default() -> Self {
		Self { mailbox_capacity: 256, send_timeout: Duration::from_secs(10) }
	}
}

/// A frame queued for every participant except its sender
#[derive(Clone, Debug)]
pub struct BroadcastMessage {
	pub sender: ConnId,
	pub frame: Frame,
}

/// Outcome of [`Room::broadcast`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
	Queued,
	/// Mailbox full, message discarded
	Dropped,
	/// Room closed, message discarded
	Closed,
}

enum Control {
	Register { conn: Arc<Connection>, pending: bool },
	Activate(ConnId),
	Unregister(ConnId),
	Participants(oneshot::Sender<Vec<ConnId>>),
}

struct RoomInner {
	doc_id: DocId,
	control_tx: mpsc::UnboundedSender<Control>,
	mailbox_tx: mpsc::Sender<BroadcastMessage>,
	cancel: CancellationToken,
	task: parking_lot::Mutex<Option<JoinHandle<()>>>,
	participants: Arc<AtomicUsize>,
}

/// Handle to a running room. Clones refer to the same room.
#[derive(Clone)]
pub struct Room {
	inner: Arc<RoomInner>,
}

impl std::fmt::Debug for Room {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Room")
			.field("doc_id", &self.inner.doc_id)
			.field("participants", &self.participant_count())
			.field("closed", &self.is_closed())
			.finish()
	}
}

impl Room {
	/// Creates a room and spawns its event loop on the current runtime
	pub fn spawn(doc_id: DocId, config: &RoomConfig) -> Self {
		let (control_tx, control_rx) = mpsc::unbounded_channel();
		let (mailbox_tx, mailbox_rx) = mpsc::channel(config.mailbox_capacity.max(1));
		let cancel = CancellationToken::new();
		let participants = Arc::new(AtomicUsize::new(0));

		let room_loop = RoomLoop {
			doc_id: doc_id.clone(),
			participants: HashMap::new(),
			count: participants.clone(),
			backlog_limit: config.mailbox_capacity.max(1),
			control_rx,
			mailbox_rx,
			cancel: cancel.clone(),
			send_timeout: config.send_timeout,
		};
		let task = tokio::spawn(room_loop.run());

		Self {
			inner: Arc::new(RoomInner {
				doc_id,
				control_tx,
				mailbox_tx,
				cancel,
				task: parking_lot::Mutex::new(Some(task)),
				participants,
			}),
		}
	}

	pub fn doc_id(&self) -> &DocId {
		&self.inner.doc_id
	}

	pub fn is_closed(&self) -> bool {
		self.inner.cancel.is_cancelled()
	}

	/// Number of registered participants as last seen by the room loop
	pub fn participant_count(&self) -> usize {
		self.inner.participants.load(Ordering::Relaxed)
	}

	/// Returns true if both handles refer to the same room
	pub fn ptr_eq(a: &Room, b: &Room) -> bool {
		Arc::ptr_eq(&a.inner, &b.inner)
	}

	/// Adds a connection to the room
	///
	/// Takes effect once the room loop processes it. A closed room closes the
	/// connection instead.
	pub async fn register(&self, conn: Arc<Connection>) {
		self.send_register(conn, false).await;
	}

	/// Adds a connection whose frames are held back until [`Room::activate`]
	pub async fn register_pending(&self, conn: Arc<Connection>) {
		self.send_register(conn, true).await;
	}

	/// Delivers the backlog of a pending participant and starts direct delivery
	pub fn activate(&self, conn_id: &ConnId) {
		let _ = self.inner.control_tx.send(Control::Activate(conn_id.clone()));
	}

	async fn send_register(&self, conn: Arc<Connection>, pending: bool) {
		if let Err(mpsc::error::SendError(cmd)) = self.inner.control_tx.send(Control::Register { conn, pending })
			&& let Control::Register { conn, .. } = cmd
		{
			debug!(doc_id = %self.inner.doc_id, conn_id = %conn.id(), "Register on closed room");
			let _ = conn.close_with(close_code::AWAY, "room closed").await;
		}
	}

	/// Removes and closes a participant, no-op if it is not registered
	pub fn unregister(&self, conn_id: &ConnId) {
		let _ = self.inner.control_tx.send(Control::Unregister(conn_id.clone()));
	}

	/// Queues a frame for every participant except `sender`, never blocks
	pub fn broadcast(&self, sender: &ConnId, frame: Frame) -> Delivery {
		if self.is_closed() {
			return Delivery::Closed;
		}
		let msg = BroadcastMessage { sender: sender.clone(), frame };
		match self.inner.mailbox_tx.try_send(msg) {
			Ok(()) => Delivery::Queued,
			Err(mpsc::error::TrySendError::Full(msg)) => {
				debug!(doc_id = %self.inner.doc_id, sender = %msg.sender, kind = %msg.frame.kind(), "Room mailbox full, dropping message");
				Delivery::Dropped
			}
			Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
		}
	}

	/// Participant ids, answered by the room loop after every earlier command
	pub async fn participants(&self) -> Vec<ConnId> {
		let (tx, rx) = oneshot::channel();
		if self.inner.control_tx.send(Control::Participants(tx)).is_err() {
			return Vec::new();
		}
		rx.await.unwrap_or_default()
	}

	/// Stops the room loop and closes every participant
	///
	/// Waits for the loop to finish. Calling it again is a no-op.
	pub async fn close(&self) {
		self.inner.cancel.cancel();
		let task = self.inner.task.lock().take();
		if let Some(task) = task
			&& let Err(err) = task.await
		{
			warn!(doc_id = %self.inner.doc_id, "Room task failed: {}", err);
		}
	}
}

struct Participant {
	conn: Arc<Connection>,
	/// Frames held back while the participant is pending
	backlog: Option<VecDeque<Frame>>,
}

struct RoomLoop {
	doc_id: DocId,
	participants: HashMap<ConnId, Participant>,
	count: Arc<AtomicUsize>,
	backlog_limit: usize,
	control_rx: mpsc::UnboundedReceiver<Control>,
	mailbox_rx: mpsc::Receiver<BroadcastMessage>,
	cancel: CancellationToken,
	send_timeout: Duration,
}

async fn send_frame(doc_id: &DocId, send_timeout: Duration, conn_id: &ConnId, conn: &Connection, frame: Frame) {
	match tokio::time::timeout(send_timeout, conn.send(frame)).await {
		Ok(Ok(())) => {}
		Ok(Err(err)) => {
			debug!(doc_id = %doc_id, conn_id = %conn_id, "Delivery failed: {}", err);
		}
		Err(_) => {
			warn!(doc_id = %doc_id, conn_id = %conn_id, "Delivery timed out");
		}
	}
}

impl RoomLoop {
	async fn run(mut self) {
		debug!(doc_id = %self.doc_id, "Room started");
		let cancel = self.cancel.clone();
		loop {
			tokio::select! {
				biased;
				() = cancel.cancelled() => break,
				Some(cmd) = self.control_rx.recv() => self.handle_control(cmd).await,
				Some(msg) = self.mailbox_rx.recv() => {
					tokio::select! {
						biased;
						() = cancel.cancelled() => break,
						() = self.deliver(&msg) => {}
					}
				}
				else => break,
			}
		}
		self.shutdown().await;
	}

	async fn handle_control(&mut self, cmd: Control) {
		match cmd {
			Control::Register { conn, pending } => {
				debug!(doc_id = %self.doc_id, conn_id = %conn.id(), pending = pending, "Participant joined");
				let backlog = pending.then(VecDeque::new);
				let prev = self.participants.insert(conn.id().clone(), Participant { conn: conn.clone(), backlog });
				if let Some(prev) = prev
					&& !Arc::ptr_eq(&prev.conn, &conn)
				{
					let _ = prev.conn.close().await;
				}
			}
			Control::Activate(conn_id) => {
				let held = self
					.participants
					.get_mut(&conn_id)
					.and_then(|p| p.backlog.take().map(|backlog| (p.conn.clone(), backlog)));
				if let Some((conn, backlog)) = held {
					debug!(doc_id = %self.doc_id, conn_id = %conn_id, held = backlog.len(), "Participant active");
					for frame in backlog {
						send_frame(&self.doc_id, self.send_timeout, &conn_id, &conn, frame).await;
					}
				}
			}
			Control::Unregister(conn_id) => {
				if let Some(p) = self.participants.remove(&conn_id) {
					debug!(doc_id = %self.doc_id, conn_id = %conn_id, "Participant left");
					let _ = p.conn.close().await;
				}
			}
			Control::Participants(tx) => {
				let _ = tx.send(self.participants.keys().cloned().collect());
			}
		}
		self.count.store(self.participants.len(), Ordering::Relaxed);
	}

	async fn deliver(&mut self, msg: &BroadcastMessage) {
		let Self { doc_id, participants, backlog_limit, send_timeout, .. } = self;
		for (conn_id, p) in participants.iter_mut() {
			if *conn_id == msg.sender {
				continue;
			}
			match p.backlog.as_mut() {
				Some(backlog) if backlog.len() >= *backlog_limit => {
					debug!(doc_id = %doc_id, conn_id = %conn_id, "Backlog full, dropping message");
				}
				Some(backlog) => backlog.push_back(msg.frame.clone()),
				None => send_frame(doc_id, *send_timeout, conn_id, &p.conn, msg.frame.clone()).await,
			}
		}
	}

	async fn shutdown(mut self) {
		self.control_rx.close();
		self.mailbox_rx.close();

		let mut closing: Vec<Arc<Connection>> = self.participants.drain().map(|(_, p)| p.conn).collect();
		while let Ok(cmd) = self.control_rx.try_recv() {
			match cmd {
				Control::Register { conn, .. } => closing.push(conn),
				Control::Participants(tx) => {
					let _ = tx.send(Vec::new());
				}
				Control::Activate(_) | Control::Unregister(_) => {}
			}
		}
		self.count.store(0, Ordering::Relaxed);

		debug!(doc_id = %self.doc_id, participants = closing.len(), "Room closing");
		futures::future::join_all(
			closing.iter().map(|conn| conn.close_with(close_code::AWAY, "server shutting down")),
		)
		.await;
	}
}


// vim: ts=4
