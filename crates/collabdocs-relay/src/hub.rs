//! Registry of document rooms
//!
//! Rooms are created on first access and live until [`Hub::shutdown_all`]. The
//! registry lock is held only for lookup and insertion, never across an await.

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::prelude::*;
use crate::room::{Room, RoomConfig};

/// Hub statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct HubStats {
	pub rooms: usize,
	pub participants: usize,
}

#[derive(Debug, Default)]
struct HubState {
	rooms: HashMap<DocId, Room>,
	shut_down: bool,
}

#[derive(Debug)]
pub struct Hub {
	config: RoomConfig,
	state: Mutex<HubState>,
}

impl Hub {
	pub fn new(config: RoomConfig) -> Self {
		Self { config, state: Mutex::new(HubState::default()) }
	}

	/// Returns the room of a document, creating and starting it on first access
	///
	/// Fails with `Error::ShuttingDown` once [`Hub::shutdown_all`] was called.
	pub fn get_or_create_room(&self, doc_id: &DocId) -> CdResult<Room> {
		let mut state = self.state.lock();
		if state.shut_down {
			return Err(Error::ShuttingDown);
		}
		if let Some(room) = state.rooms.get(doc_id) {
			return Ok(room.clone());
		}

		let room = Room::spawn(doc_id.clone(), &self.config);
		state.rooms.insert(doc_id.clone(), room.clone());
		info!(doc_id = %doc_id, rooms = state.rooms.len(), "Room created");
		Ok(room)
	}

	/// Closes every room and refuses to create new ones
	///
	/// Returns the number of rooms closed by this call.
	pub async fn shutdown_all(&self) -> usize {
		let rooms: Vec<Room> = {
			let mut state = self.state.lock();
			state.shut_down = true;
			state.rooms.drain().map(|(_, room)| room).collect()
		};

		info!(rooms = rooms.len(), "Shutting down rooms");
		futures::future::join_all(rooms.iter().map(Room::close)).await;
		rooms.len()
	}

	pub fn is_shut_down(&self) -> bool {
		self.state.lock().shut_down
	}

	pub fn room_count(&self) -> usize {
		self.state.lock().rooms.len()
	}

	pub fn stats(&self) -> HubStats {
		let state = self.state.lock();
		HubStats {
			rooms: state.rooms.len(),
			participants: state.rooms.values().map(Room::participant_count).sum(),
		}
	}
}


// vim: ts=4
