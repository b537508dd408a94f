//! Relay wire protocol
//!
//! Binary frames are opaque editor updates. Text frames are JSON objects tagged by
//! a `type` field:
//!
//! ```text
//! {"type":"snapshot","dataB64":"<std base64>"}         decoded, persisted, relayed
//! {"type":"presence","name":..,"color":..,..}          relayed verbatim
//! {"type":"comment:add",..} / {"type":"comment:update",..}  relayed verbatim
//! ```
//!
//! Decoding happens in two phases: a minimal envelope carrying only the tag, then the
//! payload of the matched kind. Anything that does not fit maps to [`Inbound::Ignore`].

use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Color announced for a participant that left
pub const LEAVE_COLOR: &str = "#000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
	Binary,
	Text,
}

impl std::fmt::Display for FrameKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			FrameKind::Binary => write!(f, "binary"),
			FrameKind::Text => write!(f, "text"),
		}
	}
}

/// An immutable relayed frame. Cloning is cheap, the payload is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
	Binary(Bytes),
	Text(Utf8Bytes),
}

impl Frame {
	pub fn kind(&self) -> FrameKind {
		match self {
			Frame::Binary(_) => FrameKind::Binary,
			Frame::Text(_) => FrameKind::Text,
		}
	}

	pub fn len(&self) -> usize {
		match self {
			Frame::Binary(data) => data.len(),
			Frame::Text(text) => text.as_str().len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl From<Frame> for Message {
	fn from(frame: Frame) -> Self {
		match frame {
			Frame::Binary(data) => Message::Binary(data),
			Frame::Text(text) => Message::Text(text),
		}
	}
}

/// Text message kinds the relay understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
	Snapshot,
	Presence,
	CommentAdd,
	CommentUpdate,
}

impl MessageKind {
	pub fn from_type(typ: &str) -> Option<Self> {
		match typ {
			"snapshot" => Some(MessageKind::Snapshot),
			"presence" => Some(MessageKind::Presence),
			"comment:add" => Some(MessageKind::CommentAdd),
			"comment:update" => Some(MessageKind::CommentUpdate),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			MessageKind::Snapshot => "snapshot",
			MessageKind::Presence => "presence",
			MessageKind::CommentAdd => "comment:add",
			MessageKind::CommentUpdate => "comment:update",
		}
	}
}

/// Result of classifying an inbound text frame
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
	/// A decoded, non-empty replacement snapshot
	Snapshot(Vec<u8>),
	/// A frame relayed as-is
	Relay(MessageKind),
	Ignore,
}

#[derive(Debug, Deserialize)]
struct Envelope {
	#[serde(rename = "type")]
	typ: String,
}

#[derive(Debug, Deserialize)]
struct SnapshotPayload {
	#[serde(rename = "dataB64", default)]
	data_b64: String,
}

/// Classifies an inbound text frame
pub fn decode_text(text: &str) -> Inbound {
	let Ok(envelope) = serde_json::from_str::<Envelope>(text) else {
		return Inbound::Ignore;
	};
	match MessageKind::from_type(&envelope.typ) {
		Some(MessageKind::Snapshot) => decode_snapshot(text),
		Some(kind) => Inbound::Relay(kind),
		None => Inbound::Ignore,
	}
}

fn decode_snapshot(text: &str) -> Inbound {
	let Ok(payload) = serde_json::from_str::<SnapshotPayload>(text) else {
		return Inbound::Ignore;
	};
	if payload.data_b64.is_empty() {
		return Inbound::Ignore;
	}
	match STANDARD.decode(payload.data_b64.as_bytes()) {
		Ok(snapshot) if !snapshot.is_empty() => Inbound::Snapshot(snapshot),
		_ => Inbound::Ignore,
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
	pub from: i64,
	pub to: i64,
}

/// Messages originated by the server itself
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage<'a> {
	#[serde(rename = "snapshot")]
	Snapshot {
		#[serde(rename = "dataB64")]
		data_b64: String,
	},
	#[serde(rename = "presence")]
	Presence { name: &'a str, color: &'a str, typing: bool, cursor: Option<Cursor> },
}

impl<'a> ServerMessage<'a> {
	pub fn snapshot(snapshot: &[u8]) -> Self {
		ServerMessage::Snapshot { data_b64: STANDARD.encode(snapshot) }
	}

	/// Presence frame announcing that `name` left the document
	pub fn presence_leave(name: &'a str) -> Self {
		ServerMessage::Presence { name, color: LEAVE_COLOR, typing: false, cursor: None }
	}

	pub fn to_frame(&self) -> CdResult<Frame> {
		let text = serde_json::to_string(self).map_err(|err| Error::Internal(err.to_string()))?;
		Ok(Frame::Text(text.into()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_relayed_kinds() {
		assert_eq!(
			decode_text(
				r##"{"type":"presence","name":"Ann","color":"#fff","typing":true,"cursor":{"from":1,"to":2}}"##
			),
			Inbound::Relay(MessageKind::Presence)
		);
		assert_eq!(decode_text(r#"{"type":"comment:add","id":"x"}"#), Inbound::Relay(MessageKind::CommentAdd));
		assert_eq!(decode_text(r#"{"type":"comment:update"}"#), Inbound::Relay(MessageKind::CommentUpdate));
	}

	#[test]
	fn test_unrecognized_frames_are_ignored() {
		assert_eq!(decode_text(r#"{"type":"cursor"}"#), Inbound::Ignore);
		assert_eq!(decode_text(r#"{"type":42}"#), Inbound::Ignore);
		assert_eq!(decode_text(r#"{"name":"Ann"}"#), Inbound::Ignore);
		assert_eq!(decode_text(r#"["presence"]"#), Inbound::Ignore);
		assert_eq!(decode_text("not json"), Inbound::Ignore);
		assert_eq!(decode_text(""), Inbound::Ignore);
	}

	#[test]
	fn test_snapshot_decoding() {
		assert_eq!(
			decode_text(r#"{"type":"snapshot","dataB64":"AQID"}"#),
			Inbound::Snapshot(vec![1, 2, 3])
		);
		assert_eq!(decode_text(r#"{"type":"snapshot","dataB64":""}"#), Inbound::Ignore);
		assert_eq!(decode_text(r#"{"type":"snapshot"}"#), Inbound::Ignore);
		assert_eq!(decode_text(r#"{"type":"snapshot","dataB64":"%%%"}"#), Inbound::Ignore);
		assert_eq!(decode_text(r#"{"type":"snapshot","dataB64":7}"#), Inbound::Ignore);
	}

	#[test]
	fn test_server_messages() {
		let Frame::Text(text) = ServerMessage::snapshot(&[1, 2, 3]).to_frame().unwrap() else {
			panic!("expected text frame");
		};
		assert_eq!(text.as_str(), r#"{"type":"snapshot","dataB64":"AQID"}"#);

		let Frame::Text(text) = ServerMessage::presence_leave("Ann").to_frame().unwrap() else {
			panic!("expected text frame");
		};
		assert_eq!(
			text.as_str(),
			r##"{"type":"presence","name":"Ann","color":"#000000","typing":false,"cursor":null}"##
		);
	}
}

// vim: ts=4
