//! Realtime relay for collaborative documents.
//!
//! Participants of the same document share a [`room::Room`]; the [`hub::Hub`]
//! maps documents to rooms and the session driver bridges each websocket with its
//! room and the snapshot store. Payloads are opaque: the relay never merges or
//! interprets editor updates.

pub mod connection;
pub mod hub;
pub mod prelude;
pub mod protocol;
pub mod relay;
pub mod room;
pub mod session;

pub use relay::{Relay, RelayConfig};
pub use session::JoinParams;

// vim: ts=4
