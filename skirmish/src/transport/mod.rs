//! Peer transport: the message channel between peers in a room
//!
//! The session only needs fire-and-forget sends and a non-blocking event
//! queue, so the trait is synchronous. Connection setup (`initialize`,
//! `create_room`, `join_room`) lives on the concrete transports since the
//! WebSocket one has to await the relay.

pub mod memory;
pub mod websocket;

use std::fmt;

pub use memory::{MemoryHub, MemoryTransport};
pub use websocket::WsTransport;

/// Something that happened on the transport since the last poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    PeerJoined(String),
    PeerLeft(String),
    Message { from: String, payload: String },
    Error(String),
}

pub trait PeerTransport: Send {
    /// Identifier other peers address us by
    fn local_id(&self) -> &str;

    fn room_id(&self) -> Option<&str>;

    /// True when this peer created the room it is in
    fn is_host(&self) -> bool;

    /// Best-effort send to one peer; unknown peers are ignored
    fn send(&self, peer_id: &str, payload: String);

    fn broadcast(&self, payload: String);

    fn try_recv(&mut self) -> Option<TransportEvent>;

    /// Remote peers currently connected
    fn peer_count(&self) -> usize;

    fn close(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    RoomNotFound(String),
    RoomFull,
    Timeout,
    /// The relay refused a request
    Rejected(String),
    Connection(String),
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::RoomNotFound(room) => write!(f, "room {room} not found"),
            TransportError::RoomFull => write!(f, "room is full"),
            TransportError::Timeout => write!(f, "connection timeout"),
            TransportError::Rejected(message) => write!(f, "relay rejected request: {message}"),
            TransportError::Connection(err) => write!(f, "connection error: {err}"),
            TransportError::Closed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for TransportError {}
