//! Frames exchanged between peers and the room relay
//!
//! The relay never looks inside `payload`; peers put encoded wire envelopes
//! there.

use serde::{Deserialize, Serialize};

/// Peer -> relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    CreateRoom,
    JoinRoom { room_code: String },
    Send { to: String, payload: String },
    Broadcast { payload: String },
    Leave,
}

/// Relay -> peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RelayFrame {
    Welcome { peer_id: String },
    RoomCreated { room_code: String },
    RoomJoined { room_code: String, peers: Vec<String> },
    PeerJoined { peer_id: String },
    PeerLeft { peer_id: String },
    Message { from: String, payload: String },
    Error { code: ErrorCode, message: String },
}

/// Machine-readable reason carried by [`RelayFrame::Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    RoomNotFound,
    RoomFull,
    NotInRoom,
    /// Raised locally when the relay connection drops
    Disconnected,
}

/// Entry in the `GET /rooms` listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub code: String,
    pub peers: usize,
    pub age_secs: u64,
}
