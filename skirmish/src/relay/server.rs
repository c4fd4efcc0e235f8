//! WebSocket room relay
//!
//! Peers connect to `/ws`, get a peer id, then create or join a room. From
//! then on the relay forwards opaque payloads between members of the same
//! room. It keeps no game state and validates nothing about the game.

use super::protocol::{ClientFrame, ErrorCode, RelayFrame, RoomInfo};
use crate::tuning::network;
use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderValue,
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use std::{
    collections::HashMap,
    fmt, io,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
const INACTIVE_PEER_TIMEOUT: Duration = Duration::from_secs(120);
const EMPTY_ROOM_TTL: Duration = Duration::from_secs(300);
const OUTBOUND_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomCode(String);

impl RoomCode {
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let code = (0..network::ROOM_CODE_LENGTH)
            .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    RoomNotFound,
    RoomFull,
    NotInRoom,
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::RoomNotFound => write!(f, "Room not found"),
            RelayError::RoomFull => write!(f, "Room is full"),
            RelayError::NotInRoom => write!(f, "Not in a room"),
        }
    }
}

impl std::error::Error for RelayError {}

impl RelayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RelayError::RoomNotFound => ErrorCode::RoomNotFound,
            RelayError::RoomFull => ErrorCode::RoomFull,
            RelayError::NotInRoom => ErrorCode::NotInRoom,
        }
    }

    pub fn to_frame(&self) -> RelayFrame {
        RelayFrame::Error {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct Member {
    pub id: Uuid,
    pub last_seen: Instant,
    pub sender: broadcast::Sender<RelayFrame>,
}

#[derive(Debug)]
pub struct Room {
    pub code: RoomCode,
    pub host: Uuid,
    pub members: HashMap<Uuid, Member>,
    pub created_at: Instant,
    pub last_activity: Instant,
}

impl Room {
    pub fn new(code: RoomCode, host: Member) -> Self {
        let now = Instant::now();
        let host_id = host.id;
        Self {
            code,
            host: host_id,
            members: HashMap::from([(host_id, host)]),
            created_at: now,
            last_activity: now,
        }
    }

    /// Adds a member and tells everyone already inside; returns their ids
    pub fn add_member(&mut self, member: Member) -> Result<Vec<String>, RelayError> {
        if self.members.len() >= network::MAX_PLAYERS {
            return Err(RelayError::RoomFull);
        }

        let joined = RelayFrame::PeerJoined {
            peer_id: member.id.to_string(),
        };
        let existing = self
            .members
            .values()
            .map(|m| {
                let _ = m.sender.send(joined.clone());
                m.id.to_string()
            })
            .collect();

        self.members.insert(member.id, member);
        self.last_activity = Instant::now();
        Ok(existing)
    }

    pub fn remove_member(&mut self, peer_id: Uuid) {
        if self.members.remove(&peer_id).is_some() {
            let left = RelayFrame::PeerLeft {
                peer_id: peer_id.to_string(),
            };
            for member in self.members.values() {
                let _ = member.sender.send(left.clone());
            }
            self.last_activity = Instant::now();
        }
    }

    /// Forwards `payload` to one member; unknown targets are dropped
    pub fn forward(&self, from: Uuid, to: &str, payload: String) {
        let target = Uuid::parse_str(to)
            .ok()
            .and_then(|id| self.members.get(&id));
        match target {
            Some(member) if member.id != from => {
                let _ = member.sender.send(RelayFrame::Message {
                    from: from.to_string(),
                    payload,
                });
            }
            _ => debug!(room = %self.code.as_str(), %to, "dropping message for unknown peer"),
        }
    }

    pub fn broadcast_from(&self, from: Uuid, payload: String) {
        let frame = RelayFrame::Message {
            from: from.to_string(),
            payload,
        };
        for member in self.members.values().filter(|m| m.id != from) {
            let _ = member.sender.send(frame.clone());
        }
    }

    pub fn touch(&mut self, peer_id: Uuid) {
        let now = Instant::now();
        if let Some(member) = self.members.get_mut(&peer_id) {
            member.last_seen = now;
        }
        self.last_activity = now;
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn cleanup_inactive_members(&mut self) {
        let Some(cutoff) = Instant::now().checked_sub(INACTIVE_PEER_TIMEOUT) else {
            return;
        };
        let inactive: Vec<Uuid> = self
            .members
            .values()
            .filter(|m| m.last_seen < cutoff)
            .map(|m| m.id)
            .collect();

        for peer_id in inactive {
            warn!(%peer_id, room = %self.code.as_str(), "removing inactive peer");
            self.remove_member(peer_id);
        }
    }
}

pub type SharedRooms = Arc<Mutex<HashMap<String, Room>>>;

#[derive(Clone, Default)]
pub struct AppState {
    pub rooms: SharedRooms,
}

fn lock_rooms(rooms: &SharedRooms) -> MutexGuard<'_, HashMap<String, Room>> {
    rooms.lock().unwrap_or_else(|e| e.into_inner())
}

/// CORS for the browser client; an unparseable origin falls back to any origin
pub fn cors_layer(client_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match client_origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            warn!(%client_origin, error = %e, "invalid CORS origin, allowing any");
            layer.allow_origin(Any)
        }
    }
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(|| async { "Skirmish relay" }))
        .route("/ws", get(websocket_handler))
        .route("/rooms", get(list_rooms))
        .layer(cors)
        .with_state(state)
}

/// Serves the relay on `listener` until the process exits
pub async fn run(listener: tokio::net::TcpListener, client_origin: &str) -> io::Result<()> {
    let address = listener.local_addr()?;
    let state = AppState::default();

    let cleanup_rooms = state.rooms.clone();
    tokio::spawn(async move {
        let mut interval = time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            cleanup_rooms_task(&cleanup_rooms);
        }
    });

    let app = router(state, cors_layer(client_origin));

    info!(%address, "relay listening");
    info!("WebSocket endpoint: ws://{address}/ws");
    info!(%client_origin, "CORS configured");

    axum::serve(listener, app).await.inspect_err(|e| {
        error!(error = %e, "relay server error");
    })
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let peer_id = Uuid::new_v4();
    let (tx, mut rx) = broadcast::channel(OUTBOUND_BUFFER);

    info!(%peer_id, "new WebSocket connection");
    let _ = tx.send(RelayFrame::Welcome {
        peer_id: peer_id.to_string(),
    });

    // Outbound: frames queued for this peer
    let send_task = tokio::spawn(async move {
        loop {
            let frame = match rx.recv().await {
                Ok(frame) => frame,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%peer_id, skipped, "peer is lagging, frames dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let Ok(json) = serde_json::to_string(&frame) else {
                continue;
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Inbound: requests from this peer
    let recv_task = {
        let state = state.clone();
        tokio::spawn(async move {
            let mut current_room: Option<String> = None;

            while let Some(msg) = receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ClientFrame>(&text) {
                        Ok(frame) => {
                            handle_frame(&state, &mut current_room, peer_id, &tx, frame);
                        }
                        Err(e) => warn!(%peer_id, error = %e, "unparseable frame"),
                    },
                    Ok(Message::Close(_)) => break,
                    Err(e) => {
                        error!(%peer_id, error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }

            if let Some(room_code) = current_room {
                leave_room(&state, &room_code, peer_id);
            }
        })
    };

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!(%peer_id, "WebSocket connection closed");
}

fn handle_frame(
    state: &AppState,
    current_room: &mut Option<String>,
    peer_id: Uuid,
    tx: &broadcast::Sender<RelayFrame>,
    frame: ClientFrame,
) {
    match frame {
        ClientFrame::CreateRoom => {
            if let Some(room_code) = current_room.take() {
                leave_room(state, &room_code, peer_id);
            }
            let room_code = create_room(state, peer_id, tx.clone());
            let _ = tx.send(RelayFrame::RoomCreated {
                room_code: room_code.clone(),
            });
            *current_room = Some(room_code);
        }
        ClientFrame::JoinRoom { room_code } => {
            if let Some(previous) = current_room.take() {
                leave_room(state, &previous, peer_id);
            }
            match join_room(state, &room_code, peer_id, tx.clone()) {
                Ok(peers) => {
                    let _ = tx.send(RelayFrame::RoomJoined {
                        room_code: room_code.clone(),
                        peers,
                    });
                    *current_room = Some(room_code);
                }
                Err(e) => {
                    warn!(%peer_id, room = %room_code, error = %e, "join refused");
                    let _ = tx.send(e.to_frame());
                }
            }
        }
        ClientFrame::Send { to, payload } => {
            with_room(state, current_room.as_deref(), tx, |room| {
                room.touch(peer_id);
                room.forward(peer_id, &to, payload);
            });
        }
        ClientFrame::Broadcast { payload } => {
            with_room(state, current_room.as_deref(), tx, |room| {
                room.touch(peer_id);
                room.broadcast_from(peer_id, payload);
            });
        }
        ClientFrame::Leave => {
            if let Some(room_code) = current_room.take() {
                leave_room(state, &room_code, peer_id);
            }
        }
    }
}

fn with_room(
    state: &AppState,
    room_code: Option<&str>,
    tx: &broadcast::Sender<RelayFrame>,
    f: impl FnOnce(&mut Room),
) {
    let mut rooms = lock_rooms(&state.rooms);
    match room_code.and_then(|code| rooms.get_mut(code)) {
        Some(room) => f(room),
        None => {
            let _ = tx.send(RelayError::NotInRoom.to_frame());
        }
    }
}

fn create_room(state: &AppState, peer_id: Uuid, sender: broadcast::Sender<RelayFrame>) -> String {
    let mut rooms = lock_rooms(&state.rooms);
    let code = loop {
        let candidate = RoomCode::generate();
        if !rooms.contains_key(candidate.as_str()) {
            break candidate;
        }
    };
    let room_code = code.as_str().to_string();
    let host = Member {
        id: peer_id,
        last_seen: Instant::now(),
        sender,
    };
    rooms.insert(room_code.clone(), Room::new(code, host));
    info!(%peer_id, room = %room_code, "created room");
    room_code
}

fn join_room(
    state: &AppState,
    room_code: &str,
    peer_id: Uuid,
    sender: broadcast::Sender<RelayFrame>,
) -> Result<Vec<String>, RelayError> {
    let mut rooms = lock_rooms(&state.rooms);
    let room = rooms.get_mut(room_code).ok_or(RelayError::RoomNotFound)?;
    let peers = room.add_member(Member {
        id: peer_id,
        last_seen: Instant::now(),
        sender,
    })?;
    info!(%peer_id, room = %room_code, peers = peers.len(), "peer joined room");
    Ok(peers)
}

fn leave_room(state: &AppState, room_code: &str, peer_id: Uuid) {
    let mut rooms = lock_rooms(&state.rooms);

    if let Some(room) = rooms.get_mut(room_code) {
        room.remove_member(peer_id);
        info!(%peer_id, room = %room_code, "peer left room");

        if room.is_empty() {
            rooms.remove(room_code);
            info!(room = %room_code, "removed empty room");
        }
    }
}

async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomInfo>> {
    let rooms = lock_rooms(&state.rooms);
    let list = rooms
        .iter()
        .map(|(code, room)| RoomInfo {
            code: code.clone(),
            peers: room.members.len(),
            age_secs: room.created_at.elapsed().as_secs(),
        })
        .collect();
    Json(list)
}

fn cleanup_rooms_task(rooms: &SharedRooms) {
    let mut rooms_guard = lock_rooms(rooms);
    let mut rooms_to_remove = Vec::new();

    for (room_code, room) in rooms_guard.iter_mut() {
        room.cleanup_inactive_members();

        if room.is_empty() && room.last_activity.elapsed() > EMPTY_ROOM_TTL {
            rooms_to_remove.push(room_code.clone());
        }
    }

    for room_code in rooms_to_remove {
        rooms_guard.remove(&room_code);
        info!(room = %room_code, "cleaned up empty room");
    }
}
