//! In-process transport: peers in the same process share a hub
//!
//! Used by tests and by local two-session setups. Delivery is immediate and
//! ordered per sender, which is stronger than the network guarantees.

use super::{PeerTransport, TransportError, TransportEvent};
use crate::tuning::network;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct HubState {
    next_id: u64,
    /// Room id -> members, creator first
    rooms: HashMap<String, Vec<String>>,
    inboxes: HashMap<String, VecDeque<TransportEvent>>,
}

impl HubState {
    fn deliver(&mut self, to: &str, event: TransportEvent) {
        if let Some(inbox) = self.inboxes.get_mut(to) {
            inbox.push_back(event);
        }
    }

    fn room_of(&self, peer_id: &str) -> Option<&String> {
        self.rooms
            .iter()
            .find(|(_, members)| members.iter().any(|m| m == peer_id))
            .map(|(room, _)| room)
    }

    fn leave(&mut self, peer_id: &str) {
        let Some(room) = self.room_of(peer_id).cloned() else {
            return;
        };
        let remaining = match self.rooms.get_mut(&room) {
            Some(members) => {
                members.retain(|m| m != peer_id);
                members.clone()
            }
            None => return,
        };
        for member in &remaining {
            self.deliver(member, TransportEvent::PeerLeft(peer_id.to_string()));
        }
        if remaining.is_empty() {
            self.rooms.remove(&room);
        }
    }
}

/// Shared switchboard; clone it to hand to each peer
#[derive(Debug, Clone, Default)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a new peer and returns its transport
    pub fn connect(&self) -> MemoryTransport {
        let mut state = self.lock();
        state.next_id += 1;
        let id = format!("peer-{}", state.next_id);
        state.inboxes.insert(id.clone(), VecDeque::new());
        debug!(peer_id = %id, "memory peer connected");

        MemoryTransport {
            hub: self.clone(),
            id,
            room: None,
            host: false,
        }
    }

    pub fn room_count(&self) -> usize {
        self.lock().rooms.len()
    }
}

#[derive(Debug)]
pub struct MemoryTransport {
    hub: MemoryHub,
    id: String,
    room: Option<String>,
    host: bool,
}

impl MemoryTransport {
    /// Opens a room named after this peer
    pub fn create_room(&mut self) -> Result<String, TransportError> {
        let mut state = self.hub.lock();
        state.leave(&self.id);
        state.rooms.insert(self.id.clone(), vec![self.id.clone()]);
        self.room = Some(self.id.clone());
        self.host = true;
        info!(peer_id = %self.id, room = %self.id, "room created");
        Ok(self.id.clone())
    }

    pub fn join_room(&mut self, room_id: &str) -> Result<(), TransportError> {
        let mut state = self.hub.lock();
        let members = state
            .rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| TransportError::RoomNotFound(room_id.to_string()))?;
        if members.len() >= network::MAX_PLAYERS {
            return Err(TransportError::RoomFull);
        }

        state.leave(&self.id);
        for member in &members {
            state.deliver(member, TransportEvent::PeerJoined(self.id.clone()));
            state.deliver(&self.id, TransportEvent::PeerJoined(member.clone()));
        }
        if let Some(room) = state.rooms.get_mut(room_id) {
            room.push(self.id.clone());
        }

        self.room = Some(room_id.to_string());
        self.host = false;
        info!(peer_id = %self.id, room = %room_id, "joined room");
        Ok(())
    }

    fn room_members(&self) -> Vec<String> {
        let Some(room) = &self.room else {
            return Vec::new();
        };
        self.hub
            .lock()
            .rooms
            .get(room)
            .map(|members| members.iter().filter(|m| **m != self.id).cloned().collect())
            .unwrap_or_default()
    }
}

impl PeerTransport for MemoryTransport {
    fn local_id(&self) -> &str {
        &self.id
    }

    fn room_id(&self) -> Option<&str> {
        self.room.as_deref()
    }

    fn is_host(&self) -> bool {
        self.host
    }

    fn send(&self, peer_id: &str, payload: String) {
        if !self.room_members().iter().any(|m| m == peer_id) {
            return;
        }
        self.hub.lock().deliver(
            peer_id,
            TransportEvent::Message {
                from: self.id.clone(),
                payload,
            },
        );
    }

    fn broadcast(&self, payload: String) {
        let members = self.room_members();
        let mut state = self.hub.lock();
        for member in members {
            state.deliver(
                &member,
                TransportEvent::Message {
                    from: self.id.clone(),
                    payload: payload.clone(),
                },
            );
        }
    }

    fn try_recv(&mut self) -> Option<TransportEvent> {
        self.hub.lock().inboxes.get_mut(&self.id)?.pop_front()
    }

    fn peer_count(&self) -> usize {
        self.room_members().len()
    }

    fn close(&mut self) {
        let mut state = self.hub.lock();
        state.leave(&self.id);
        state.inboxes.remove(&self.id);
        self.room = None;
        self.host = false;
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.close();
    }
}
