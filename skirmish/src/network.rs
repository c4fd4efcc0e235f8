//! Peer networking: envelope dispatch, state broadcast, latency and host duties
//!
//! The manager owns the transport and the remote state buffers. The session
//! drains [`NetEvent`]s once per tick via [`NetworkManager::poll`]; nothing
//! here runs on its own schedule.

use crate::components::{InputState, Millis, WeaponKind};
use crate::entities::PlayerSnapshot;
use crate::sync::GameSync;
use crate::transport::{PeerTransport, TransportEvent};
use crate::tuning::network as tuning;
use crate::wire_format::{
    ChatPayload, Envelope, GameStatePayload, HitPayload, HostSyncPayload, JoinPayload, KillPayload,
    PickupPayload, PingPayload, RespawnPayload, ShootPayload, WireMessage,
};
use tracing::{debug, info, warn};

/// Something a remote peer did, already decoded
#[derive(Debug, Clone, PartialEq)]
pub enum NetEvent {
    PeerJoined(String),
    PeerLeft(String),
    Join { from: String, payload: JoinPayload },
    Input { from: String, input: InputState },
    Shoot { from: String, payload: ShootPayload },
    Hit { from: String, payload: HitPayload },
    Kill { from: String, payload: KillPayload },
    Respawn { from: String, payload: RespawnPayload },
    Chat { from: String, payload: ChatPayload },
    Pickup { from: String, payload: PickupPayload },
    Dash { from: String },
    WeaponSwitch { from: String, weapon: WeaponKind },
    Reload { from: String },
    Latency(Millis),
    GameState(GameStatePayload),
    HostSync(HostSyncPayload),
    Error(String),
}

pub struct NetworkManager {
    transport: Box<dyn PeerTransport>,
    sync: GameSync,
    player_name: String,
    /// Broadcast local state every this many ticks
    sync_every: u64,
    latency: Option<Millis>,
    last_ping_at: Option<Millis>,
    last_host_sync_at: Option<Millis>,
    wave: u32,
    enemies_alive: u32,
}

impl NetworkManager {
    pub fn new(
        transport: Box<dyn PeerTransport>,
        player_name: &str,
        tick_rate: f32,
        sync_rate: f32,
        interpolation_delay: Millis,
    ) -> Self {
        let sync_every = if sync_rate > 0.0 {
            (tick_rate / sync_rate).round().max(1.0) as u64
        } else {
            1
        };

        Self {
            transport,
            sync: GameSync::new(interpolation_delay),
            player_name: player_name.to_string(),
            sync_every,
            latency: None,
            last_ping_at: None,
            last_host_sync_at: None,
            wave: 0,
            enemies_alive: 0,
        }
    }

    pub fn local_id(&self) -> &str {
        self.transport.local_id()
    }

    pub fn room_id(&self) -> Option<&str> {
        self.transport.room_id()
    }

    pub fn is_host(&self) -> bool {
        self.transport.is_host()
    }

    /// Connected players including ourselves
    pub fn player_count(&self) -> usize {
        self.transport.peer_count() + 1
    }

    pub fn latency(&self) -> Option<Millis> {
        self.latency
    }

    pub fn sync_every(&self) -> u64 {
        self.sync_every
    }

    /// Game progress advertised in welcome and host-sync messages
    pub fn set_host_state(&mut self, wave: u32, enemies_alive: u32) {
        self.wave = wave;
        self.enemies_alive = enemies_alive;
    }

    pub fn send(&self, peer_id: &str, message: WireMessage, now: Millis) {
        if let Some(raw) = encode(message, now) {
            self.transport.send(peer_id, raw);
        }
    }

    pub fn broadcast(&self, message: WireMessage, now: Millis) {
        if let Some(raw) = encode(message, now) {
            self.transport.broadcast(raw);
        }
    }

    /// Drains the transport and dispatches every decoded message
    pub fn poll(&mut self, now: Millis) -> Vec<NetEvent> {
        let mut events = Vec::new();

        while let Some(event) = self.transport.try_recv() {
            match event {
                TransportEvent::PeerJoined(peer_id) => {
                    info!(%peer_id, "peer connected");
                    self.introduce_to(&peer_id, now);
                    events.push(NetEvent::PeerJoined(peer_id));
                }
                TransportEvent::PeerLeft(peer_id) => {
                    info!(%peer_id, "peer disconnected");
                    self.sync.remove_peer(&peer_id);
                    events.push(NetEvent::PeerLeft(peer_id));
                }
                TransportEvent::Message { from, payload } => {
                    let Some(envelope) = Envelope::decode(&payload) else {
                        warn!(%from, "dropping malformed message");
                        continue;
                    };
                    if let Some(event) = self.dispatch(from, envelope.message, now) {
                        events.push(event);
                    }
                }
                TransportEvent::Error(message) => {
                    warn!(%message, "transport error");
                    events.push(NetEvent::Error(message));
                }
            }
        }

        events
    }

    fn introduce_to(&self, peer_id: &str, now: Millis) {
        self.send(
            peer_id,
            WireMessage::Join(JoinPayload {
                name: self.player_name.clone(),
                id: self.local_id().to_string(),
            }),
            now,
        );
        if self.is_host() {
            self.send(
                peer_id,
                WireMessage::GameState(GameStatePayload {
                    welcome: true,
                    wave: self.wave,
                }),
                now,
            );
        }
    }

    fn dispatch(&mut self, from: String, message: WireMessage, now: Millis) -> Option<NetEvent> {
        let event = match message {
            WireMessage::Join(payload) => NetEvent::Join { from, payload },
            WireMessage::State(snapshot) => {
                self.sync.add_state(&from, *snapshot, now);
                return None;
            }
            WireMessage::Input(input) => NetEvent::Input { from, input },
            WireMessage::Shoot(payload) => NetEvent::Shoot { from, payload },
            WireMessage::Hit(payload) => NetEvent::Hit { from, payload },
            WireMessage::Kill(payload) => NetEvent::Kill { from, payload },
            WireMessage::Respawn(payload) => NetEvent::Respawn { from, payload },
            WireMessage::Chat(payload) => NetEvent::Chat { from, payload },
            WireMessage::Pickup(payload) => NetEvent::Pickup { from, payload },
            WireMessage::Dash => NetEvent::Dash { from },
            WireMessage::Weapon(payload) => NetEvent::WeaponSwitch {
                from,
                weapon: payload.weapon,
            },
            WireMessage::Reload => NetEvent::Reload { from },
            WireMessage::Ping(ping) => {
                self.send(&from, WireMessage::Pong(ping), now);
                return None;
            }
            WireMessage::Pong(PingPayload { t }) => {
                let rtt = now.saturating_sub(t);
                self.latency = Some(rtt);
                debug!(%from, rtt, "pong");
                NetEvent::Latency(rtt)
            }
            WireMessage::GameState(payload) => NetEvent::GameState(payload),
            WireMessage::HostSync(payload) => NetEvent::HostSync(payload),
        };
        Some(event)
    }

    /// Broadcasts the local snapshot on every `sync_every`-th tick
    pub fn broadcast_state(&self, tick: u64, snapshot: &PlayerSnapshot, now: Millis) -> bool {
        if tick % self.sync_every != 0 {
            return false;
        }
        self.broadcast(WireMessage::State(Box::new(snapshot.clone())), now);
        true
    }

    pub fn maybe_ping(&mut self, now: Millis) {
        let due = self
            .last_ping_at
            .is_none_or(|last| now.saturating_sub(last) >= tuning::PING_INTERVAL_MS);
        if due && self.transport.peer_count() > 0 {
            self.last_ping_at = Some(now);
            self.broadcast(WireMessage::Ping(PingPayload { t: now }), now);
        }
    }

    /// Room creator only: periodic wave/enemy summary
    pub fn maybe_host_sync(&mut self, now: Millis) {
        if !self.is_host() {
            return;
        }
        let due = self
            .last_host_sync_at
            .is_none_or(|last| now.saturating_sub(last) >= tuning::HOST_SYNC_INTERVAL_MS);
        if due {
            self.last_host_sync_at = Some(now);
            self.broadcast(
                WireMessage::HostSync(HostSyncPayload {
                    wave: self.wave,
                    enemies_alive: self.enemies_alive,
                }),
                now,
            );
        }
    }

    pub fn interpolated_state(&self, peer_id: &str, now: Millis) -> Option<PlayerSnapshot> {
        self.sync.interpolated_state(peer_id, now)
    }

    pub fn disconnect(&mut self) {
        self.transport.close();
        self.sync.clear();
        info!("network disconnected");
    }
}

fn encode(message: WireMessage, now: Millis) -> Option<String> {
    let kind = message.kind();
    match Envelope::new(message, now).encode() {
        Ok(raw) => Some(raw),
        Err(e) => {
            warn!(kind = kind.as_str(), error = %e, "failed to encode message");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ToSnapshot;
    use crate::entities::Player;
    use crate::transport::MemoryHub;
    use glam::Vec2;

    fn pair() -> (NetworkManager, NetworkManager) {
        let hub = MemoryHub::new();
        let mut host = hub.connect();
        let mut guest = hub.connect();
        let room = host.create_room().unwrap();
        guest.join_room(&room).unwrap();
        (
            NetworkManager::new(Box::new(host), "host", 60.0, 20.0, 100),
            NetworkManager::new(Box::new(guest), "guest", 60.0, 20.0, 100),
        )
    }

    #[test]
    fn peers_introduce_themselves_and_host_welcomes() {
        let (mut host, mut guest) = pair();
        host.set_host_state(4, 2);

        let host_events = host.poll(0);
        assert_eq!(host_events, vec![NetEvent::PeerJoined(guest.local_id().to_string())]);

        let guest_events = guest.poll(0);
        assert!(guest_events.contains(&NetEvent::Join {
            from: host.local_id().to_string(),
            payload: JoinPayload {
                name: "host".into(),
                id: host.local_id().to_string()
            }
        }));
        assert!(guest_events.contains(&NetEvent::GameState(GameStatePayload {
            welcome: true,
            wave: 4
        })));

        // The host hears the guest's introduction too, but sends no welcome back
        let host_events = host.poll(0);
        assert!(matches!(
            &host_events[..],
            [NetEvent::Join { payload, .. }] if payload.name == "guest"
        ));
    }

    #[test]
    fn ping_pong_measures_round_trip() {
        let (mut host, mut guest) = pair();
        host.poll(0);
        guest.poll(0);
        host.poll(0);

        host.maybe_ping(1000);
        guest.poll(1010);
        let events = host.poll(1042);
        assert_eq!(events, vec![NetEvent::Latency(42)]);
        assert_eq!(host.latency(), Some(42));

        // Not due again until the interval passes
        host.maybe_ping(1500);
        assert!(guest.poll(1500).is_empty());
    }

    #[test]
    fn state_is_broadcast_every_third_tick_and_buffered() {
        let (host, mut guest) = pair();
        guest.poll(0);
        let snapshot = Player::new("h".into(), Vec2::new(50.0, 60.0), "host", 0, 0).snapshot();

        assert_eq!(host.sync_every(), 3);
        assert!(!host.broadcast_state(1, &snapshot, 10));
        assert!(host.broadcast_state(3, &snapshot, 10));
        assert!(guest.poll(10).is_empty());

        let remote = guest.interpolated_state(host.local_id(), 500).unwrap();
        assert_eq!(remote.x, 50.0);
    }

    #[test]
    fn departures_clear_buffers() {
        let (mut host, mut guest) = pair();
        guest.poll(0);
        let snapshot = Player::new("h".into(), Vec2::ZERO, "host", 0, 0).snapshot();
        host.broadcast_state(0, &snapshot, 0);
        guest.poll(0);
        let host_id = host.local_id().to_string();
        assert!(guest.interpolated_state(&host_id, 0).is_some());

        host.disconnect();
        let events = guest.poll(10);
        assert_eq!(events, vec![NetEvent::PeerLeft(host_id.clone())]);
        assert!(guest.interpolated_state(&host_id, 10).is_none());
    }

    #[test]
    fn only_the_host_sends_host_sync() {
        let (mut host, mut guest) = pair();
        host.poll(0);
        guest.poll(0);
        host.poll(0);

        guest.maybe_host_sync(0);
        assert!(host.poll(0).is_empty());

        host.set_host_state(2, 5);
        host.maybe_host_sync(0);
        assert_eq!(
            guest.poll(0),
            vec![NetEvent::HostSync(HostSyncPayload {
                wave: 2,
                enemies_alive: 5
            })]
        );
    }
}
