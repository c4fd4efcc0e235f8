//! Wire format for peer-to-peer messages
//!
//! Every message is a JSON envelope `{ "t": kind, "d": payload, "ts": millis }`.
//! Decoding is two-step (kind string first, then the payload for that kind) so
//! an unknown kind or a payload of the wrong shape is dropped without
//! disturbing anything else.

use crate::components::{EffectKind, InputState, Millis, WeaponKind};
use crate::entities::PlayerSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Message kind identifiers as they appear in `t`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Join,
    State,
    Input,
    Shoot,
    Hit,
    Kill,
    Respawn,
    Chat,
    Pickup,
    Dash,
    Weapon,
    Reload,
    Ping,
    Pong,
    GameState,
    HostSync,
}

impl MessageKind {
    pub const ALL: [MessageKind; 16] = [
        MessageKind::Join,
        MessageKind::State,
        MessageKind::Input,
        MessageKind::Shoot,
        MessageKind::Hit,
        MessageKind::Kill,
        MessageKind::Respawn,
        MessageKind::Chat,
        MessageKind::Pickup,
        MessageKind::Dash,
        MessageKind::Weapon,
        MessageKind::Reload,
        MessageKind::Ping,
        MessageKind::Pong,
        MessageKind::GameState,
        MessageKind::HostSync,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Join => "join",
            MessageKind::State => "state",
            MessageKind::Input => "input",
            MessageKind::Shoot => "shoot",
            MessageKind::Hit => "hit",
            MessageKind::Kill => "kill",
            MessageKind::Respawn => "respawn",
            MessageKind::Chat => "chat",
            MessageKind::Pickup => "pickup",
            MessageKind::Dash => "dash",
            MessageKind::Weapon => "weapon",
            MessageKind::Reload => "reload",
            MessageKind::Ping => "ping",
            MessageKind::Pong => "pong",
            MessageKind::GameState => "gameState",
            MessageKind::HostSync => "hostSync",
        }
    }

    pub fn parse(s: &str) -> Option<MessageKind> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinPayload {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShootPayload {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub weapon: WeaponKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitPayload {
    pub target: String,
    pub damage: f32,
}

/// Names are for the kill feed; credit goes by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillPayload {
    pub killer: String,
    pub killer_id: String,
    pub victim: String,
    pub victim_id: String,
    pub weapon: WeaponKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RespawnPayload {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPayload {
    pub name: String,
    pub text: String,
}

/// What was picked up: a power-up or a weapon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PickupItem {
    Effect(EffectKind),
    Weapon(WeaponKind),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupPayload {
    pub kind: PickupItem,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponPayload {
    pub weapon: WeaponKind,
}

/// Ping/pong body: the pinger's send time, echoed back untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingPayload {
    pub t: Millis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStatePayload {
    #[serde(default)]
    pub welcome: bool,
    #[serde(default)]
    pub wave: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSyncPayload {
    pub wave: u32,
    pub enemies_alive: u32,
}

/// Typed peer message
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    Join(JoinPayload),
    State(Box<PlayerSnapshot>),
    Input(InputState),
    Shoot(ShootPayload),
    Hit(HitPayload),
    Kill(KillPayload),
    Respawn(RespawnPayload),
    Chat(ChatPayload),
    Pickup(PickupPayload),
    Dash,
    Weapon(WeaponPayload),
    Reload,
    Ping(PingPayload),
    Pong(PingPayload),
    GameState(GameStatePayload),
    HostSync(HostSyncPayload),
}

impl WireMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            WireMessage::Join(_) => MessageKind::Join,
            WireMessage::State(_) => MessageKind::State,
            WireMessage::Input(_) => MessageKind::Input,
            WireMessage::Shoot(_) => MessageKind::Shoot,
            WireMessage::Hit(_) => MessageKind::Hit,
            WireMessage::Kill(_) => MessageKind::Kill,
            WireMessage::Respawn(_) => MessageKind::Respawn,
            WireMessage::Chat(_) => MessageKind::Chat,
            WireMessage::Pickup(_) => MessageKind::Pickup,
            WireMessage::Dash => MessageKind::Dash,
            WireMessage::Weapon(_) => MessageKind::Weapon,
            WireMessage::Reload => MessageKind::Reload,
            WireMessage::Ping(_) => MessageKind::Ping,
            WireMessage::Pong(_) => MessageKind::Pong,
            WireMessage::GameState(_) => MessageKind::GameState,
            WireMessage::HostSync(_) => MessageKind::HostSync,
        }
    }

    fn payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            WireMessage::Join(p) => serde_json::to_value(p),
            WireMessage::State(p) => serde_json::to_value(p),
            WireMessage::Input(p) => serde_json::to_value(p),
            WireMessage::Shoot(p) => serde_json::to_value(p),
            WireMessage::Hit(p) => serde_json::to_value(p),
            WireMessage::Kill(p) => serde_json::to_value(p),
            WireMessage::Respawn(p) => serde_json::to_value(p),
            WireMessage::Chat(p) => serde_json::to_value(p),
            WireMessage::Pickup(p) => serde_json::to_value(p),
            WireMessage::Dash | WireMessage::Reload => Ok(Value::Object(Default::default())),
            WireMessage::Weapon(p) => serde_json::to_value(p),
            WireMessage::Ping(p) | WireMessage::Pong(p) => serde_json::to_value(p),
            WireMessage::GameState(p) => serde_json::to_value(p),
            WireMessage::HostSync(p) => serde_json::to_value(p),
        }
    }

    fn from_parts(kind: MessageKind, d: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            MessageKind::Join => WireMessage::Join(serde_json::from_value(d)?),
            MessageKind::State => WireMessage::State(Box::new(serde_json::from_value(d)?)),
            MessageKind::Input => WireMessage::Input(serde_json::from_value(d)?),
            MessageKind::Shoot => WireMessage::Shoot(serde_json::from_value(d)?),
            MessageKind::Hit => WireMessage::Hit(serde_json::from_value(d)?),
            MessageKind::Kill => WireMessage::Kill(serde_json::from_value(d)?),
            MessageKind::Respawn => WireMessage::Respawn(serde_json::from_value(d)?),
            MessageKind::Chat => WireMessage::Chat(serde_json::from_value(d)?),
            MessageKind::Pickup => WireMessage::Pickup(serde_json::from_value(d)?),
            MessageKind::Dash => WireMessage::Dash,
            MessageKind::Weapon => WireMessage::Weapon(serde_json::from_value(d)?),
            MessageKind::Reload => WireMessage::Reload,
            MessageKind::Ping => WireMessage::Ping(serde_json::from_value(d)?),
            MessageKind::Pong => WireMessage::Pong(serde_json::from_value(d)?),
            MessageKind::GameState => WireMessage::GameState(serde_json::from_value(d)?),
            MessageKind::HostSync => WireMessage::HostSync(serde_json::from_value(d)?),
        })
    }
}

/// Raw envelope as it travels
#[derive(Debug, Serialize, Deserialize)]
struct RawEnvelope {
    t: String,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    ts: Millis,
}

/// A decoded message and the sender's timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub message: WireMessage,
    pub ts: Millis,
}

impl Envelope {
    pub fn new(message: WireMessage, ts: Millis) -> Self {
        Self { message, ts }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let raw = RawEnvelope {
            t: self.message.kind().as_str().to_string(),
            d: self.message.payload()?,
            ts: self.ts,
        };
        serde_json::to_string(&raw)
    }

    /// Parses an envelope; anything malformed yields `None`
    pub fn decode(raw: &str) -> Option<Envelope> {
        let envelope: RawEnvelope = match serde_json::from_str(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "dropping unparseable message");
                return None;
            }
        };
        let Some(kind) = MessageKind::parse(&envelope.t) else {
            debug!(kind = %envelope.t, "dropping message of unknown kind");
            return None;
        };
        match WireMessage::from_parts(kind, envelope.d) {
            Ok(message) => Some(Envelope {
                message,
                ts: envelope.ts,
            }),
            Err(e) => {
                debug!(kind = kind.as_str(), error = %e, "dropping malformed payload");
                None
            }
        }
    }
}

/// Wall-clock milliseconds since the Unix epoch
pub fn epoch_millis() -> Millis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Millis)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ToSnapshot;
    use crate::entities::Player;
    use glam::Vec2;

    #[test]
    fn envelope_uses_short_keys() {
        let raw = Envelope::new(WireMessage::Ping(PingPayload { t: 42 }), 1000)
            .encode()
            .unwrap();
        let json: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["t"], "ping");
        assert_eq!(json["d"]["t"], 42);
        assert_eq!(json["ts"], 1000);
    }

    #[test]
    fn kind_strings_are_stable() {
        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MessageKind::GameState.as_str(), "gameState");
        assert_eq!(MessageKind::HostSync.as_str(), "hostSync");
        assert_eq!(MessageKind::Weapon.as_str(), "weapon");
    }

    #[test]
    fn state_snapshot_survives_the_wire() {
        let player = Player::new("p1".into(), Vec2::new(12.0, 34.0), "ada", 2, 0);
        let original = Envelope::new(WireMessage::State(Box::new(player.snapshot())), 5);
        let decoded = Envelope::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn accepts_payloads_from_other_peers() {
        let raw = r#"{"t":"hostSync","d":{"wave":3,"enemiesAlive":7},"ts":9}"#;
        let envelope = Envelope::decode(raw).unwrap();
        assert_eq!(
            envelope.message,
            WireMessage::HostSync(HostSyncPayload {
                wave: 3,
                enemies_alive: 7
            })
        );

        let dash = Envelope::decode(r#"{"t":"dash","d":{},"ts":1}"#).unwrap();
        assert_eq!(dash.message, WireMessage::Dash);

        let pickup = Envelope::decode(r#"{"t":"pickup","d":{"kind":"sniper","x":1,"y":2},"ts":1}"#)
            .unwrap();
        assert_eq!(
            pickup.message,
            WireMessage::Pickup(PickupPayload {
                kind: PickupItem::Weapon(WeaponKind::Sniper),
                x: 1.0,
                y: 2.0
            })
        );
    }

    #[test]
    fn kill_payload_carries_ids_and_weapon_id() {
        let raw = Envelope::new(
            WireMessage::Kill(KillPayload {
                killer: "Player".into(),
                killer_id: "peer-a".into(),
                victim: "Bot 1".into(),
                victim_id: "bot-1".into(),
                weapon: WeaponKind::Smg,
            }),
            3,
        )
        .encode()
        .unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["d"]["killerId"], "peer-a");
        assert_eq!(json["d"]["victimId"], "bot-1");
        assert_eq!(json["d"]["weapon"], "smg");
    }

    #[test]
    fn malformed_input_is_dropped() {
        assert!(Envelope::decode("not json").is_none());
        assert!(Envelope::decode(r#"{"t":"teleport","d":{},"ts":1}"#).is_none());
        assert!(Envelope::decode(r#"{"t":"shoot","d":{"x":"left"},"ts":1}"#).is_none());
        assert!(Envelope::decode(r#"{"d":{},"ts":1}"#).is_none());
    }
}
