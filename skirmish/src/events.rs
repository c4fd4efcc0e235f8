//! Notifications pushed to the HUD, audio and chat collaborators
//!
//! Delivered over a `tokio::sync::broadcast` channel owned by the session, so
//! any number of listeners can subscribe and a slow one only loses its own
//! backlog.

use crate::components::{EffectKind, WeaponKind};
use serde::Serialize;

/// Sounds the audio collaborator should play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "cue", rename_all = "camelCase")]
pub enum SoundCue {
    Shoot { weapon: WeaponKind },
    Hit,
    Kill,
    Death,
    Dash,
    Reload,
    Pickup,
    Explosion,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GameEvent {
    KillFeed {
        killer: String,
        victim: String,
        weapon: String,
    },
    Announcement {
        text: String,
        color: String,
    },
    WaveStarted {
        wave: u32,
        count: u32,
    },
    PowerUpCollected {
        kind: EffectKind,
    },
    WeaponCollected {
        weapon: WeaponKind,
    },
    PlayerJoined {
        peer_id: String,
        name: String,
    },
    PlayerLeft {
        peer_id: String,
        name: String,
    },
    Chat {
        from: String,
        name: String,
        text: String,
    },
    RemoteHit {
        from: String,
        target: String,
        damage: f32,
    },
    Latency {
        millis: u64,
    },
    HostSync {
        wave: u32,
        enemies_alive: u32,
    },
    Welcome {
        wave: u32,
    },
    NetworkError {
        message: String,
    },
    Sound(SoundCue),
}

impl GameEvent {
    pub fn announce(text: impl Into<String>, color: impl Into<String>) -> Self {
        GameEvent::Announcement {
            text: text.into(),
            color: color.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tags() {
        let json = serde_json::to_value(GameEvent::HostSync {
            wave: 2,
            enemies_alive: 4,
        })
        .unwrap();
        assert_eq!(json["type"], "hostSync");
        assert_eq!(json["enemiesAlive"], 4);

        let sound = serde_json::to_value(GameEvent::Sound(SoundCue::Shoot {
            weapon: WeaponKind::Smg,
        }))
        .unwrap();
        assert_eq!(sound["type"], "sound");
        assert_eq!(sound["cue"], "shoot");
        assert_eq!(sound["weapon"], "smg");
    }
}
