//! Shared building blocks for entities
//!
//! Every entity embeds a [`Body`] (the positional record) and adds its own
//! behaviour on top. Weapons and power-ups are closed enums with exhaustive
//! lookups into static tables, so adding a variant forces every table to be
//! updated.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Milliseconds on the simulation clock
pub type Millis = u64;

/// Position, motion and lifecycle fields common to every entity
#[derive(Debug, Clone)]
pub struct Body {
    pub id: String,
    pub pos: Vec2,
    pub vel: Vec2,
    pub angle: f32, // radians
    pub active: bool,
    pub created_at: Millis,
}

impl Body {
    pub fn new(id: String, pos: Vec2, now: Millis) -> Self {
        Self {
            id,
            pos,
            vel: Vec2::ZERO,
            angle: 0.0,
            active: true,
            created_at: now,
        }
    }

    /// Advance position by velocity; `dt` is in nominal 60 Hz frames
    pub fn integrate(&mut self, dt: f32) {
        self.pos += self.vel * dt;
    }

    pub fn distance_to(&self, other: &Body) -> f32 {
        self.pos.distance(other.pos)
    }
}

/// Entities that can produce a transmittable/renderable copy of themselves
pub trait ToSnapshot {
    type Snapshot: Serialize;

    fn snapshot(&self) -> Self::Snapshot;
}

/// Anything bullets and explosions can hit
pub trait Combatant {
    fn id(&self) -> &str;
    fn position(&self) -> Vec2;
    fn radius(&self) -> f32;
    fn is_dead(&self) -> bool;
    fn is_invincible(&self) -> bool;
    fn display_name(&self) -> &str;

    /// Applies damage; returns true when this hit killed the target
    fn take_damage(&mut self, amount: f32, now: Millis) -> bool;
}

/// Held movement/fire intent for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InputState {
    #[serde(default)]
    pub up: bool,
    #[serde(default)]
    pub down: bool,
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
    #[serde(default)]
    pub shooting: bool,
}

impl InputState {
    /// Raw (unnormalised) movement direction; diagonals have length √2
    pub fn direction(&self) -> Vec2 {
        let mut dir = Vec2::ZERO;
        if self.up {
            dir.y -= 1.0;
        }
        if self.down {
            dir.y += 1.0;
        }
        if self.left {
            dir.x -= 1.0;
        }
        if self.right {
            dir.x += 1.0;
        }
        dir
    }
}

/// Discrete actions produced by the input collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Dash,
    Reload,
    /// Weapon slot 1..=5
    SelectWeapon(u8),
    Scoreboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionEvent {
    pub action: Action,
    pub pressed: bool,
}

/// Everything the orchestration loop pulls from the input collaborator per tick
#[derive(Debug, Clone, Default)]
pub struct InputFrame {
    pub state: InputState,
    /// Aim target in world coordinates
    pub aim: Vec2,
    /// Fire button went down this tick
    pub fire_pressed: bool,
    pub actions: Vec<ActionEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WeaponKind {
    Pistol,
    Shotgun,
    Smg,
    Sniper,
    RocketLauncher,
}

/// Static weapon definition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponSpec {
    pub name: &'static str,
    pub damage: f32,
    pub fire_interval_ms: Millis,
    pub bullet_speed: f32,
    pub bullet_size: f32,
    pub spread: f32,
    pub pellets: u32,
    /// `None` means infinite ammo
    pub magazine: Option<u32>,
    pub reload_ms: Millis,
    pub color: &'static str,
    /// Blast radius for explosive rounds
    pub explosion_radius: Option<f32>,
    pub automatic: bool,
}

const PISTOL: WeaponSpec = WeaponSpec {
    name: "Pistol",
    damage: 20.0,
    fire_interval_ms: 400,
    bullet_speed: 10.0,
    bullet_size: 4.0,
    spread: 0.05,
    pellets: 1,
    magazine: None,
    reload_ms: 0,
    color: "#FFD700",
    explosion_radius: None,
    automatic: false,
};

const SHOTGUN: WeaponSpec = WeaponSpec {
    name: "Shotgun",
    damage: 12.0,
    fire_interval_ms: 800,
    bullet_speed: 9.0,
    bullet_size: 3.0,
    spread: 0.15,
    pellets: 6,
    magazine: Some(8),
    reload_ms: 1500,
    color: "#FF6347",
    explosion_radius: None,
    automatic: false,
};

const SMG: WeaponSpec = WeaponSpec {
    name: "SMG",
    damage: 10.0,
    fire_interval_ms: 100,
    bullet_speed: 11.0,
    bullet_size: 3.0,
    spread: 0.1,
    pellets: 1,
    magazine: Some(30),
    reload_ms: 1800,
    color: "#00CED1",
    explosion_radius: None,
    automatic: true,
};

const SNIPER: WeaponSpec = WeaponSpec {
    name: "Sniper",
    damage: 80.0,
    fire_interval_ms: 1200,
    bullet_speed: 18.0,
    bullet_size: 3.0,
    spread: 0.01,
    pellets: 1,
    magazine: Some(5),
    reload_ms: 2500,
    color: "#9370DB",
    explosion_radius: None,
    automatic: false,
};

const ROCKET_LAUNCHER: WeaponSpec = WeaponSpec {
    name: "Rocket",
    damage: 60.0,
    fire_interval_ms: 1500,
    bullet_speed: 6.0,
    bullet_size: 8.0,
    spread: 0.02,
    pellets: 1,
    magazine: Some(3),
    reload_ms: 3000,
    color: "#FF4500",
    explosion_radius: Some(80.0),
    automatic: false,
};

impl WeaponKind {
    pub const ALL: [WeaponKind; 5] = [
        WeaponKind::Pistol,
        WeaponKind::Shotgun,
        WeaponKind::Smg,
        WeaponKind::Sniper,
        WeaponKind::RocketLauncher,
    ];

    pub fn spec(self) -> &'static WeaponSpec {
        match self {
            WeaponKind::Pistol => &PISTOL,
            WeaponKind::Shotgun => &SHOTGUN,
            WeaponKind::Smg => &SMG,
            WeaponKind::Sniper => &SNIPER,
            WeaponKind::RocketLauncher => &ROCKET_LAUNCHER,
        }
    }

    /// Maps number keys 1..=5 to weapons; anything else is unknown
    pub fn from_slot(slot: u8) -> Option<WeaponKind> {
        match slot {
            1..=5 => Some(Self::ALL[usize::from(slot - 1)]),
            _ => None,
        }
    }
}

/// Timed effects and their pickups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectKind {
    Health,
    Speed,
    Shield,
    Damage,
}

impl EffectKind {
    pub const ALL: [EffectKind; 4] = [
        EffectKind::Health,
        EffectKind::Speed,
        EffectKind::Shield,
        EffectKind::Damage,
    ];

    /// Effect duration; zero for the instant heal
    pub fn duration_ms(self) -> Millis {
        match self {
            EffectKind::Health => 0,
            EffectKind::Speed => 8000,
            EffectKind::Shield => 10_000,
            EffectKind::Damage => 8000,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            EffectKind::Health => "#00FF00",
            EffectKind::Speed => "#00BFFF",
            EffectKind::Shield => "#FFD700",
            EffectKind::Damage => "#FF4444",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            EffectKind::Health => "+",
            EffectKind::Speed => "S",
            EffectKind::Shield => "O",
            EffectKind::Damage => "D",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EffectKind::Health => "HEALTH",
            EffectKind::Speed => "SPEED",
            EffectKind::Shield => "SHIELD",
            EffectKind::Damage => "DAMAGE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weapon_slots_cover_the_table_in_order() {
        assert_eq!(WeaponKind::from_slot(1), Some(WeaponKind::Pistol));
        assert_eq!(WeaponKind::from_slot(5), Some(WeaponKind::RocketLauncher));
        assert_eq!(WeaponKind::from_slot(0), None);
        assert_eq!(WeaponKind::from_slot(6), None);
    }

    #[test]
    fn only_pistol_has_infinite_ammo() {
        for kind in WeaponKind::ALL {
            assert_eq!(kind.spec().magazine.is_none(), kind == WeaponKind::Pistol);
        }
    }

    #[test]
    fn weapon_ids_use_wire_names() {
        let json = serde_json::to_string(&WeaponKind::RocketLauncher).unwrap();
        assert_eq!(json, "\"rocketLauncher\"");
        let kind: EffectKind = serde_json::from_str("\"shield\"").unwrap();
        assert_eq!(kind, EffectKind::Shield);
    }

    #[test]
    fn input_direction_accumulates_axes() {
        let input = InputState {
            up: true,
            right: true,
            ..Default::default()
        };
        assert_eq!(input.direction(), Vec2::new(1.0, -1.0));
    }
}
