//! Human-controlled combatant (local player and remote proxies)

use crate::components::{
    Body, Combatant, EffectKind, InputState, Millis, ToSnapshot, WeaponKind, WeaponSpec,
};
use crate::math::{clamp, direction, normalize};
use crate::tuning::player as tuning;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
pub struct Player {
    pub body: Body,
    pub name: String,
    pub radius: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub speed: f32,
    pub color: String,
    pub color_index: usize,

    pub weapon: WeaponKind,
    /// Remaining rounds per weapon; a missing entry means a full magazine
    weapon_ammo: HashMap<WeaponKind, u32>,
    last_fire_at: Option<Millis>,
    pub reloading: bool,
    reload_started_at: Millis,

    pub kills: u32,
    pub deaths: u32,
    pub score: u32,

    pub dashing: bool,
    dash_dir: Vec2,
    dash_started_at: Millis,
    last_dash_at: Option<Millis>,

    /// Effect kind -> expiry time
    effects: BTreeMap<EffectKind, Millis>,
    pub invincible: bool,
    spawned_at: Millis,
    pub dead: bool,
    pub died_at: Millis,

    pub input: InputState,
    pub aim: Vec2,
}

impl Player {
    pub fn new(id: String, pos: Vec2, name: &str, color_index: usize, now: Millis) -> Self {
        let name = if name.trim().is_empty() {
            "Player".to_string()
        } else {
            name.to_string()
        };

        Self {
            body: Body::new(id, pos, now),
            name,
            radius: tuning::RADIUS,
            hp: tuning::MAX_HP,
            max_hp: tuning::MAX_HP,
            speed: tuning::SPEED,
            color: tuning::COLORS[color_index % tuning::COLORS.len()].to_string(),
            color_index,
            weapon: WeaponKind::Pistol,
            weapon_ammo: HashMap::new(),
            last_fire_at: None,
            reloading: false,
            reload_started_at: 0,
            kills: 0,
            deaths: 0,
            score: 0,
            dashing: false,
            dash_dir: Vec2::ZERO,
            dash_started_at: 0,
            last_dash_at: None,
            effects: BTreeMap::new(),
            invincible: true,
            spawned_at: now,
            dead: false,
            died_at: 0,
            input: InputState::default(),
            aim: pos,
        }
    }

    /// Advance timers, movement and reload for one tick
    pub fn update(&mut self, dt: f32, world: Vec2, now: Millis) {
        if self.dead {
            return;
        }

        if self.invincible && now.saturating_sub(self.spawned_at) > tuning::SPAWN_INVINCIBILITY_MS {
            self.invincible = false;
        }

        self.effects.retain(|_, expires_at| now <= *expires_at);

        if self.dashing && now.saturating_sub(self.dash_started_at) > tuning::DASH_DURATION_MS {
            self.dashing = false;
        }

        if self.dashing {
            self.body.vel = self.dash_dir * tuning::DASH_SPEED;
        } else {
            let speed = if self.has_effect(EffectKind::Speed) {
                self.speed * tuning::SPEED_BOOST
            } else {
                self.speed
            };
            self.body.vel = normalize(self.input.direction()) * speed;
        }

        self.body.integrate(dt);
        self.body.pos.x = clamp(self.body.pos.x, self.radius, world.x - self.radius);
        self.body.pos.y = clamp(self.body.pos.y, self.radius, world.y - self.radius);

        if self.reloading {
            let spec = self.weapon.spec();
            if now.saturating_sub(self.reload_started_at) >= spec.reload_ms {
                if let Some(magazine) = spec.magazine {
                    self.weapon_ammo.insert(self.weapon, magazine);
                }
                self.reloading = false;
            }
        }
    }

    /// Starts a dash unless dead or still cooling down
    pub fn dash(&mut self, now: Millis) {
        if self.dead {
            return;
        }
        if let Some(last) = self.last_dash_at
            && now.saturating_sub(last) < tuning::DASH_COOLDOWN_MS
        {
            return;
        }

        let mut dir = self.input.direction();
        if dir == Vec2::ZERO {
            dir = direction(self.body.angle);
        }

        self.dash_dir = normalize(dir);
        self.dashing = true;
        self.dash_started_at = now;
        self.last_dash_at = Some(now);
    }

    /// Rounds left in the current weapon, `None` for infinite ammo
    pub fn ammo(&self) -> Option<u32> {
        let magazine = self.weapon.spec().magazine?;
        Some(self.weapon_ammo.get(&self.weapon).copied().unwrap_or(magazine))
    }

    /// HUD string: `∞` or `current/magazine`
    pub fn ammo_display(&self) -> String {
        match (self.ammo(), self.weapon.spec().magazine) {
            (Some(current), Some(magazine)) => format!("{current}/{magazine}"),
            _ => "∞".to_string(),
        }
    }

    pub fn can_fire(&self, now: Millis) -> bool {
        if self.dead || self.reloading {
            return false;
        }
        let spec = self.weapon.spec();
        if let Some(last) = self.last_fire_at
            && now.saturating_sub(last) < spec.fire_interval_ms
        {
            return false;
        }
        !matches!(self.ammo(), Some(0))
    }

    /// Consumes a round and hands back the weapon definition so the caller can
    /// spawn one bullet per pellet.
    pub fn fire(&mut self, now: Millis) -> Option<&'static WeaponSpec> {
        if !self.can_fire(now) {
            return None;
        }
        self.last_fire_at = Some(now);

        if let Some(current) = self.ammo() {
            self.weapon_ammo.insert(self.weapon, current.saturating_sub(1));
        }
        Some(self.weapon.spec())
    }

    pub fn reload(&mut self, now: Millis) {
        if self.reloading || self.dead {
            return;
        }
        let Some(magazine) = self.weapon.spec().magazine else {
            return;
        };
        if self.ammo().unwrap_or(magazine) >= magazine {
            return;
        }
        self.reloading = true;
        self.reload_started_at = now;
    }

    /// Equips `weapon`; returns true when the weapon actually changed
    pub fn switch_weapon(&mut self, weapon: WeaponKind) -> bool {
        if self.dead || weapon == self.weapon {
            return false;
        }
        self.weapon = weapon;
        self.reloading = false;
        true
    }

    pub fn die(&mut self, now: Millis) {
        self.dead = true;
        self.deaths += 1;
        self.died_at = now;
    }

    pub fn respawn(&mut self, pos: Vec2, now: Millis) {
        self.body.pos = pos;
        self.body.vel = Vec2::ZERO;
        self.hp = self.max_hp;
        self.dead = false;
        self.weapon = WeaponKind::Pistol;
        self.weapon_ammo.clear();
        self.reloading = false;
        self.effects.clear();
        self.invincible = true;
        self.spawned_at = now;
        self.dashing = false;
    }

    /// Records (or refreshes) a timed effect. Health is an instant heal.
    pub fn add_effect(&mut self, kind: EffectKind, duration_ms: Millis, now: Millis) {
        if kind == EffectKind::Health {
            self.hp = (self.hp + tuning::HEALTH_PICKUP_HP).min(self.max_hp);
            return;
        }
        self.effects.insert(kind, now + duration_ms);
    }

    pub fn has_effect(&self, kind: EffectKind) -> bool {
        self.effects.contains_key(&kind)
    }

    pub fn effects(&self) -> &BTreeMap<EffectKind, Millis> {
        &self.effects
    }

    /// Points the player at `target`
    pub fn aim_at(&mut self, target: Vec2) {
        self.aim = target;
        self.body.angle = crate::math::angle_between(self.body.pos, target);
    }

    /// Overwrites the replicated fields of a remote proxy
    pub fn apply_remote(&mut self, state: &PlayerSnapshot) {
        self.body.pos = Vec2::new(state.x, state.y);
        self.body.angle = state.angle;
        self.hp = state.hp;
        self.dead = state.dead;
        self.weapon = state.weapon;
        self.invincible = state.is_invincible;
        self.kills = state.kills;
        self.deaths = state.deaths;
        self.score = state.score;
    }
}

impl Combatant for Player {
    fn id(&self) -> &str {
        &self.body.id
    }

    fn position(&self) -> Vec2 {
        self.body.pos
    }

    fn radius(&self) -> f32 {
        self.radius
    }

    fn is_dead(&self) -> bool {
        self.dead
    }

    fn is_invincible(&self) -> bool {
        self.invincible
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn take_damage(&mut self, amount: f32, now: Millis) -> bool {
        if self.dead || self.invincible {
            return false;
        }
        let amount = if self.has_effect(EffectKind::Shield) {
            amount * 0.5
        } else {
            amount
        };

        self.hp = (self.hp - amount).max(0.0);
        if self.hp <= 0.0 {
            self.die(now);
            return true;
        }
        false
    }
}

/// Serialized player state, used both on the wire and by renderers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub vx: f32,
    #[serde(default)]
    pub vy: f32,
    #[serde(default)]
    pub angle: f32,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub name: String,
    pub hp: f32,
    #[serde(default = "default_max_hp")]
    pub max_hp: f32,
    pub weapon: WeaponKind,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub color_index: usize,
    #[serde(default)]
    pub kills: u32,
    #[serde(default)]
    pub deaths: u32,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub dead: bool,
    #[serde(default)]
    pub is_dashing: bool,
    #[serde(default)]
    pub is_invincible: bool,
    #[serde(default)]
    pub effects: BTreeMap<EffectKind, Millis>,
    #[serde(default)]
    pub reloading: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_hp() -> f32 {
    tuning::MAX_HP
}

impl ToSnapshot for Player {
    type Snapshot = PlayerSnapshot;

    fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.body.id.clone(),
            x: self.body.pos.x,
            y: self.body.pos.y,
            vx: self.body.vel.x,
            vy: self.body.vel.y,
            angle: self.body.angle,
            active: self.body.active,
            name: self.name.clone(),
            hp: self.hp,
            max_hp: self.max_hp,
            weapon: self.weapon,
            color: self.color.clone(),
            color_index: self.color_index,
            kills: self.kills,
            deaths: self.deaths,
            score: self.score,
            dead: self.dead,
            is_dashing: self.dashing,
            is_invincible: self.invincible,
            effects: self.effects.clone(),
            reloading: self.reloading,
        }
    }
}
