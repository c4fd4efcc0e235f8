//! Bot combatant driven by a patrol/chase/attack/flee state machine

use crate::components::{Body, Combatant, Millis, ToSnapshot, WeaponKind};
use crate::math::{angle_between, clamp, direction, random_range};
use crate::tuning::{enemy as tuning, player};
use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiState {
    /// Reserved; no transition leads here
    Idle,
    Patrol,
    Chase,
    Attack,
    Flee,
}

/// A shot requested by the bot this tick
#[derive(Debug, Clone, Copy)]
pub struct BotShot {
    pub angle: f32,
    pub weapon: WeaponKind,
    pub damage: f32,
}

#[derive(Debug, Clone)]
pub struct Enemy {
    pub body: Body,
    pub name: String,
    pub radius: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub speed: f32,
    pub damage: f32,
    pub color: String,
    pub difficulty: u8,
    pub weapon: WeaponKind,

    pub state: AiState,
    state_entered_at: Millis,
    patrol_target: Vec2,
    patrol_started_at: Millis,
    pub detection_range: f32,
    pub attack_range: f32,
    pub flee_threshold: f32,
    pub fire_interval_ms: Millis,
    pub accuracy: f32,
    last_fire_at: Option<Millis>,

    pub kills: u32,
    pub deaths: u32,
    pub score: u32,
    pub dead: bool,
    pub died_at: Millis,
}

impl Enemy {
    /// Builds a bot whose stats scale with `difficulty` (clamped to 1..=5)
    pub fn new(id: String, pos: Vec2, difficulty: u8, now: Millis) -> Self {
        let difficulty = difficulty.clamp(tuning::MIN_DIFFICULTY, tuning::MAX_DIFFICULTY);
        let d = f32::from(difficulty);
        let hp = tuning::BASE_HP + d * tuning::HP_PER_LEVEL;
        let short_id: String = id.chars().take(4).collect();
        let weapon = if difficulty > tuning::SMG_DIFFICULTY {
            WeaponKind::Smg
        } else {
            WeaponKind::Pistol
        };

        Self {
            body: Body::new(id, pos, now),
            name: format!("Bot-{short_id}"),
            radius: player::RADIUS,
            hp,
            max_hp: hp,
            speed: tuning::BASE_SPEED + d * tuning::SPEED_PER_LEVEL,
            damage: tuning::BASE_DAMAGE + d * tuning::DAMAGE_PER_LEVEL,
            color: tuning::COLOR.to_string(),
            difficulty,
            weapon,
            state: AiState::Patrol,
            state_entered_at: now,
            patrol_target: pos,
            patrol_started_at: now,
            detection_range: tuning::BASE_DETECTION + d * tuning::DETECTION_PER_LEVEL,
            attack_range: tuning::ATTACK_RANGE,
            flee_threshold: tuning::FLEE_HP_RATIO,
            fire_interval_ms: tuning::BASE_FIRE_INTERVAL_MS
                - u64::from(difficulty) * tuning::FIRE_INTERVAL_PER_LEVEL_MS,
            accuracy: tuning::BASE_ACCURACY + d * tuning::ACCURACY_PER_LEVEL,
            last_fire_at: None,
            kills: 0,
            deaths: 0,
            score: 0,
            dead: false,
            died_at: 0,
        }
    }

    fn hp_ratio(&self) -> f32 {
        if self.max_hp <= 0.0 {
            return 0.0;
        }
        self.hp / self.max_hp
    }

    fn enter(&mut self, state: AiState, now: Millis) {
        self.state = state;
        self.state_entered_at = now;
    }

    fn check_flee(&mut self, now: Millis) {
        if matches!(self.state, AiState::Chase | AiState::Attack)
            && self.hp_ratio() < self.flee_threshold
        {
            self.enter(AiState::Flee, now);
        }
    }

    /// Runs one tick of the state machine against the live player positions
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        targets: &[Vec2],
        world: Vec2,
        now: Millis,
        rng: &mut R,
    ) {
        if self.dead {
            return;
        }

        let nearest = targets
            .iter()
            .map(|&p| (p, self.body.pos.distance(p)))
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match self.state {
            AiState::Idle | AiState::Patrol => {
                self.patrol(dt, world, now, rng);
                if let Some((_, dist)) = nearest
                    && dist < self.detection_range
                {
                    self.enter(AiState::Chase, now);
                }
            }
            AiState::Chase => {
                match nearest {
                    Some((_, dist)) if dist > self.detection_range * tuning::CHASE_LOSE_FACTOR => {
                        self.enter(AiState::Patrol, now)
                    }
                    None => self.enter(AiState::Patrol, now),
                    Some((_, dist)) if dist < self.attack_range => {
                        self.enter(AiState::Attack, now)
                    }
                    Some((target, _)) => self.move_toward(target, dt),
                }
                self.check_flee(now);
            }
            AiState::Attack => {
                if let Some((target, dist)) = nearest {
                    self.body.angle = angle_between(self.body.pos, target);
                    if dist > self.attack_range * tuning::ATTACK_LEAVE_FACTOR {
                        self.enter(AiState::Chase, now);
                    } else if dist < self.attack_range * tuning::STRAFE_FACTOR {
                        self.strafe_around(target, dt);
                    }
                    self.check_flee(now);
                } else {
                    self.enter(AiState::Patrol, now);
                }
            }
            AiState::Flee => {
                if let Some((target, _)) = nearest {
                    let away = angle_between(target, self.body.pos);
                    self.body.pos += direction(away) * self.speed * tuning::FLEE_SPEED_FACTOR * dt;
                }
                if self.hp_ratio() > tuning::RECOVER_HP_RATIO
                    || now.saturating_sub(self.state_entered_at) > tuning::FLEE_TIMEOUT_MS
                {
                    self.enter(AiState::Patrol, now);
                }
            }
        }

        self.body.pos.x = clamp(self.body.pos.x, self.radius, world.x - self.radius);
        self.body.pos.y = clamp(self.body.pos.y, self.radius, world.y - self.radius);
    }

    fn patrol<R: Rng + ?Sized>(&mut self, dt: f32, world: Vec2, now: Millis, rng: &mut R) {
        if now.saturating_sub(self.patrol_started_at) > tuning::PATROL_REPICK_MS
            || self.body.pos.distance(self.patrol_target) < tuning::PATROL_ARRIVE_DISTANCE
        {
            self.patrol_target = Vec2::new(
                random_range(rng, tuning::PATROL_MARGIN, world.x - tuning::PATROL_MARGIN),
                random_range(rng, tuning::PATROL_MARGIN, world.y - tuning::PATROL_MARGIN),
            );
            self.patrol_started_at = now;
        }
        self.move_toward(self.patrol_target, dt);
    }

    fn move_toward(&mut self, target: Vec2, dt: f32) {
        let angle = angle_between(self.body.pos, target);
        self.body.angle = angle;
        self.body.pos += direction(angle) * self.speed * dt;
    }

    fn strafe_around(&mut self, target: Vec2, dt: f32) {
        let sideways = angle_between(self.body.pos, target) + FRAC_PI_2;
        self.body.pos += direction(sideways) * self.speed * tuning::STRAFE_SPEED_FACTOR * dt;
        self.body.angle = angle_between(self.body.pos, target);
    }

    pub fn can_fire(&self, now: Millis) -> bool {
        if self.dead || self.state != AiState::Attack {
            return false;
        }
        match self.last_fire_at {
            Some(last) => now.saturating_sub(last) > self.fire_interval_ms,
            None => true,
        }
    }

    /// Fires along the current facing perturbed by accuracy-derived spread
    pub fn fire<R: Rng + ?Sized>(&mut self, now: Millis, rng: &mut R) -> Option<BotShot> {
        if !self.can_fire(now) {
            return None;
        }
        self.last_fire_at = Some(now);

        let spread = (1.0 - self.accuracy) * tuning::SPREAD_SCALE;
        let jitter = random_range(rng, -0.5, 0.5) * spread;
        Some(BotShot {
            angle: self.body.angle + jitter,
            weapon: self.weapon,
            damage: self.damage,
        })
    }

    pub fn die(&mut self, now: Millis) {
        self.dead = true;
        self.deaths += 1;
        self.died_at = now;
    }

    pub fn respawn(&mut self, pos: Vec2, now: Millis) {
        self.body.pos = pos;
        self.hp = self.max_hp;
        self.dead = false;
        self.enter(AiState::Patrol, now);
        self.patrol_target = pos;
        self.patrol_started_at = now;
    }
}

impl Combatant for Enemy {
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
        false
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    /// Being shot wakes a patrolling bot, and a hit that drops it under the
    /// flee threshold makes it flee on the same tick.
    fn take_damage(&mut self, amount: f32, now: Millis) -> bool {
        if self.dead {
            return false;
        }
        self.hp = (self.hp - amount).max(0.0);
        if matches!(self.state, AiState::Patrol | AiState::Idle) {
            self.enter(AiState::Chase, now);
        }
        if self.hp <= 0.0 {
            self.die(now);
            return true;
        }
        self.check_flee(now);
        false
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnemySnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub name: String,
    pub hp: f32,
    pub max_hp: f32,
    pub color: String,
    pub dead: bool,
    pub state: AiState,
    pub weapon: WeaponKind,
    pub difficulty: u8,
    pub kills: u32,
    pub deaths: u32,
    pub score: u32,
    pub is_bot: bool,
}

impl ToSnapshot for Enemy {
    type Snapshot = EnemySnapshot;

    fn snapshot(&self) -> EnemySnapshot {
        EnemySnapshot {
            id: self.body.id.clone(),
            x: self.body.pos.x,
            y: self.body.pos.y,
            angle: self.body.angle,
            name: self.name.clone(),
            hp: self.hp,
            max_hp: self.max_hp,
            color: self.color.clone(),
            dead: self.dead,
            state: self.state,
            weapon: self.weapon,
            difficulty: self.difficulty,
            kills: self.kills,
            deaths: self.deaths,
            score: self.score,
            is_bot: true,
        }
    }
}
