//! Wave director
//!
//! Paces bot spawns: when the arena is clear and the inter-wave cooldown has
//! run out, a new wave queues `BASE + (n - 1) * GROWTH` spawn requests, which
//! are released one at a time at a delay that shrinks as waves progress.

use crate::components::Millis;
use crate::math::{clamp, random_int, random_range};
use crate::tuning::{enemy, waves as tuning};
use glam::Vec2;
use rand::Rng;
use std::collections::VecDeque;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRequest {
    pub pos: Vec2,
    pub difficulty: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaveEvent {
    WaveStarted { wave: u32, count: u32 },
    Spawn(SpawnRequest),
}

/// Bots in wave `wave` (1-based)
pub fn enemy_count(wave: u32) -> u32 {
    tuning::BASE_ENEMIES + wave.saturating_sub(1) * tuning::ENEMIES_PER_WAVE
}

/// Delay between individual spawns once `wave` has started
pub fn spawn_delay_ms(wave: u32) -> Millis {
    tuning::INITIAL_SPAWN_DELAY_MS
        .saturating_sub(u64::from(wave) * tuning::SPAWN_DELAY_STEP_MS)
        .max(tuning::MIN_SPAWN_DELAY_MS)
}

/// Quiet period after `wave` is cleared
pub fn cooldown_ms(wave: u32) -> Millis {
    tuning::INITIAL_COOLDOWN_MS
        .saturating_sub(u64::from(wave) * tuning::COOLDOWN_STEP_MS)
        .max(tuning::MIN_COOLDOWN_MS)
}

/// Lowest difficulty a bot in `wave` can have
pub fn base_difficulty(wave: u32) -> u8 {
    let level = 1 + wave / 3;
    level.min(u32::from(enemy::MAX_DIFFICULTY)) as u8
}

#[derive(Debug, Clone)]
pub struct WaveManager {
    wave: u32,
    total_this_wave: u32,
    started: bool,
    queue: VecDeque<SpawnRequest>,
    spawn_delay_ms: Millis,
    cooldown_ms: Millis,
    last_spawn_at: Option<Millis>,
    /// First tick the previous wave was seen cleared; `None` before wave 1
    cleared_at: Option<Millis>,
    world: Vec2,
}

impl WaveManager {
    pub fn new(world: Vec2) -> Self {
        Self {
            wave: 0,
            total_this_wave: 0,
            started: false,
            queue: VecDeque::new(),
            spawn_delay_ms: tuning::INITIAL_SPAWN_DELAY_MS,
            cooldown_ms: tuning::INITIAL_COOLDOWN_MS,
            last_spawn_at: None,
            cleared_at: None,
            world,
        }
    }

    /// Resets to wave 0; the next update begins wave 1 immediately
    pub fn start(&mut self) {
        self.started = true;
        self.wave = 0;
        self.total_this_wave = 0;
        self.queue.clear();
        self.spawn_delay_ms = tuning::INITIAL_SPAWN_DELAY_MS;
        self.cooldown_ms = tuning::INITIAL_COOLDOWN_MS;
        self.last_spawn_at = None;
        self.cleared_at = None;
    }

    pub fn wave(&self) -> u32 {
        self.wave
    }

    pub fn total_enemies(&self) -> u32 {
        self.total_this_wave
    }

    pub fn pending_spawns(&self) -> usize {
        self.queue.len()
    }

    pub fn update<R: Rng + ?Sized>(
        &mut self,
        alive: usize,
        spawn_points: &[Vec2],
        now: Millis,
        rng: &mut R,
    ) -> Vec<WaveEvent> {
        let mut events = Vec::new();
        if !self.started {
            return events;
        }

        if alive == 0 && self.queue.is_empty() {
            let ready = match self.cleared_at {
                None if self.wave == 0 => true,
                None => {
                    self.cleared_at = Some(now);
                    false
                }
                Some(cleared) => now.saturating_sub(cleared) >= self.cooldown_ms,
            };
            if ready {
                events.push(self.start_next_wave(spawn_points, rng));
            }
        }

        if !self.queue.is_empty() {
            let due = self
                .last_spawn_at
                .is_none_or(|last| now.saturating_sub(last) >= self.spawn_delay_ms);
            if due && let Some(request) = self.queue.pop_front() {
                self.last_spawn_at = Some(now);
                events.push(WaveEvent::Spawn(request));
            }
        }

        events
    }

    fn start_next_wave<R: Rng + ?Sized>(
        &mut self,
        spawn_points: &[Vec2],
        rng: &mut R,
    ) -> WaveEvent {
        self.wave += 1;
        self.cleared_at = None;

        let count = enemy_count(self.wave);
        let floor = base_difficulty(self.wave);
        let max_bonus = (self.wave / 4).min(2) as i32;
        self.total_this_wave = count;

        let fallback = [self.world / 2.0];
        let points = if spawn_points.is_empty() {
            &fallback[..]
        } else {
            spawn_points
        };
        let margin = tuning::EDGE_MARGIN;

        self.queue = (0..count)
            .map(|_| {
                let sp = points[rng.random_range(0..points.len())];
                let jitter = Vec2::new(
                    random_range(rng, -tuning::SPAWN_JITTER, tuning::SPAWN_JITTER),
                    random_range(rng, -tuning::SPAWN_JITTER, tuning::SPAWN_JITTER),
                );
                let bonus = random_int(rng, 0, max_bonus) as u8;
                SpawnRequest {
                    pos: Vec2::new(
                        clamp(sp.x + jitter.x, margin, self.world.x - margin),
                        clamp(sp.y + jitter.y, margin, self.world.y - margin),
                    ),
                    difficulty: (floor + bonus).min(enemy::MAX_DIFFICULTY),
                }
            })
            .collect();

        self.spawn_delay_ms = spawn_delay_ms(self.wave);
        self.cooldown_ms = cooldown_ms(self.wave);

        info!(wave = self.wave, count, "wave started");
        WaveEvent::WaveStarted {
            wave: self.wave,
            count,
        }
    }
}
