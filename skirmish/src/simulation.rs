//! Game session: the per-tick orchestration loop
//!
//! A `GameSession` exclusively owns the local player, bots, bullets and
//! pickups, plus read-only proxies for remote players. Each call to
//! [`GameSession::step`] runs one tick in a fixed order:
//! - drain the network and apply remote events
//! - apply discrete actions and advance the local player
//! - run the wave director and bot AI
//! - move bullets and resolve hits, kills and pickups
//! - refresh remote proxies from interpolated state and broadcast ours
//!
//! Discrete notifications go out on a `tokio::sync::broadcast` channel; the
//! per-tick `WorldSnapshot` is returned to the caller.

use crate::components::{
    Action, ActionEvent, Combatant, EffectKind, InputFrame, Millis, ToSnapshot, WeaponKind,
};
use crate::entities::{
    Bullet, BulletSnapshot, Enemy, EnemySnapshot, Player, PlayerSnapshot, PowerUp, PowerUpSnapshot,
    WeaponPickup, WeaponPickupSnapshot,
};
use crate::events::{GameEvent, SoundCue};
use crate::map::MapData;
use crate::math::{direction, generate_id, random_int, random_range};
use crate::network::{NetEvent, NetworkManager};
use crate::physics::{BulletHit, Physics, explosion_damage, pickup_reached};
use crate::tuning::{enemy, items, network as net_tuning, player, world};
use crate::waves::{WaveEvent, WaveManager};
use crate::wire_format::{
    ChatPayload, HitPayload, KillPayload, PickupItem, PickupPayload, RespawnPayload, ShootPayload,
    WeaponPayload, WireMessage,
};
use glam::Vec2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const DAMAGE_BOOST: f32 = 1.5;

/// Where bots come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotMode {
    /// Spawned by the wave director; corpses are removed after a while
    Waves,
    /// A fixed roster that respawns after death
    Fixed { count: usize },
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub player_name: String,
    /// Seeds the session RNG (map layout, spawns, spread)
    pub seed: u64,
    pub world_size: Vec2,
    pub sync_rate: f32,
    pub interpolation_delay_ms: Millis,
    pub bot_mode: BotMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            player_name: "Player".to_string(),
            seed: 0,
            world_size: Vec2::new(world::WIDTH, world::HEIGHT),
            sync_rate: net_tuning::SYNC_RATE,
            interpolation_delay_ms: net_tuning::INTERPOLATION_DELAY_MS,
            bot_mode: BotMode::Waves,
        }
    }
}

/// HUD readout included in every frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HudState {
    pub wave: u32,
    pub wave_total: u32,
    pub enemies_alive: u32,
    pub latency: Option<Millis>,
    pub peer_count: usize,
    pub show_scoreboard: bool,
    pub ammo: String,
    pub reloading: bool,
}

/// Everything the renderer needs for one frame
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    pub tick: u64,
    pub local_id: String,
    /// Local player first, then remote proxies
    pub players: Vec<PlayerSnapshot>,
    pub enemies: Vec<EnemySnapshot>,
    pub bullets: Vec<BulletSnapshot>,
    pub power_ups: Vec<PowerUpSnapshot>,
    pub weapon_pickups: Vec<WeaponPickupSnapshot>,
    pub hud: HudState,
}

/// Result of a simulation step
#[derive(Debug, Clone)]
pub struct StepResult {
    pub tick: u64,
    pub snapshot: WorldSnapshot,
}

/// A combatant slot in the per-tick target list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Local,
    Bot(usize),
    Remote(usize),
}

pub struct GameSession {
    config: SessionConfig,
    running: bool,
    tick: u64,
    rng: StdRng,
    map: MapData,
    physics: Physics,

    local: Player,
    remotes: Vec<Player>,
    bots: Vec<Enemy>,
    bullets: Vec<Bullet>,
    power_ups: Vec<PowerUp>,
    weapon_pickups: Vec<WeaponPickup>,
    last_refill_at: Millis,

    waves: WaveManager,
    network: Option<NetworkManager>,
    events: broadcast::Sender<GameEvent>,
    show_scoreboard: bool,
}

impl GameSession {
    pub fn new(
        config: SessionConfig,
        map: MapData,
        network: Option<NetworkManager>,
        now: Millis,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let local_id = match &network {
            Some(net) => net.local_id().to_string(),
            None => generate_id(&mut rng),
        };
        let spawn = map.random_spawn(&mut rng);
        let local = Player::new(local_id, spawn, &config.player_name, 0, now);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let mut session = Self {
            physics: Physics::new(map.walls.clone()),
            waves: WaveManager::new(map.size()),
            config,
            running: true,
            tick: 0,
            rng,
            map,
            local,
            remotes: Vec::new(),
            bots: Vec::new(),
            bullets: Vec::new(),
            power_ups: Vec::new(),
            weapon_pickups: Vec::new(),
            last_refill_at: now,
            network,
            events,
            show_scoreboard: false,
        };

        session.place_initial_items(now);
        match session.config.bot_mode {
            BotMode::Waves => session.waves.start(),
            BotMode::Fixed { count } => {
                for _ in 0..count {
                    let pos = session.map.random_spawn(&mut session.rng);
                    let difficulty = random_int(&mut session.rng, 1, 3) as u8;
                    session.spawn_bot(pos, difficulty, now);
                }
            }
        }

        info!(
            player_id = %session.local.body.id,
            name = %session.local.name,
            online = session.network.is_some(),
            "session started"
        );
        session
    }

    /// Offline session on a generated arena
    pub fn offline(config: SessionConfig, now: Millis) -> Self {
        let map = generated_map(&config);
        Self::new(config, map, None, now)
    }

    /// Session over an already-joined room
    pub fn online(config: SessionConfig, network: NetworkManager, now: Millis) -> Self {
        let map = generated_map(&config);
        Self::new(config, map, Some(network), now)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn map(&self) -> &MapData {
        &self.map
    }

    pub fn local_player(&self) -> &Player {
        &self.local
    }

    pub fn local_player_mut(&mut self) -> &mut Player {
        &mut self.local
    }

    pub fn remote_players(&self) -> &[Player] {
        &self.remotes
    }

    pub fn bots(&self) -> &[Enemy] {
        &self.bots
    }

    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    pub fn power_ups(&self) -> &[PowerUp] {
        &self.power_ups
    }

    pub fn weapon_pickups(&self) -> &[WeaponPickup] {
        &self.weapon_pickups
    }

    pub fn network(&self) -> Option<&NetworkManager> {
        self.network.as_ref()
    }

    pub fn spawn_bot(&mut self, pos: Vec2, difficulty: u8, now: Millis) -> &mut Enemy {
        let id = generate_id(&mut self.rng);
        let bot = Enemy::new(id, pos, difficulty, now);
        debug!(bot = %bot.name, difficulty = bot.difficulty, "bot spawned");
        self.bots.push(bot);
        let index = self.bots.len() - 1;
        &mut self.bots[index]
    }

    pub fn place_power_up(&mut self, pos: Vec2, kind: EffectKind, now: Millis) {
        let id = generate_id(&mut self.rng);
        self.power_ups.push(PowerUp::new(id, pos, kind, now));
    }

    pub fn place_weapon_pickup(&mut self, pos: Vec2, weapon: WeaponKind, now: Millis) {
        let id = generate_id(&mut self.rng);
        self.weapon_pickups.push(WeaponPickup::new(id, pos, weapon, now));
    }

    /// Sends a chat line (trimmed, at most 200 characters) to every peer
    pub fn send_chat(&mut self, text: &str, now: Millis) {
        let text: String = text.trim().chars().take(net_tuning::CHAT_MAX_CHARS).collect();
        if text.is_empty() {
            return;
        }
        self.broadcast(
            WireMessage::Chat(ChatPayload {
                name: self.local.name.clone(),
                text: text.clone(),
            }),
            now,
        );
        self.emit(GameEvent::Chat {
            from: self.local.body.id.clone(),
            name: self.local.name.clone(),
            text,
        });
    }

    /// Ends the session: closes the network and drops all transient state.
    /// Further `step` calls are no-ops.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        if let Some(net) = &mut self.network {
            net.disconnect();
        }
        self.remotes.clear();
        self.bullets.clear();
        info!(tick = self.tick, "session stopped");
    }

    /// Advances the session by one tick. `dt` is in 60 Hz frames and is
    /// clamped to at most three frames.
    pub fn step(&mut self, dt: f32, now: Millis, input: &InputFrame) -> Option<StepResult> {
        if !self.running {
            return None;
        }
        let dt = dt.clamp(0.0, world::MAX_FRAME_DELTA);
        self.tick += 1;

        self.process_network(now);
        self.apply_actions(&input.actions, now);
        self.update_local_player(dt, input, now);
        self.run_waves(now);
        self.update_bots(dt, now);
        self.update_bullets(dt, now);
        self.resolve_bullet_hits(now);
        self.collect_pickups(now);
        self.refill_items(now);
        self.update_remote_players(now);
        self.sync_network(now);

        Some(StepResult {
            tick: self.tick,
            snapshot: self.snapshot(),
        })
    }

    fn emit(&self, event: GameEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn broadcast(&self, message: WireMessage, now: Millis) {
        if let Some(net) = &self.network {
            net.broadcast(message, now);
        }
    }

    fn world_size(&self) -> Vec2 {
        self.config.world_size
    }

    fn alive_bots(&self) -> u32 {
        self.bots.iter().filter(|bot| !bot.dead).count() as u32
    }

    fn place_initial_items(&mut self, now: Millis) {
        for (i, pos) in self.map.power_up_spots.clone().into_iter().enumerate() {
            let kind = EffectKind::ALL[i % EffectKind::ALL.len()];
            self.place_power_up(pos, kind, now);
        }
        // Pistol is the default weapon, so it is never placed
        let placeable = &WeaponKind::ALL[1..];
        for (i, pos) in self.map.weapon_spots.clone().into_iter().enumerate() {
            self.place_weapon_pickup(pos, placeable[i % placeable.len()], now);
        }
    }

    fn refill_items(&mut self, now: Millis) {
        if now.saturating_sub(self.last_refill_at) < items::REFILL_INTERVAL_MS {
            return;
        }
        self.last_refill_at = now;

        if self.power_ups.len() < items::MIN_PER_FAMILY && !self.map.power_up_spots.is_empty() {
            let spots = &self.map.power_up_spots;
            let pos = spots[random_int(&mut self.rng, 0, spots.len() as i32 - 1) as usize];
            let kind = EffectKind::ALL[random_int(&mut self.rng, 0, 3) as usize];
            self.place_power_up(pos, kind, now);
        }
        if self.weapon_pickups.len() < items::MIN_PER_FAMILY && !self.map.weapon_spots.is_empty() {
            let spots = &self.map.weapon_spots;
            let pos = spots[random_int(&mut self.rng, 0, spots.len() as i32 - 1) as usize];
            let weapon = WeaponKind::ALL[random_int(&mut self.rng, 1, 4) as usize];
            self.place_weapon_pickup(pos, weapon, now);
        }
    }

    fn apply_actions(&mut self, actions: &[ActionEvent], now: Millis) {
        for event in actions {
            if let Action::Scoreboard = event.action {
                self.show_scoreboard = event.pressed;
                continue;
            }
            if !event.pressed {
                continue;
            }

            match event.action {
                Action::Dash => {
                    let was_dashing = self.local.dashing;
                    self.local.dash(now);
                    if !was_dashing && self.local.dashing {
                        self.broadcast(WireMessage::Dash, now);
                        self.emit(GameEvent::Sound(SoundCue::Dash));
                    }
                }
                Action::Reload => {
                    let was_reloading = self.local.reloading;
                    self.local.reload(now);
                    if !was_reloading && self.local.reloading {
                        self.broadcast(WireMessage::Reload, now);
                        self.emit(GameEvent::Sound(SoundCue::Reload));
                    }
                }
                Action::SelectWeapon(slot) => {
                    if let Some(weapon) = WeaponKind::from_slot(slot)
                        && self.local.switch_weapon(weapon)
                    {
                        self.broadcast(WireMessage::Weapon(WeaponPayload { weapon }), now);
                    }
                }
                Action::Scoreboard => {}
            }
        }
    }

    fn update_local_player(&mut self, dt: f32, input: &InputFrame, now: Millis) {
        if self.local.dead {
            if now.saturating_sub(self.local.died_at) >= player::RESPAWN_MS {
                let pos = self.map.random_spawn(&mut self.rng);
                self.local.respawn(pos, now);
                info!(player_id = %self.local.body.id, "respawned");
                self.broadcast(WireMessage::Respawn(RespawnPayload { x: pos.x, y: pos.y }), now);
            }
            return;
        }

        self.local.input = input.state;
        self.local.aim_at(input.aim);
        self.local.update(dt, self.world_size(), now);
        self.physics
            .resolve_walls(&mut self.local.body.pos, self.local.radius);

        let automatic = self.local.weapon.spec().automatic;
        let wants_fire = if automatic {
            input.state.shooting
        } else {
            input.fire_pressed
        };
        if !wants_fire {
            return;
        }
        if self.local.fire(now).is_some() {
            let weapon = self.local.weapon;
            let angle = self.local.body.angle;
            let muzzle = self.local.body.pos
                + direction(angle) * (self.local.radius + player::MUZZLE_OFFSET);
            let owner = self.local.body.id.clone();
            self.spawn_pellets(weapon, muzzle, angle, &owner, now);

            self.broadcast(
                WireMessage::Shoot(ShootPayload {
                    x: muzzle.x,
                    y: muzzle.y,
                    angle,
                    weapon,
                }),
                now,
            );
            self.emit(GameEvent::Sound(SoundCue::Shoot { weapon }));
        }
    }

    /// One bullet per pellet, each with its own spread
    fn spawn_pellets(
        &mut self,
        weapon: WeaponKind,
        muzzle: Vec2,
        angle: f32,
        owner: &str,
        now: Millis,
    ) {
        let spec = weapon.spec();
        for _ in 0..spec.pellets {
            let pellet_angle = angle + random_range(&mut self.rng, -spec.spread, spec.spread);
            let id = generate_id(&mut self.rng);
            self.bullets
                .push(Bullet::new(id, muzzle, pellet_angle, weapon, owner, now));
        }
    }

    fn run_waves(&mut self, now: Millis) {
        if self.config.bot_mode != BotMode::Waves {
            return;
        }
        let alive = self.alive_bots() as usize;
        let events = self
            .waves
            .update(alive, &self.map.spawn_points, now, &mut self.rng);

        for event in events {
            match event {
                WaveEvent::WaveStarted { wave, count } => {
                    self.emit(GameEvent::WaveStarted { wave, count });
                    self.emit(GameEvent::announce(format!("WAVE {wave}"), "#FFD700"));
                }
                WaveEvent::Spawn(request) => {
                    self.spawn_bot(request.pos, request.difficulty, now);
                }
            }
        }
    }

    fn update_bots(&mut self, dt: f32, now: Millis) {
        let world_size = self.world_size();
        let mut targets = Vec::with_capacity(self.remotes.len() + 1);
        if !self.local.dead {
            targets.push(self.local.body.pos);
        }
        targets.extend(
            self.remotes
                .iter()
                .filter(|p| !p.dead)
                .map(|p| p.body.pos),
        );

        for bot in &mut self.bots {
            if bot.dead {
                continue;
            }
            bot.update(dt, &targets, world_size, now, &mut self.rng);
            self.physics.resolve_walls(&mut bot.body.pos, bot.radius);

            if let Some(shot) = bot.fire(now, &mut self.rng) {
                let muzzle =
                    bot.body.pos + direction(shot.angle) * (bot.radius + player::MUZZLE_OFFSET);
                let id = generate_id(&mut self.rng);
                self.bullets.push(
                    Bullet::new(id, muzzle, shot.angle, shot.weapon, &bot.body.id, now)
                        .with_damage(shot.damage),
                );
            }
        }

        match self.config.bot_mode {
            BotMode::Waves => self
                .bots
                .retain(|bot| !bot.dead || now.saturating_sub(bot.died_at) < enemy::CORPSE_MS),
            BotMode::Fixed { .. } => {
                for bot in &mut self.bots {
                    if bot.dead && now.saturating_sub(bot.died_at) >= enemy::RESPAWN_MS {
                        let pos = self.map.random_spawn(&mut self.rng);
                        bot.respawn(pos, now);
                    }
                }
            }
        }
    }

    fn update_bullets(&mut self, dt: f32, now: Millis) {
        let world_size = self.world_size();
        for bullet in &mut self.bullets {
            bullet.update(dt, world_size, now);
        }
        self.bullets.retain(|b| b.body.active);
    }

    /// Combatants in a fixed order: local player, bots, remote proxies
    fn targets(&self) -> Vec<&dyn Combatant> {
        let mut targets: Vec<&dyn Combatant> =
            Vec::with_capacity(1 + self.bots.len() + self.remotes.len());
        targets.push(&self.local);
        targets.extend(self.bots.iter().map(|b| b as &dyn Combatant));
        targets.extend(self.remotes.iter().map(|p| p as &dyn Combatant));
        targets
    }

    fn target_at(&self, index: usize) -> Target {
        match index {
            0 => Target::Local,
            i if i <= self.bots.len() => Target::Bot(i - 1),
            i => Target::Remote(i - 1 - self.bots.len()),
        }
    }

    fn damage_multiplier(&self, owner_id: &str) -> f32 {
        if owner_id == self.local.body.id && self.local.has_effect(EffectKind::Damage) {
            DAMAGE_BOOST
        } else {
            1.0
        }
    }

    fn resolve_bullet_hits(&mut self, now: Millis) {
        let bullets = std::mem::take(&mut self.bullets);
        let mut survivors = Vec::with_capacity(bullets.len());

        for bullet in bullets {
            let hit = {
                let targets = self.targets();
                self.physics.bullet_hit(&bullet, &targets)
            };
            match hit {
                None => survivors.push(bullet),
                Some(BulletHit::Wall) => {}
                Some(BulletHit::Target(index)) => self.resolve_hit(&bullet, index, now),
            }
        }

        self.bullets = survivors;
    }

    fn resolve_hit(&mut self, bullet: &Bullet, index: usize, now: Millis) {
        let damage = bullet.damage * self.damage_multiplier(&bullet.owner_id);

        let Some(radius) = bullet.explosion_radius else {
            self.apply_damage(self.target_at(index), damage, bullet, now);
            return;
        };

        let blast = {
            let targets = self.targets();
            explosion_damage(bullet.body.pos, radius, damage, &bullet.owner_id, &targets)
        };
        self.emit(GameEvent::Sound(SoundCue::Explosion));
        for (index, amount) in blast {
            self.apply_damage(self.target_at(index), amount, bullet, now);
        }
    }

    fn apply_damage(&mut self, target: Target, amount: f32, bullet: &Bullet, now: Millis) {
        let (killed, victim) = match target {
            // Remote players own their health; report the hit and move on
            Target::Remote(i) => {
                if bullet.owner_id == self.local.body.id {
                    let target = self.remotes[i].body.id.clone();
                    self.broadcast(WireMessage::Hit(HitPayload { target, damage: amount }), now);
                    self.emit(GameEvent::Sound(SoundCue::Hit));
                }
                return;
            }
            Target::Local => (
                self.local.take_damage(amount, now),
                (self.local.body.id.clone(), self.local.name.clone()),
            ),
            Target::Bot(i) => {
                let bot = &mut self.bots[i];
                let killed = bot.take_damage(amount, now);
                (killed, (bot.body.id.clone(), bot.name.clone()))
            }
        };

        if killed {
            let (victim_id, victim_name) = victim;
            self.record_kill(&bullet.owner_id, &victim_id, &victim_name, bullet.weapon, now);
        } else {
            self.emit(GameEvent::Sound(SoundCue::Hit));
        }
    }

    fn record_kill(
        &mut self,
        killer_id: &str,
        victim_id: &str,
        victim: &str,
        weapon: WeaponKind,
        now: Millis,
    ) {
        let killer_is_local = killer_id == self.local.body.id;
        let victim_is_local = victim_id == self.local.body.id;
        let killer = if killer_is_local {
            self.local.kills += 1;
            self.local.score += player::KILL_SCORE;
            self.local.name.clone()
        } else if let Some(bot) = self.bots.iter_mut().find(|b| b.body.id == killer_id) {
            bot.kills += 1;
            bot.score += player::KILL_SCORE;
            bot.name.clone()
        } else if let Some(remote) = self.remotes.iter().find(|p| p.body.id == killer_id) {
            // Credited on the remote peer and replicated back with its state
            remote.name.clone()
        } else {
            "Unknown".to_string()
        };

        info!(%killer, %victim, weapon = weapon.spec().name, "kill");
        self.emit(GameEvent::KillFeed {
            killer: killer.clone(),
            victim: victim.to_string(),
            weapon: weapon.spec().name.to_string(),
        });
        self.emit(GameEvent::Sound(if victim_is_local {
            SoundCue::Death
        } else {
            SoundCue::Kill
        }));

        if killer_is_local || victim_is_local {
            self.broadcast(
                WireMessage::Kill(KillPayload {
                    killer,
                    killer_id: killer_id.to_string(),
                    victim: victim.to_string(),
                    victim_id: victim_id.to_string(),
                    weapon,
                }),
                now,
            );
        }
    }

    fn collect_pickups(&mut self, now: Millis) {
        if self.local.dead {
            return;
        }

        while let Some(i) = self
            .power_ups
            .iter()
            .position(|p| pickup_reached(p.body.pos, p.radius, &self.local))
        {
            let power_up = self.power_ups.remove(i);
            let kind = power_up.kind;
            self.local.add_effect(kind, kind.duration_ms(), now);
            debug!(kind = kind.label(), "power-up collected");

            self.emit(GameEvent::PowerUpCollected { kind });
            self.emit(GameEvent::announce(kind.label(), kind.color()));
            self.emit(GameEvent::Sound(SoundCue::Pickup));
            self.broadcast_pickup(PickupItem::Effect(kind), power_up.body.pos, now);
        }

        while let Some(i) = self
            .weapon_pickups
            .iter()
            .position(|p| pickup_reached(p.body.pos, p.radius, &self.local))
        {
            let pickup = self.weapon_pickups.remove(i);
            let weapon = pickup.weapon;
            if self.local.switch_weapon(weapon) {
                self.broadcast(WireMessage::Weapon(WeaponPayload { weapon }), now);
            }
            debug!(weapon = weapon.spec().name, "weapon collected");

            self.emit(GameEvent::WeaponCollected { weapon });
            self.emit(GameEvent::announce(weapon.spec().name, weapon.spec().color));
            self.emit(GameEvent::Sound(SoundCue::Pickup));
            self.broadcast_pickup(PickupItem::Weapon(weapon), pickup.body.pos, now);
        }
    }

    fn broadcast_pickup(&self, kind: PickupItem, pos: Vec2, now: Millis) {
        self.broadcast(
            WireMessage::Pickup(PickupPayload {
                kind,
                x: pos.x,
                y: pos.y,
            }),
            now,
        );
    }

    /// A peer collected an item: drop our copy near that point
    fn remove_picked_item(&mut self, payload: &PickupPayload) {
        let at = Vec2::new(payload.x, payload.y);
        match payload.kind {
            PickupItem::Effect(kind) => {
                if let Some(i) = self
                    .power_ups
                    .iter()
                    .position(|p| p.kind == kind && p.body.pos.distance(at) <= p.radius)
                {
                    self.power_ups.remove(i);
                }
            }
            PickupItem::Weapon(weapon) => {
                if let Some(i) = self
                    .weapon_pickups
                    .iter()
                    .position(|p| p.weapon == weapon && p.body.pos.distance(at) <= p.radius)
                {
                    self.weapon_pickups.remove(i);
                }
            }
        }
    }

    fn remote_mut(&mut self, peer_id: &str) -> Option<&mut Player> {
        self.remotes.iter_mut().find(|p| p.body.id == peer_id)
    }

    fn process_network(&mut self, now: Millis) {
        let Some(net) = &mut self.network else {
            return;
        };
        let events = net.poll(now);

        for event in events {
            match event {
                // Wait for their `join` to learn the name
                NetEvent::PeerJoined(_) => {}
                NetEvent::PeerLeft(peer_id) => {
                    if let Some(i) = self.remotes.iter().position(|p| p.body.id == peer_id) {
                        let proxy = self.remotes.remove(i);
                        self.emit(GameEvent::announce(format!("{} left", proxy.name), "#FF6B6B"));
                        self.emit(GameEvent::PlayerLeft {
                            peer_id,
                            name: proxy.name,
                        });
                    }
                }
                NetEvent::Join { from, payload } => self.add_remote(from, &payload.name, now),
                // Proxies move only from interpolated state
                NetEvent::Input { from, .. } => debug!(peer_id = %from, "input ignored"),
                NetEvent::Shoot { from, payload } => {
                    let muzzle = Vec2::new(payload.x, payload.y);
                    self.spawn_pellets(payload.weapon, muzzle, payload.angle, &from, now);
                    self.emit(GameEvent::Sound(SoundCue::Shoot {
                        weapon: payload.weapon,
                    }));
                }
                NetEvent::Hit { from, payload } => self.emit(GameEvent::RemoteHit {
                    from,
                    target: payload.target,
                    damage: payload.damage,
                }),
                NetEvent::Kill { payload, .. } => {
                    let local_id = self.local.body.id.as_str();
                    if payload.killer_id == local_id && payload.victim_id != local_id {
                        self.local.kills += 1;
                        self.local.score += player::KILL_SCORE;
                    }
                    self.emit(GameEvent::KillFeed {
                        killer: payload.killer,
                        victim: payload.victim,
                        weapon: payload.weapon.spec().name.to_string(),
                    });
                }
                NetEvent::Respawn { from, payload } => {
                    if let Some(proxy) = self.remote_mut(&from) {
                        proxy.respawn(Vec2::new(payload.x, payload.y), now);
                    }
                }
                NetEvent::Chat { from, payload } => self.emit(GameEvent::Chat {
                    from,
                    name: payload.name,
                    text: payload.text,
                }),
                NetEvent::Pickup { payload, .. } => self.remove_picked_item(&payload),
                NetEvent::Dash { .. } => self.emit(GameEvent::Sound(SoundCue::Dash)),
                NetEvent::WeaponSwitch { from, weapon } => {
                    if let Some(proxy) = self.remote_mut(&from) {
                        proxy.switch_weapon(weapon);
                    }
                }
                NetEvent::Reload { .. } => self.emit(GameEvent::Sound(SoundCue::Reload)),
                NetEvent::Latency(millis) => self.emit(GameEvent::Latency { millis }),
                NetEvent::GameState(state) => {
                    if state.welcome {
                        self.emit(GameEvent::Welcome { wave: state.wave });
                    }
                }
                NetEvent::HostSync(sync) => self.emit(GameEvent::HostSync {
                    wave: sync.wave,
                    enemies_alive: sync.enemies_alive,
                }),
                NetEvent::Error(message) => self.emit(GameEvent::NetworkError { message }),
            }
        }
    }

    fn add_remote(&mut self, peer_id: String, name: &str, now: Millis) {
        if peer_id == self.local.body.id || self.remotes.iter().any(|p| p.body.id == peer_id) {
            return;
        }
        let slot = self.remotes.len() + 1;
        let pos = match self.map.spawn_points.len() {
            0 => self.map.size() / 2.0,
            n => self.map.spawn_points[slot % n],
        };
        let proxy = Player::new(peer_id.clone(), pos, name, slot, now);

        info!(%peer_id, name = %proxy.name, "player joined");
        self.emit(GameEvent::announce(format!("{} joined", proxy.name), "#4ECDC4"));
        self.emit(GameEvent::PlayerJoined {
            peer_id,
            name: proxy.name.clone(),
        });
        self.remotes.push(proxy);
    }

    fn update_remote_players(&mut self, now: Millis) {
        let Some(net) = &self.network else {
            return;
        };
        for proxy in &mut self.remotes {
            if let Some(state) = net.interpolated_state(&proxy.body.id, now) {
                proxy.apply_remote(&state);
            }
        }
    }

    fn sync_network(&mut self, now: Millis) {
        let alive = self.alive_bots();
        let wave = self.waves.wave();
        let snapshot = self.local.snapshot();
        let Some(net) = &mut self.network else {
            return;
        };
        net.set_host_state(wave, alive);
        net.broadcast_state(self.tick, &snapshot, now);
        net.maybe_ping(now);
        net.maybe_host_sync(now);
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        let mut players = Vec::with_capacity(self.remotes.len() + 1);
        players.push(self.local.snapshot());
        players.extend(self.remotes.iter().map(ToSnapshot::snapshot));

        let (latency, peer_count) = match &self.network {
            Some(net) => (net.latency(), net.player_count()),
            None => (None, 1),
        };

        WorldSnapshot {
            tick: self.tick,
            local_id: self.local.body.id.clone(),
            players,
            enemies: self.bots.iter().map(ToSnapshot::snapshot).collect(),
            bullets: self.bullets.iter().map(ToSnapshot::snapshot).collect(),
            power_ups: self.power_ups.iter().map(ToSnapshot::snapshot).collect(),
            weapon_pickups: self.weapon_pickups.iter().map(ToSnapshot::snapshot).collect(),
            hud: HudState {
                wave: self.waves.wave(),
                wave_total: self.waves.total_enemies(),
                enemies_alive: self.alive_bots(),
                latency,
                peer_count,
                show_scoreboard: self.show_scoreboard,
                ammo: self.local.ammo_display(),
                reloading: self.local.reloading,
            },
        }
    }
}

fn generated_map(config: &SessionConfig) -> MapData {
    // Separate stream so the layout depends on the seed alone
    let mut rng = StdRng::seed_from_u64(config.seed);
    MapData::generate(config.world_size.x, config.world_size.y, &mut rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ActionEvent, InputState};

    fn quiet_session() -> GameSession {
        let config = SessionConfig {
            bot_mode: BotMode::Fixed { count: 0 },
            ..SessionConfig::default()
        };
        let map = MapData::open_arena(800.0, 800.0);
        let mut session = GameSession::new(
            SessionConfig {
                world_size: map.size(),
                ..config
            },
            map,
            None,
            0,
        );
        session.local_player_mut().body.pos = Vec2::new(400.0, 400.0);
        session
    }

    fn press(action: Action) -> InputFrame {
        InputFrame {
            actions: vec![ActionEvent {
                action,
                pressed: true,
            }],
            ..InputFrame::default()
        }
    }

    #[test]
    fn stopped_sessions_do_not_step() {
        let mut session = quiet_session();
        assert!(session.step(1.0, 16, &InputFrame::default()).is_some());
        session.stop();
        assert!(session.step(1.0, 32, &InputFrame::default()).is_none());
        assert!(!session.is_running());
    }

    #[test]
    fn large_frame_deltas_are_clamped() {
        let mut session = quiet_session();
        let input = InputFrame {
            state: InputState {
                right: true,
                ..InputState::default()
            },
            aim: Vec2::new(800.0, 400.0),
            ..InputFrame::default()
        };
        session.step(50.0, 16, &input);
        let x = session.local_player().body.pos.x;
        assert!((x - (400.0 + player::SPEED * world::MAX_FRAME_DELTA)).abs() < 1e-3);
    }

    #[test]
    fn weapon_keys_switch_and_update_hud() {
        let mut session = quiet_session();
        let result = session.step(1.0, 16, &press(Action::SelectWeapon(3))).unwrap();
        assert_eq!(session.local_player().weapon, WeaponKind::Smg);
        assert_eq!(result.snapshot.hud.ammo, "30/30");

        session.step(1.0, 32, &press(Action::SelectWeapon(9)));
        assert_eq!(session.local_player().weapon, WeaponKind::Smg);
    }

    #[test]
    fn scoreboard_follows_press_and_release() {
        let mut session = quiet_session();
        let shown = session.step(1.0, 16, &press(Action::Scoreboard)).unwrap();
        assert!(shown.snapshot.hud.show_scoreboard);

        let release = InputFrame {
            actions: vec![ActionEvent {
                action: Action::Scoreboard,
                pressed: false,
            }],
            ..InputFrame::default()
        };
        let hidden = session.step(1.0, 32, &release).unwrap();
        assert!(!hidden.snapshot.hud.show_scoreboard);
    }

    #[test]
    fn shotgun_fires_one_bullet_per_pellet() {
        let mut session = quiet_session();
        session.step(1.0, 16, &press(Action::SelectWeapon(2)));
        let fire = InputFrame {
            aim: Vec2::new(700.0, 400.0),
            fire_pressed: true,
            ..InputFrame::default()
        };
        session.step(1.0, 32, &fire);
        assert_eq!(session.bullets().len(), 6);
        assert_eq!(session.local_player().ammo(), Some(7));
    }

    #[test]
    fn power_ups_apply_and_disappear() {
        let mut session = quiet_session();
        let mut events = session.subscribe();
        session.place_power_up(Vec2::new(400.0, 400.0), EffectKind::Speed, 0);

        session.step(1.0, 16, &InputFrame::default());
        assert!(session.power_ups().is_empty());
        assert!(session.local_player().has_effect(EffectKind::Speed));

        let mut collected = false;
        while let Ok(event) = events.try_recv() {
            collected |= event
                == GameEvent::PowerUpCollected {
                    kind: EffectKind::Speed,
                };
        }
        assert!(collected);
    }

    #[test]
    fn weapon_pickups_equip_the_weapon() {
        let mut session = quiet_session();
        session.place_weapon_pickup(Vec2::new(410.0, 400.0), WeaponKind::Sniper, 0);
        session.step(1.0, 16, &InputFrame::default());
        assert_eq!(session.local_player().weapon, WeaponKind::Sniper);
        assert!(session.weapon_pickups().is_empty());
    }

    #[test]
    fn dead_player_respawns_after_delay() {
        let mut session = quiet_session();
        session.local_player_mut().die(100);

        session.step(1.0, 100 + player::RESPAWN_MS - 1, &InputFrame::default());
        assert!(session.local_player().dead);

        session.step(1.0, 100 + player::RESPAWN_MS, &InputFrame::default());
        let me = session.local_player();
        assert!(!me.dead);
        assert_eq!(me.hp, me.max_hp);
        assert!(me.invincible);
    }

    #[test]
    fn wave_mode_spawns_the_first_wave() {
        let config = SessionConfig::default();
        let mut session = GameSession::new(config, MapData::open_arena(2400.0, 2400.0), None, 0);
        let mut events = session.subscribe();

        let result = session.step(1.0, 16, &InputFrame::default()).unwrap();
        assert_eq!(result.snapshot.hud.wave, 1);
        assert_eq!(result.snapshot.hud.wave_total, 5);
        assert_eq!(session.bots().len(), 1);
        assert_eq!(
            events.try_recv().ok(),
            Some(GameEvent::WaveStarted { wave: 1, count: 5 })
        );
    }

    #[test]
    fn fixed_mode_respawns_dead_bots() {
        let mut session = quiet_session();
        let bot = session.spawn_bot(Vec2::new(100.0, 100.0), 1, 0);
        bot.die(0);

        session.step(1.0, enemy::RESPAWN_MS - 1, &InputFrame::default());
        assert!(session.bots()[0].dead);
        session.step(1.0, enemy::RESPAWN_MS, &InputFrame::default());
        assert!(!session.bots()[0].dead);
    }

    #[test]
    fn generated_sessions_place_items_in_every_slot() {
        let session = GameSession::offline(
            SessionConfig {
                seed: 7,
                bot_mode: BotMode::Fixed { count: 2 },
                ..SessionConfig::default()
            },
            0,
        );
        assert_eq!(session.power_ups().len(), session.map().power_up_spots.len());
        assert_eq!(
            session.weapon_pickups().len(),
            session.map().weapon_spots.len()
        );
        assert!(
            session
                .weapon_pickups()
                .iter()
                .all(|p| p.weapon != WeaponKind::Pistol)
        );
        assert_eq!(session.bots().len(), 2);
    }

    #[test]
    fn chat_is_trimmed_and_capped() {
        let mut session = quiet_session();
        let mut events = session.subscribe();
        session.send_chat(&"x".repeat(300), 0);
        session.send_chat("   ", 0);

        match events.try_recv() {
            Ok(GameEvent::Chat { text, .. }) => assert_eq!(text.len(), 200),
            other => panic!("unexpected {other:?}"),
        }
        assert!(events.try_recv().is_err());
    }
}
