//! Gameplay tuning
//!
//! Balance numbers live here, separate from runtime configuration (ports,
//! URLs, log format). Durations are milliseconds of simulation time; speeds
//! are world units per nominal 60 Hz frame.

pub mod world {
    pub const WIDTH: f32 = 2400.0;
    pub const HEIGHT: f32 = 2400.0;
    pub const TICK_RATE: f32 = 60.0;
    /// Upper bound on the frame multiplier after a stall
    pub const MAX_FRAME_DELTA: f32 = 3.0;
    /// Bullets survive this far past the world edge
    pub const BULLET_MARGIN: f32 = 50.0;
}

pub mod player {
    pub const RADIUS: f32 = 20.0;
    pub const SPEED: f32 = 4.0;
    pub const MAX_HP: f32 = 100.0;
    pub const RESPAWN_MS: u64 = 3000;
    pub const DASH_SPEED: f32 = 12.0;
    pub const DASH_DURATION_MS: u64 = 150;
    pub const DASH_COOLDOWN_MS: u64 = 2000;
    pub const SPAWN_INVINCIBILITY_MS: u64 = 2000;
    pub const SPEED_BOOST: f32 = 1.6;
    pub const HEALTH_PICKUP_HP: f32 = 30.0;
    /// Distance from the player's centre to the muzzle beyond its radius
    pub const MUZZLE_OFFSET: f32 = 15.0;
    pub const KILL_SCORE: u32 = 100;
    pub const COLORS: [&str; 8] = [
        "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD", "#98D8C8", "#F7DC6F",
    ];
}

pub mod bullet {
    pub const LIFETIME_MS: u64 = 3000;
    pub const TRAIL_LENGTH: usize = 8;
}

pub mod enemy {
    pub const COLOR: &str = "#FF4444";
    pub const BASE_HP: f32 = 60.0;
    pub const HP_PER_LEVEL: f32 = 20.0;
    pub const BASE_SPEED: f32 = 2.0;
    pub const SPEED_PER_LEVEL: f32 = 0.5;
    pub const BASE_DAMAGE: f32 = 15.0;
    pub const DAMAGE_PER_LEVEL: f32 = 5.0;
    pub const BASE_DETECTION: f32 = 300.0;
    pub const DETECTION_PER_LEVEL: f32 = 50.0;
    pub const ATTACK_RANGE: f32 = 250.0;
    pub const FLEE_HP_RATIO: f32 = 0.25;
    pub const RECOVER_HP_RATIO: f32 = 0.5;
    pub const BASE_FIRE_INTERVAL_MS: u64 = 600;
    pub const FIRE_INTERVAL_PER_LEVEL_MS: u64 = 50;
    pub const BASE_ACCURACY: f32 = 0.85;
    pub const ACCURACY_PER_LEVEL: f32 = 0.03;
    pub const SPREAD_SCALE: f32 = 0.3;
    pub const MIN_DIFFICULTY: u8 = 1;
    pub const MAX_DIFFICULTY: u8 = 5;
    /// Difficulty above which bots carry an smg instead of a pistol
    pub const SMG_DIFFICULTY: u8 = 2;
    pub const PATROL_REPICK_MS: u64 = 2000;
    pub const PATROL_ARRIVE_DISTANCE: f32 = 20.0;
    pub const PATROL_MARGIN: f32 = 100.0;
    pub const FLEE_TIMEOUT_MS: u64 = 3000;
    pub const CHASE_LOSE_FACTOR: f32 = 1.5;
    pub const ATTACK_LEAVE_FACTOR: f32 = 1.3;
    pub const STRAFE_FACTOR: f32 = 0.5;
    pub const FLEE_SPEED_FACTOR: f32 = 1.2;
    pub const STRAFE_SPEED_FACTOR: f32 = 0.8;
    /// Legacy fixed-count mode: respawn delay after death
    pub const RESPAWN_MS: u64 = super::player::RESPAWN_MS + 2000;
    /// Wave mode: corpses are dropped after this long
    pub const CORPSE_MS: u64 = 10_000;
}

pub mod waves {
    pub const BASE_ENEMIES: u32 = 5;
    pub const ENEMIES_PER_WAVE: u32 = 3;
    pub const INITIAL_SPAWN_DELAY_MS: u64 = 800;
    pub const SPAWN_DELAY_STEP_MS: u64 = 30;
    pub const MIN_SPAWN_DELAY_MS: u64 = 200;
    pub const INITIAL_COOLDOWN_MS: u64 = 5000;
    pub const COOLDOWN_STEP_MS: u64 = 200;
    pub const MIN_COOLDOWN_MS: u64 = 2000;
    pub const SPAWN_JITTER: f32 = 50.0;
    pub const EDGE_MARGIN: f32 = 50.0;
}

pub mod items {
    pub const POWER_UP_RADIUS: f32 = 15.0;
    pub const WEAPON_PICKUP_RADIUS: f32 = 18.0;
    pub const REFILL_INTERVAL_MS: u64 = 10_000;
    pub const MIN_PER_FAMILY: usize = 3;
}

pub mod network {
    pub const SYNC_RATE: f32 = 20.0;
    pub const INTERPOLATION_DELAY_MS: u64 = 100;
    pub const STATE_BUFFER_LEN: usize = 30;
    pub const PING_INTERVAL_MS: u64 = 2000;
    pub const HOST_SYNC_INTERVAL_MS: u64 = 5000;
    pub const MAX_PLAYERS: usize = 8;
    pub const ROOM_CODE_LENGTH: usize = 6;
    pub const CHAT_MAX_CHARS: usize = 200;
    pub const JOIN_TIMEOUT_MS: u64 = 10_000;
}
