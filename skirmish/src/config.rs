//! Runtime configuration from the environment
//!
//! Values come from process environment variables, optionally seeded from a
//! `.env` file. Gameplay balance lives in `tuning` instead.

use crate::simulation::{BotMode, SessionConfig};
use std::env;
use tracing::warn;

/// Loads `.env` if one exists; a missing file is not an error
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn relay_host() -> String {
    var_or("SKIRMISH_RELAY_HOST", "127.0.0.1")
}

pub fn relay_port() -> Result<u16, std::num::ParseIntError> {
    var_or("SKIRMISH_RELAY_PORT", "8080").parse()
}

/// Origin allowed by the relay's CORS layer
pub fn client_origin() -> String {
    let host = var_or("CLIENT_HOST", "localhost");
    let port = var_or("CLIENT_PORT", "5173");
    format!("http://{host}:{port}")
}

pub fn relay_url() -> String {
    var_or("SKIRMISH_RELAY_URL", "ws://127.0.0.1:8080/ws")
}

/// Room to join; `None` means create a new one
pub fn room_code() -> Option<String> {
    env::var("SKIRMISH_ROOM")
        .ok()
        .map(|code| code.trim().to_uppercase())
        .filter(|code| !code.is_empty())
}

pub fn player_name() -> String {
    var_or("SKIRMISH_PLAYER_NAME", "Player")
}

pub fn seed() -> u64 {
    match env::var("SKIRMISH_SEED") {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(value = %raw, "SKIRMISH_SEED is not a number, using 0");
            0
        }),
        Err(_) => 0,
    }
}

/// Parses `waves`, `fixed` or `fixed:<count>`
pub fn parse_bot_mode(raw: &str) -> Option<BotMode> {
    let raw = raw.trim().to_ascii_lowercase();
    match raw.split_once(':') {
        None if raw == "waves" => Some(BotMode::Waves),
        None if raw == "fixed" => Some(BotMode::Fixed {
            count: DEFAULT_FIXED_BOTS,
        }),
        Some(("fixed", count)) => count.parse().ok().map(|count| BotMode::Fixed { count }),
        _ => None,
    }
}

const DEFAULT_FIXED_BOTS: usize = 5;

pub fn bot_mode() -> BotMode {
    let raw = var_or("SKIRMISH_BOT_MODE", "waves");
    parse_bot_mode(&raw).unwrap_or_else(|| {
        warn!(value = %raw, "unknown SKIRMISH_BOT_MODE, using waves");
        BotMode::Waves
    })
}

/// Session settings for a peer started from the environment
pub fn session_config() -> SessionConfig {
    SessionConfig {
        player_name: player_name(),
        seed: seed(),
        bot_mode: bot_mode(),
        ..SessionConfig::default()
    }
}
