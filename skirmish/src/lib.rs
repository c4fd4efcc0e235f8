//! Peer-to-peer top-down shooter core
//!
//! Each peer runs its own [`simulation::GameSession`]: local player, bots,
//! bullets and pickups are simulated locally, and only player state travels
//! between peers. The room relay in [`relay`] forwards envelopes and nothing
//! else.

pub mod components;
pub mod config;
pub mod entities;
pub mod events;
pub mod map;
pub mod math;
pub mod network;
pub mod physics;
pub mod relay;
pub mod simulation;
pub mod sync;
pub mod telemetry;
pub mod transport;
pub mod tuning;
pub mod waves;
pub mod wire_format;
