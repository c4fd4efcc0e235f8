//! Remote state buffering and time-delayed interpolation
//!
//! Each remote peer gets a short history of the snapshots it sent, stamped with
//! local arrival time. Rendering looks slightly into the past (`now - delay`)
//! and blends the two snapshots bracketing that instant.

use crate::components::Millis;
use crate::entities::PlayerSnapshot;
use crate::math::{lerp, lerp_angle};
use crate::tuning::network;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone)]
struct TimedState {
    at: Millis,
    state: PlayerSnapshot,
}

/// Time-ordered snapshot history for one peer, capped in length
#[derive(Debug, Clone, Default)]
pub struct StateBuffer {
    entries: VecDeque<TimedState>,
}

impl StateBuffer {
    pub fn push(&mut self, at: Millis, state: PlayerSnapshot) {
        self.entries.push_back(TimedState { at, state });
        while self.entries.len() > network::STATE_BUFFER_LEN {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&PlayerSnapshot> {
        self.entries.back().map(|e| &e.state)
    }

    /// State at `render_time`: the blend of the bracketing pair, or the nearest
    /// endpoint untouched when `render_time` falls outside the buffer.
    pub fn sample(&self, render_time: Millis) -> Option<PlayerSnapshot> {
        if self.entries.len() < 2 {
            return self.latest().cloned();
        }
        if let Some(oldest) = self.entries.front()
            && render_time < oldest.at
        {
            return Some(oldest.state.clone());
        }

        let bracket = self
            .entries
            .iter()
            .zip(self.entries.iter().skip(1))
            .find(|(before, after)| before.at <= render_time && render_time <= after.at);

        let Some((before, after)) = bracket else {
            return self.latest().cloned();
        };

        let span = after.at.saturating_sub(before.at);
        let t = if span == 0 {
            1.0
        } else {
            (render_time - before.at) as f32 / span as f32
        };
        Some(interpolate(&before.state, &after.state, t))
    }
}

/// Blends position and heading; every other field comes from `b`
pub fn interpolate(a: &PlayerSnapshot, b: &PlayerSnapshot, t: f32) -> PlayerSnapshot {
    PlayerSnapshot {
        x: lerp(a.x, b.x, t),
        y: lerp(a.y, b.y, t),
        angle: lerp_angle(a.angle, b.angle, t),
        ..b.clone()
    }
}

/// Per-peer buffers. Only the network layer writes to these.
#[derive(Debug, Clone)]
pub struct GameSync {
    buffers: HashMap<String, StateBuffer>,
    interpolation_delay: Millis,
}

impl Default for GameSync {
    fn default() -> Self {
        Self::new(network::INTERPOLATION_DELAY_MS)
    }
}

impl GameSync {
    pub fn new(interpolation_delay: Millis) -> Self {
        Self {
            buffers: HashMap::new(),
            interpolation_delay,
        }
    }

    pub fn add_state(&mut self, peer_id: &str, state: PlayerSnapshot, now: Millis) {
        self.buffers
            .entry(peer_id.to_string())
            .or_default()
            .push(now, state);
    }

    pub fn interpolated_state(&self, peer_id: &str, now: Millis) -> Option<PlayerSnapshot> {
        let render_time = now.saturating_sub(self.interpolation_delay);
        self.buffers.get(peer_id)?.sample(render_time)
    }

    pub fn buffer(&self, peer_id: &str) -> Option<&StateBuffer> {
        self.buffers.get(peer_id)
    }

    pub fn remove_peer(&mut self, peer_id: &str) {
        self.buffers.remove(peer_id);
    }

    pub fn peers(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ToSnapshot;
    use crate::entities::Player;
    use glam::Vec2;
    use std::f32::consts::PI;

    fn state_at(x: f32, angle: f32) -> PlayerSnapshot {
        let mut p = Player::new("remote".into(), Vec2::new(x, 0.0), "r", 1, 0);
        p.body.angle = angle;
        p.snapshot()
    }

    #[test]
    fn interpolates_between_bracketing_samples() {
        let mut sync = GameSync::new(100);
        sync.add_state("peer", state_at(0.0, 0.0), 0);
        sync.add_state("peer", state_at(100.0, 0.0), 200);

        // render time = 200 - 100 = 100ms, halfway
        let mid = sync.interpolated_state("peer", 200).unwrap();
        assert!((mid.x - 50.0).abs() < 1e-4);
    }

    #[test]
    fn outside_the_buffered_range_returns_nearest_endpoint() {
        let mut sync = GameSync::new(100);
        sync.add_state("peer", state_at(0.0, 0.0), 1000);
        sync.add_state("peer", state_at(100.0, 0.0), 1200);

        let early = sync.interpolated_state("peer", 1050).unwrap();
        assert_eq!(early, state_at(0.0, 0.0));
        let late = sync.interpolated_state("peer", 5000).unwrap();
        assert_eq!(late, state_at(100.0, 0.0));
    }

    #[test]
    fn single_sample_is_returned_unmodified() {
        let mut sync = GameSync::default();
        assert!(sync.interpolated_state("peer", 0).is_none());
        sync.add_state("peer", state_at(7.0, 1.0), 0);
        assert_eq!(sync.interpolated_state("peer", 999).unwrap(), state_at(7.0, 1.0));
    }

    #[test]
    fn angles_take_the_short_way_round() {
        let a = state_at(0.0, 170f32.to_radians());
        let b = state_at(0.0, (-170f32).to_radians());
        let mid = interpolate(&a, &b, 0.5);
        assert!((mid.angle.abs() - PI).abs() < 1e-4);
    }

    #[test]
    fn buffer_is_capped_and_peers_are_removable() {
        let mut sync = GameSync::default();
        for i in 0..50 {
            sync.add_state("peer", state_at(i as f32, 0.0), i * 10);
        }
        let buffer = sync.buffer("peer").unwrap();
        assert_eq!(buffer.len(), network::STATE_BUFFER_LEN);
        assert_eq!(buffer.latest().unwrap().x, 49.0);

        sync.remove_peer("peer");
        assert!(sync.interpolated_state("peer", 1000).is_none());
        assert_eq!(sync.peers().count(), 0);
    }
}
