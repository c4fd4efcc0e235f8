//! Collision tests and resolution against the static wall set
//!
//! Everything here is a narrow-phase check run over every wall; at a few dozen
//! walls and a few hundred bullets there is no need for a broad phase.

use crate::components::Combatant;
use crate::entities::Bullet;
use crate::math::{Rect, circle_collision};
use glam::Vec2;

/// Samples taken along a line-of-sight ray
pub const LINE_OF_SIGHT_STEPS: u32 = 20;

/// Where a bullet ended up this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulletHit {
    Wall,
    /// Index into the target slice passed to [`Physics::bullet_hit`]
    Target(usize),
}

#[derive(Debug, Clone, Default)]
pub struct Physics {
    walls: Vec<Rect>,
}

impl Physics {
    pub fn new(walls: Vec<Rect>) -> Self {
        Self { walls }
    }

    pub fn walls(&self) -> &[Rect] {
        &self.walls
    }

    /// Pushes a circle out of every wall it penetrates along the axis of
    /// least overlap. Equal overlaps push along y. Corners are not rounded.
    pub fn resolve_walls(&self, pos: &mut Vec2, radius: f32) {
        for wall in &self.walls {
            if !wall.overlaps_circle(*pos, radius) {
                continue;
            }
            let delta = *pos - wall.center();
            let overlap_x = wall.w / 2.0 + radius - delta.x.abs();
            let overlap_y = wall.h / 2.0 + radius - delta.y.abs();

            if overlap_x < overlap_y {
                pos.x += if delta.x > 0.0 { overlap_x } else { -overlap_x };
            } else {
                pos.y += if delta.y > 0.0 { overlap_y } else { -overlap_y };
            }
        }
    }

    pub fn point_in_wall(&self, p: Vec2) -> bool {
        self.walls.iter().any(|wall| wall.contains(p))
    }

    /// First thing the bullet hits: a wall, else the first eligible target
    pub fn bullet_hit(&self, bullet: &Bullet, targets: &[&dyn Combatant]) -> Option<BulletHit> {
        if self.point_in_wall(bullet.body.pos) {
            return Some(BulletHit::Wall);
        }
        targets
            .iter()
            .position(|target| bullet_hits(bullet, *target))
            .map(BulletHit::Target)
    }

    /// Sampled ray test; true when no sample lands inside a wall
    pub fn line_of_sight(&self, from: Vec2, to: Vec2) -> bool {
        let step = (to - from) / LINE_OF_SIGHT_STEPS as f32;
        (0..=LINE_OF_SIGHT_STEPS).all(|i| !self.point_in_wall(from + step * i as f32))
    }
}

/// Circle overlap that ignores the shooter and dead or invincible targets
pub fn bullet_hits(bullet: &Bullet, target: &dyn Combatant) -> bool {
    if target.is_dead() || target.is_invincible() || target.id() == bullet.owner_id {
        return false;
    }
    circle_collision(bullet.body.pos, bullet.radius, target.position(), target.radius())
}

/// Pickup overlap with a live collector
pub fn pickup_reached(pickup_pos: Vec2, pickup_radius: f32, collector: &dyn Combatant) -> bool {
    !collector.is_dead()
        && circle_collision(pickup_pos, pickup_radius, collector.position(), collector.radius())
}

/// Damage dealt by a blast to each target inside its radius, as
/// `(target index, damage)`. Falloff is linear and reaches zero at the rim.
/// Walls do not shield targets.
pub fn explosion_damage(
    center: Vec2,
    radius: f32,
    damage: f32,
    owner_id: &str,
    targets: &[&dyn Combatant],
) -> Vec<(usize, f32)> {
    targets
        .iter()
        .enumerate()
        .filter(|(_, target)| !target.is_dead() && target.id() != owner_id)
        .filter_map(|(index, target)| {
            let dist = center.distance(target.position());
            (dist < radius).then(|| (index, damage * (1.0 - dist / radius)))
        })
        .collect()
}
