//! Projectiles: straight-line flight, trail history and expiry

use crate::components::{Body, Millis, ToSnapshot, WeaponKind};
use crate::math::direction;
use crate::tuning::{bullet as tuning, world};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A projectile in flight. Inactive bullets are swept by the session.
#[derive(Debug, Clone)]
pub struct Bullet {
    pub body: Body,
    pub owner_id: String,
    /// Weapon that fired it, reported with kills
    pub weapon: WeaponKind,
    pub damage: f32,
    pub radius: f32,
    pub color: String,
    pub explosion_radius: Option<f32>,
    pub trail: VecDeque<Vec2>,
    pub lifetime_ms: Millis,
}

impl Bullet {
    pub fn new(
        id: String,
        pos: Vec2,
        angle: f32,
        weapon: WeaponKind,
        owner_id: &str,
        now: Millis,
    ) -> Self {
        let spec = weapon.spec();
        let mut body = Body::new(id, pos, now);
        body.angle = angle;
        body.vel = direction(angle) * spec.bullet_speed;

        Self {
            body,
            owner_id: owner_id.to_string(),
            weapon,
            damage: spec.damage,
            radius: spec.bullet_size,
            color: spec.color.to_string(),
            explosion_radius: spec.explosion_radius,
            trail: VecDeque::with_capacity(tuning::TRAIL_LENGTH + 1),
            lifetime_ms: tuning::LIFETIME_MS,
        }
    }

    /// Overrides the weapon's damage (bots scale it by difficulty)
    pub fn with_damage(mut self, damage: f32) -> Self {
        self.damage = damage;
        self
    }

    pub fn is_explosive(&self) -> bool {
        self.explosion_radius.is_some()
    }

    pub fn update(&mut self, dt: f32, world_size: Vec2, now: Millis) {
        self.trail.push_back(self.body.pos);
        while self.trail.len() > tuning::TRAIL_LENGTH {
            self.trail.pop_front();
        }

        self.body.integrate(dt);

        let margin = Vec2::splat(world::BULLET_MARGIN);
        let p = self.body.pos;
        if p.cmplt(-margin).any() || p.cmpgt(world_size + margin).any() {
            self.body.active = false;
        }

        if now.saturating_sub(self.body.created_at) > self.lifetime_ms {
            self.body.active = false;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletSnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub angle: f32,
    pub owner_id: String,
    pub damage: f32,
    pub radius: f32,
    pub color: String,
    pub explosive: bool,
    pub explosion_radius: f32,
    pub trail: Vec<[f32; 2]>,
}

impl ToSnapshot for Bullet {
    type Snapshot = BulletSnapshot;

    fn snapshot(&self) -> BulletSnapshot {
        BulletSnapshot {
            id: self.body.id.clone(),
            x: self.body.pos.x,
            y: self.body.pos.y,
            vx: self.body.vel.x,
            vy: self.body.vel.y,
            angle: self.body.angle,
            owner_id: self.owner_id.clone(),
            damage: self.damage,
            radius: self.radius,
            color: self.color.clone(),
            explosive: self.is_explosive(),
            explosion_radius: self.explosion_radius.unwrap_or(0.0),
            trail: self.trail.iter().map(|p| p.to_array()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORLD: Vec2 = Vec2::new(2400.0, 2400.0);

    fn bullet(pos: Vec2, angle: f32, weapon: WeaponKind) -> Bullet {
        Bullet::new("b".into(), pos, angle, weapon, "p", 0)
    }

    #[test]
    fn travels_along_its_angle() {
        let mut b = bullet(Vec2::new(100.0, 100.0), 0.0, WeaponKind::Pistol);
        b.update(1.0, WORLD, 16);
        assert_eq!(b.body.pos, Vec2::new(110.0, 100.0));
        assert!(b.body.active);
        assert_eq!(b.weapon, WeaponKind::Pistol);
    }

    #[test]
    fn trail_is_bounded() {
        let mut b = bullet(Vec2::new(100.0, 100.0), 0.0, WeaponKind::Smg);
        for tick in 0..20 {
            b.update(1.0, WORLD, tick);
        }
        assert_eq!(b.trail.len(), tuning::TRAIL_LENGTH);
        assert_eq!(b.snapshot().trail.len(), tuning::TRAIL_LENGTH);
    }

    #[test]
    fn deactivates_past_margin_or_lifetime() {
        let left = std::f32::consts::PI;
        let mut b = bullet(Vec2::new(-45.0, 100.0), left, WeaponKind::Pistol);
        b.update(1.0, WORLD, 16);
        assert!(!b.body.active);

        let mut slow = bullet(Vec2::new(500.0, 500.0), 0.0, WeaponKind::RocketLauncher);
        slow.update(1.0, WORLD, tuning::LIFETIME_MS);
        assert!(slow.body.active);
        slow.update(1.0, WORLD, tuning::LIFETIME_MS + 1);
        assert!(!slow.body.active);
        assert!(slow.is_explosive());
    }
}
