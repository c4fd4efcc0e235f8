//! Power-ups and weapon pickups lying on the map

use crate::components::{Body, EffectKind, Millis, ToSnapshot, WeaponKind};
use crate::tuning::items;
use glam::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct PowerUp {
    pub body: Body,
    pub kind: EffectKind,
    pub radius: f32,
}

impl PowerUp {
    pub fn new(id: String, pos: Vec2, kind: EffectKind, now: Millis) -> Self {
        Self {
            body: Body::new(id, pos, now),
            kind,
            radius: items::POWER_UP_RADIUS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeaponPickup {
    pub body: Body,
    pub weapon: WeaponKind,
    pub radius: f32,
}

impl WeaponPickup {
    pub fn new(id: String, pos: Vec2, weapon: WeaponKind, now: Millis) -> Self {
        Self {
            body: Body::new(id, pos, now),
            weapon,
            radius: items::WEAPON_PICKUP_RADIUS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerUpSnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub kind: EffectKind,
    pub color: String,
    pub symbol: String,
    pub radius: f32,
}

impl ToSnapshot for PowerUp {
    type Snapshot = PowerUpSnapshot;

    fn snapshot(&self) -> PowerUpSnapshot {
        PowerUpSnapshot {
            id: self.body.id.clone(),
            x: self.body.pos.x,
            y: self.body.pos.y,
            kind: self.kind,
            color: self.kind.color().to_string(),
            symbol: self.kind.symbol().to_string(),
            radius: self.radius,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponPickupSnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub weapon: WeaponKind,
    pub name: String,
    pub color: String,
    pub radius: f32,
}

impl ToSnapshot for WeaponPickup {
    type Snapshot = WeaponPickupSnapshot;

    fn snapshot(&self) -> WeaponPickupSnapshot {
        let spec = self.weapon.spec();
        WeaponPickupSnapshot {
            id: self.body.id.clone(),
            x: self.body.pos.x,
            y: self.body.pos.y,
            weapon: self.weapon,
            name: spec.name.to_string(),
            color: spec.color.to_string(),
            radius: self.radius,
        }
    }
}
