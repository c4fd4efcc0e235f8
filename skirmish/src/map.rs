//! Arena layout: walls, spawn points and item slots
//!
//! Layouts are generated from the session RNG, so two peers seeded alike see the
//! same arena.

use crate::math::{Rect, random_range};
use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

const BORDER: f32 = 20.0;
const CENTER_SIZE: f32 = 120.0;
const CENTER_GAP: f32 = 60.0;
const WALL_THICKNESS: f32 = 20.0;
const CORNER_OFFSET: f32 = 250.0;
const RANDOM_WALLS: usize = 12;
const RANDOM_WALL_MARGIN: f32 = 150.0;
/// Random walls are not placed within this distance of the centre on both axes
const CENTER_CLEARANCE: f32 = 160.0;
const SPAWN_MARGIN: f32 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapData {
    pub width: f32,
    pub height: f32,
    pub walls: Vec<Rect>,
    pub spawn_points: Vec<Vec2>,
    pub power_up_spots: Vec<Vec2>,
    pub weapon_spots: Vec<Vec2>,
}

impl MapData {
    /// Full arena: border, central box with four gaps, corner blocks and
    /// scattered interior walls.
    pub fn generate<R: Rng + ?Sized>(width: f32, height: f32, rng: &mut R) -> Self {
        let mut walls = border_walls(width, height);
        walls.extend(center_structure(width, height));
        walls.extend(corner_structures(width, height, rng));
        walls.extend(random_walls(width, height, RANDOM_WALLS, rng));

        Self {
            width,
            height,
            walls,
            spawn_points: spawn_points(width, height),
            power_up_spots: power_up_spots(width, height),
            weapon_spots: weapon_spots(width, height),
        }
    }

    /// Border walls and spawn points only; no obstacles and no items
    pub fn open_arena(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            walls: border_walls(width, height),
            spawn_points: spawn_points(width, height),
            power_up_spots: Vec::new(),
            weapon_spots: Vec::new(),
        }
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    /// Uniformly chosen spawn point; the arena centre when none exist
    pub fn random_spawn<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        if self.spawn_points.is_empty() {
            return self.size() / 2.0;
        }
        self.spawn_points[rng.random_range(0..self.spawn_points.len())]
    }
}

fn border_walls(w: f32, h: f32) -> Vec<Rect> {
    vec![
        Rect::new(0.0, 0.0, w, BORDER),
        Rect::new(0.0, h - BORDER, w, BORDER),
        Rect::new(0.0, 0.0, BORDER, h),
        Rect::new(w - BORDER, 0.0, BORDER, h),
    ]
}

fn center_structure(w: f32, h: f32) -> Vec<Rect> {
    let (cx, cy) = (w / 2.0, h / 2.0);
    let size = CENTER_SIZE;
    let half_gap = CENTER_GAP / 2.0;
    let t = WALL_THICKNESS;
    let span = size - half_gap;

    vec![
        // top and bottom edges, split by the gap
        Rect::new(cx - size, cy - size, span, t),
        Rect::new(cx + half_gap, cy - size, span, t),
        Rect::new(cx - size, cy + size - t, span, t),
        Rect::new(cx + half_gap, cy + size - t, span, t),
        // left and right edges
        Rect::new(cx - size, cy - size, t, span),
        Rect::new(cx - size, cy + half_gap, t, span),
        Rect::new(cx + size - t, cy - size, t, span),
        Rect::new(cx + size - t, cy + half_gap, t, span),
    ]
}

fn corner_structures<R: Rng + ?Sized>(w: f32, h: f32, rng: &mut R) -> Vec<Rect> {
    let o = CORNER_OFFSET;
    let corners = [
        Vec2::new(o, o),
        Vec2::new(w - o, o),
        Vec2::new(o, h - o),
        Vec2::new(w - o, h - o),
    ];

    let mut walls = Vec::new();
    for c in corners {
        let bw = random_range(rng, 60.0, 120.0);
        let bh = random_range(rng, 60.0, 120.0);
        walls.push(Rect::new(c.x - bw / 2.0, c.y - bh / 2.0, bw, bh));

        if rng.random_bool(0.5) {
            walls.push(Rect::new(c.x - bw / 2.0 - 50.0, c.y - 10.0, 40.0, 20.0));
        }
    }
    walls
}

fn random_walls<R: Rng + ?Sized>(w: f32, h: f32, attempts: usize, rng: &mut R) -> Vec<Rect> {
    let center = Vec2::new(w / 2.0, h / 2.0);
    let mut walls = Vec::new();

    for _ in 0..attempts {
        let x = random_range(rng, RANDOM_WALL_MARGIN, w - RANDOM_WALL_MARGIN);
        let y = random_range(rng, RANDOM_WALL_MARGIN, h - RANDOM_WALL_MARGIN);
        let (ww, wh) = if rng.random_bool(0.5) {
            (random_range(rng, 80.0, 200.0), WALL_THICKNESS)
        } else {
            (WALL_THICKNESS, random_range(rng, 80.0, 200.0))
        };

        if (x - center.x).abs() < CENTER_CLEARANCE && (y - center.y).abs() < CENTER_CLEARANCE {
            continue;
        }
        walls.push(Rect::new(x - ww / 2.0, y - wh / 2.0, ww, wh));
    }
    walls
}

fn spawn_points(w: f32, h: f32) -> Vec<Vec2> {
    let m = SPAWN_MARGIN;
    vec![
        Vec2::new(m, m),
        Vec2::new(w - m, m),
        Vec2::new(m, h - m),
        Vec2::new(w - m, h - m),
        Vec2::new(w / 2.0, m),
        Vec2::new(w / 2.0, h - m),
        Vec2::new(m, h / 2.0),
        Vec2::new(w - m, h / 2.0),
    ]
}

fn power_up_spots(w: f32, h: f32) -> Vec<Vec2> {
    vec![
        Vec2::new(w / 2.0, h / 2.0),
        Vec2::new(w / 4.0, h / 4.0),
        Vec2::new(w * 3.0 / 4.0, h / 4.0),
        Vec2::new(w / 4.0, h * 3.0 / 4.0),
        Vec2::new(w * 3.0 / 4.0, h * 3.0 / 4.0),
        Vec2::new(w / 2.0, h / 4.0),
        Vec2::new(w / 2.0, h * 3.0 / 4.0),
    ]
}

fn weapon_spots(w: f32, h: f32) -> Vec<Vec2> {
    vec![
        Vec2::new(w / 3.0, h / 3.0),
        Vec2::new(w * 2.0 / 3.0, h / 3.0),
        Vec2::new(w / 3.0, h * 2.0 / 3.0),
        Vec2::new(w * 2.0 / 3.0, h * 2.0 / 3.0),
        Vec2::new(w / 2.0, h / 6.0),
        Vec2::new(w / 2.0, h * 5.0 / 6.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn same_seed_same_arena() {
        let a = MapData::generate(2400.0, 2400.0, &mut StdRng::seed_from_u64(42));
        let b = MapData::generate(2400.0, 2400.0, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn layout_has_fixed_slots_and_bounded_walls() {
        let map = MapData::generate(2400.0, 2400.0, &mut StdRng::seed_from_u64(7));
        assert_eq!(map.spawn_points.len(), 8);
        assert_eq!(map.power_up_spots.len(), 7);
        assert_eq!(map.weapon_spots.len(), 6);
        // border + centre + 4..=8 corner pieces + at most 12 interior walls
        assert!(map.walls.len() >= 4 + 8 + 4);
        assert!(map.walls.len() <= 4 + 8 + 8 + RANDOM_WALLS);
    }

    #[test]
    fn interior_walls_avoid_the_centre() {
        let map = MapData::generate(2400.0, 2400.0, &mut StdRng::seed_from_u64(99));
        let center = Vec2::new(1200.0, 1200.0);
        // Skip border (4), centre box (8); corner blocks never sit near the centre
        for wall in &map.walls[12..] {
            let c = wall.center();
            let offset = (c - center).abs();
            assert!(offset.x >= CENTER_CLEARANCE || offset.y >= CENTER_CLEARANCE);
        }
    }

    #[test]
    fn spawn_points_are_clear_of_walls() {
        let map = MapData::open_arena(2400.0, 2400.0);
        for p in &map.spawn_points {
            assert!(map.walls.iter().all(|w| !w.overlaps_circle(*p, 20.0)));
        }
    }
}
