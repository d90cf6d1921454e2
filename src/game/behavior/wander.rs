use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::Rng;
use std::f32::consts::{PI, TAU};

use super::Body;
use crate::game::math::{cell_center, cell_of, heading, move_toward, wrap_angle};
use crate::game::terrain::{CellClass, TerrainQuery};

/// Jitter applied to every re-roll interval, in milliseconds either side.
const INTERVAL_JITTER_MS: i64 = 500;

/// Pitfalls closer than this many cells push the agent away.
const PITFALL_AVOID_CELLS: f32 = 1.25;

#[derive(Clone, Debug, PartialEq)]
pub struct WanderState {
    pub angle: f32,
    pub last_change_ms: u64,
    /// Jittered interval until the next re-roll.
    pub change_interval_ms: u64,
    pub interval_ms: u64,
}

impl WanderState {
    pub fn new(interval_ms: u64, now_ms: u64, rng: &mut StdRng) -> Self {
        Self {
            angle: rng.random_range(0.0..TAU),
            last_change_ms: now_ms,
            change_interval_ms: jittered(interval_ms, rng),
            interval_ms,
        }
    }

    pub fn reverse(&mut self) {
        self.angle = wrap_angle(self.angle + PI);
    }

    /// Point the heading somewhere specific and restart the re-roll timer.
    pub fn face(&mut self, angle: f32, now_ms: u64) {
        self.angle = wrap_angle(angle);
        self.last_change_ms = now_ms;
    }

    pub fn randomize(&mut self, now_ms: u64, rng: &mut StdRng) {
        self.angle = rng.random_range(0.0..TAU);
        self.last_change_ms = now_ms;
        self.change_interval_ms = jittered(self.interval_ms, rng);
    }
}

fn jittered(interval_ms: u64, rng: &mut StdRng) -> u64 {
    let jitter = rng.random_range(-INTERVAL_JITTER_MS..=INTERVAL_JITTER_MS);
    (interval_ms as i64 + jitter).max(0) as u64
}

/// Random-heading movement with edge and pitfall handling.
pub fn wander(
    state: &mut WanderState,
    body: &Body,
    terrain: &dyn TerrainQuery,
    now_ms: u64,
    rng: &mut StdRng,
) -> Vec2 {
    let mut rerolled = false;
    if now_ms.saturating_sub(state.last_change_ms) > state.change_interval_ms {
        state.randomize(now_ms, rng);
        rerolled = true;
    }

    let cell_size = terrain.cell_size();
    let grid = terrain.grid_size().as_ivec2();
    let cell = cell_of(body.pos, cell_size);
    let at_x_edge = cell.x == 0 || cell.x == grid.x - 1;
    let at_y_edge = cell.y == 0 || cell.y == grid.y - 1;

    if rerolled && (at_x_edge || at_y_edge) {
        let dir = heading(state.angle);
        let outward = (cell.x == 0 && dir.x < 0.0)
            || (cell.x == grid.x - 1 && dir.x > 0.0)
            || (cell.y == 0 && dir.y < 0.0)
            || (cell.y == grid.y - 1 && dir.y > 0.0);
        if outward && rng.random_bool(0.5) {
            state.reverse();
        }
    }

    if at_x_edge {
        let inward = IVec2::new(if cell.x == 0 { 1 } else { grid.x - 2 }, cell.y);
        if terrain.cell_class(inward) != CellClass::OuterWall {
            return move_toward(body.pos, cell_center(inward, cell_size), body.speed);
        }
    }
    if at_y_edge {
        let inward = IVec2::new(cell.x, if cell.y == 0 { 1 } else { grid.y - 2 });
        if terrain.cell_class(inward) != CellClass::OuterWall {
            return move_toward(body.pos, cell_center(inward, cell_size), body.speed);
        }
    }

    let mut velocity = heading(state.angle) * body.speed + pitfall_push(body, terrain);
    if terrain.is_pitfall(cell_of(body.pos + velocity, cell_size)) {
        state.reverse();
        velocity = heading(state.angle) * body.speed + pitfall_push(body, terrain);
        if terrain.is_pitfall(cell_of(body.pos + velocity, cell_size)) {
            return Vec2::ZERO;
        }
    }
    velocity
}

/// Repulsion from pitfall cells in the 3x3 neighbourhood, up to half speed.
pub fn pitfall_push(body: &Body, terrain: &dyn TerrainQuery) -> Vec2 {
    let cell_size = terrain.cell_size();
    if cell_size <= 0.0 {
        return Vec2::ZERO;
    }
    let cell = cell_of(body.pos, cell_size);
    let avoid_radius = cell_size * PITFALL_AVOID_CELLS;
    let max_strength = body.speed * 0.5;
    let mut push = Vec2::ZERO;

    for y in cell.y - 1..=cell.y + 1 {
        for x in cell.x - 1..=cell.x + 1 {
            let pit = IVec2::new(x, y);
            if !terrain.is_pitfall(pit) {
                continue;
            }
            let away = body.pos - cell_center(pit, cell_size);
            let dist = away.length();
            if dist <= 0.0 || dist >= avoid_radius {
                continue;
            }
            push += away / dist * (1.0 - dist / avoid_radius) * max_strength;
        }
    }
    push
}
