use bevy::prelude::*;

use super::{Body, Steer, SteerContext};
use crate::game::math::cell_of;
use crate::game::spatial_index::CellRect;
use crate::game::types::AgentKind;

/// Spacing seeker: drifts toward the emptier side of its neighbourhood.
///
/// A move is committed for a short window so the agent does not jitter
/// between cells every tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SolitaryState {
    /// Unit cell step committed for the current window, zero for "stay".
    pub committed: IVec2,
    pub window_left: u32,
}

/// Occupancy of the four side bands around a cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BandCounts {
    pub up: u32,
    pub down: u32,
    pub left: u32,
    pub right: u32,
}

impl BandCounts {
    /// Bands as inclusive cell rectangles in up, down, left, right order.
    pub fn bands(cell: IVec2, band_cells: i32) -> [CellRect; 4] {
        let half = (band_cells.max(1) - 1) / 2;
        [
            CellRect::new(IVec2::new(cell.x - half, cell.y - 1), IVec2::new(cell.x + half, cell.y - 1)),
            CellRect::new(IVec2::new(cell.x - half, cell.y + 1), IVec2::new(cell.x + half, cell.y + 1)),
            CellRect::new(IVec2::new(cell.x - 1, cell.y - half), IVec2::new(cell.x - 1, cell.y + half)),
            CellRect::new(IVec2::new(cell.x + 1, cell.y - half), IVec2::new(cell.x + 1, cell.y + half)),
        ]
    }

    fn add(&mut self, band: usize, amount: u32) {
        match band {
            0 => self.up += amount,
            1 => self.down += amount,
            2 => self.left += amount,
            _ => self.right += amount,
        }
    }
}

/// Step along one axis toward the smaller count. Ties stay put; a reversal of
/// the previous step needs a lead larger than `tolerance`.
fn pick_axis(negative: u32, positive: u32, previous: i32, tolerance: u32) -> i32 {
    let step = match negative.cmp(&positive) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Greater => 1,
        std::cmp::Ordering::Equal => 0,
    };
    if step != 0 && step == -previous && negative.abs_diff(positive) <= tolerance {
        return 0;
    }
    step
}

impl SolitaryState {
    pub fn count_bands(body: &Body, ctx: &SteerContext) -> BandCounts {
        let tuning = &ctx.config.solitary;
        // Bands are measured in terrain cells; the index may be coarser or finer.
        let cell_size = ctx.terrain.cell_size();
        let cell = cell_of(body.pos, cell_size);
        let bands = BandCounts::bands(cell, tuning.band_cells);
        let mut counts = BandCounts::default();

        for (i, rect) in bands.iter().enumerate() {
            let covering = CellRect::new(
                ctx.index.cell_for(rect.min.as_vec2() * cell_size),
                ctx.index.cell_for((rect.max + IVec2::ONE).as_vec2() * cell_size),
            );
            let peers = ctx
                .index
                .query_cells(covering)
                .into_iter()
                .filter(|id| *id != body.id)
                .filter(|id| ctx.agents.kind_of(*id) == Some(AgentKind::SpacingSeeker))
                .filter(|id| {
                    ctx.index
                        .position(*id)
                        .is_some_and(|pos| rect.contains(cell_of(pos, cell_size)))
                })
                .count();
            counts.add(i, peers as u32);
        }

        if let Some(party) = ctx.targets.nearest_within(body.pos, tuning.sight_range) {
            let party_cell = cell_of(party.pos, cell_size);
            if let Some(i) = bands.iter().position(|rect| rect.contains(party_cell)) {
                counts.add(i, tuning.target_weight);
            }
        }
        counts
    }

    pub fn steer(&mut self, body: &Body, ctx: &SteerContext) -> Steer {
        if self.window_left > 0 {
            self.window_left -= 1;
            return Steer::moving(self.velocity(body.speed));
        }

        let tuning = &ctx.config.solitary;
        let counts = Self::count_bands(body, ctx);
        let previous = self.committed;
        let dy = pick_axis(counts.up, counts.down, previous.y, tuning.reverse_tolerance);
        let dx = pick_axis(counts.left, counts.right, previous.x, tuning.reverse_tolerance);
        let mut step = IVec2::new(dx, dy);

        let target_cell = cell_of(body.pos, ctx.terrain.cell_size()) + step;
        if step != IVec2::ZERO && ctx.terrain.is_blocked(target_cell) {
            step = IVec2::ZERO;
        }

        self.committed = step;
        self.window_left = tuning.window_ticks.saturating_sub(1);
        Steer::moving(self.velocity(body.speed))
    }

    fn velocity(&self, speed: f32) -> Vec2 {
        self.committed.as_vec2().normalize_or_zero() * speed
    }
}
