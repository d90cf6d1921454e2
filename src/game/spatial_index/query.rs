use bevy::prelude::*;
use bevy::math::I64Vec2;

use crate::game::types::AgentId;
use super::{CellRect, SpatialIndex};

impl SpatialIndex {
    /// Ids within `radius` of `center` (inclusive), sorted by id.
    pub fn query_radius(&self, center: Vec2, radius: f32) -> Vec<AgentId> {
        let mut out = Vec::new();
        self.query_radius_into(center, radius, &mut out);
        out
    }

    /// Allocation-free variant of [`SpatialIndex::query_radius`].
    /// Clears `out` before populating it.
    pub fn query_radius_into(&self, center: Vec2, radius: f32, out: &mut Vec<AgentId>) {
        out.clear();
        if radius < 0.0 || !center.is_finite() {
            return;
        }
        let radius_sq = radius * radius;
        let rect = CellRect::new(
            self.cell_for(center - Vec2::splat(radius)),
            self.cell_for(center + Vec2::splat(radius)),
        );
        self.for_each_in_rect(rect, |id| {
            if let Some(entry) = self.entries.get(&id) {
                if entry.pos.distance_squared(center) <= radius_sq {
                    out.push(id);
                }
            }
        });
        out.sort_unstable();
    }

    /// Every id whose cell lies in `rect`, sorted by id.
    pub fn query_cells(&self, rect: CellRect) -> Vec<AgentId> {
        let mut out = Vec::new();
        self.for_each_in_rect(rect, |id| out.push(id));
        out.sort_unstable();
        out
    }

    /// Number of ids in a single cell.
    pub fn cell_count(&self, cell: IVec2) -> usize {
        self.cells.get(&cell).map_or(0, |bucket| bucket.len())
    }

    fn for_each_in_rect(&self, rect: CellRect, mut visit: impl FnMut(AgentId)) {
        if rect.is_empty() {
            return;
        }
        let span = rect.max.as_i64vec2() - rect.min.as_i64vec2() + I64Vec2::ONE;
        // Sparse scan when the rectangle is much larger than the populated set.
        if span.x.saturating_mul(span.y) > self.cells.len() as i64 * 4 {
            for (cell, bucket) in &self.cells {
                if rect.contains(*cell) {
                    bucket.iter().copied().for_each(&mut visit);
                }
            }
            return;
        }
        for y in rect.min.y..=rect.max.y {
            for x in rect.min.x..=rect.max.x {
                if let Some(bucket) = self.cells.get(&IVec2::new(x, y)) {
                    bucket.iter().copied().for_each(&mut visit);
                }
            }
        }
    }
}
