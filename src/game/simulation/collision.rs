/// Collision resolution against terrain and neighbours.
///
/// This module handles:
/// - Axis-separated circle-vs-cell terrain resolution
/// - Damageable wall contact reporting
/// - Separation from the closest neighbour

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::Rng;
use smallvec::SmallVec;
use std::f32::consts::{FRAC_PI_2, TAU};

use crate::game::behavior::Behavior;
use crate::game::config::WallHugConfig;
use crate::game::math::{angle_delta, cell_of, circle_overlaps_cell, heading};
use crate::game::spatial_index::SpatialIndex;
use crate::game::terrain::{CellClass, TerrainQuery};
use crate::game::types::AgentId;

use super::resources::AgentTable;

// ============================================================================
// Terrain
// ============================================================================

/// Cells an agent cannot enter.
pub fn is_solid(class: CellClass) -> bool {
    matches!(class, CellClass::Wall | CellClass::OuterWall)
}

/// First solid cell the circle overlaps, scanning row-major.
pub fn overlapping_solid(terrain: &dyn TerrainQuery, center: Vec2, radius: f32) -> Option<(IVec2, CellClass)> {
    let cell_size = terrain.cell_size();
    let min = cell_of(center - Vec2::splat(radius), cell_size);
    let max = cell_of(center + Vec2::splat(radius), cell_size);
    for y in min.y..=max.y {
        for x in min.x..=max.x {
            let cell = IVec2::new(x, y);
            let class = terrain.cell_class(cell);
            if is_solid(class) && circle_overlaps_cell(center, radius, cell, cell_size) {
                return Some((cell, class));
            }
        }
    }
    None
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerrainResolution {
    pub pos: Vec2,
    pub blocked_x: bool,
    pub blocked_y: bool,
    /// Damageable cells touched this step.
    pub contacts: SmallVec<[IVec2; 2]>,
}

impl TerrainResolution {
    pub fn blocked(&self) -> bool {
        self.blocked_x || self.blocked_y
    }
}

/// Move along x, then along y from the resolved x. An axis whose target
/// position overlaps a solid cell is not moved at all.
pub fn resolve_terrain(terrain: &dyn TerrainQuery, pos: Vec2, radius: f32, velocity: Vec2) -> TerrainResolution {
    let mut out = TerrainResolution { pos, ..default() };

    if velocity.x != 0.0 {
        let next = Vec2::new(out.pos.x + velocity.x, out.pos.y);
        match overlapping_solid(terrain, next, radius) {
            Some((cell, class)) => {
                out.blocked_x = true;
                if class.is_damageable() {
                    out.contacts.push(cell);
                }
            }
            None => out.pos.x = next.x,
        }
    }

    if velocity.y != 0.0 {
        let next = Vec2::new(out.pos.x, out.pos.y + velocity.y);
        match overlapping_solid(terrain, next, radius) {
            Some((cell, class)) => {
                out.blocked_y = true;
                if class.is_damageable() && !out.contacts.contains(&cell) {
                    out.contacts.push(cell);
                }
            }
            None => out.pos.y = next.y,
        }
    }

    out
}

// ============================================================================
// Separation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: AgentId,
    pub pos: Vec2,
    pub radius: f32,
    pub dist_sq: f32,
}

/// Closest other live agent within `distance` of `probe`, skipping kinds
/// `behavior` does not separate from. Ties go to the lower id.
pub fn closest_neighbor(
    self_id: AgentId,
    behavior: &Behavior,
    probe: Vec2,
    distance: f32,
    index: &SpatialIndex,
    agents: &AgentTable,
) -> Option<Neighbor> {
    let limit = distance * distance;
    let mut best: Option<Neighbor> = None;
    for id in index.query_radius(probe, distance) {
        if id == self_id {
            continue;
        }
        let Some(other) = agents.get(id).filter(|a| a.is_alive()) else {
            continue;
        };
        if !behavior.separates_from(other.kind()) {
            continue;
        }
        let dist_sq = other.pos.distance_squared(probe);
        if dist_sq < limit && best.is_none_or(|b| dist_sq < b.dist_sq) {
            best = Some(Neighbor { id, pos: other.pos, radius: other.radius, dist_sq });
        }
    }
    best
}

/// Steer straight away from the closest neighbour at the current speed.
///
/// Wall-huggers that actually touch the neighbour sometimes turn around
/// instead, and never let separation swing them more than 90 degrees off
/// the heading they wanted.
#[allow(clippy::too_many_arguments)]
pub fn separate(
    behavior: &mut Behavior,
    pos: Vec2,
    radius: f32,
    speed: f32,
    velocity: Vec2,
    neighbor: Neighbor,
    tuning: &WallHugConfig,
    rng: &mut StdRng,
) -> Vec2 {
    let next = pos + velocity;
    let is_hugger = matches!(behavior, Behavior::WallHugger(_));

    if let Some(hug) = behavior.wall_hug_mut() {
        let bump = radius + neighbor.radius;
        if neighbor.dist_sq < bump * bump && rng.random_bool(tuning.bump_reverse_chance as f64) {
            let angle = hug.bump_reverse();
            return heading(angle) * speed;
        }
    }

    let away = next - neighbor.pos;
    let dir = if away.length_squared() > 0.0 {
        away.normalize()
    } else {
        heading(rng.random_range(0.0..TAU))
    };
    let mut out = dir * speed;

    if is_hugger && velocity != Vec2::ZERO {
        let wanted = velocity.to_angle();
        let diff = angle_delta(wanted, out.to_angle());
        if diff.abs() > FRAC_PI_2 {
            out = heading(wanted + FRAC_PI_2.copysign(diff)) * speed;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::terrain::GridTerrain;

    #[test]
    fn test_blocked_axis_keeps_other_axis_moving() {
        // Wall column at cell x = 3, agent sliding diagonally into it.
        let terrain = GridTerrain::open(8, 8, 32.0).with_wall_rect(IVec2::new(3, 0), IVec2::new(3, 7));
        let pos = Vec2::new(88.0, 112.0);
        let out = resolve_terrain(&terrain, pos, 8.0, Vec2::new(2.0, 2.0));

        assert!(out.blocked_x);
        assert!(!out.blocked_y);
        assert_eq!(out.pos, Vec2::new(88.0, 114.0));
        assert_eq!(out.contacts.as_slice(), &[IVec2::new(3, 3)]);
    }

    #[test]
    fn test_outer_wall_blocks_without_contact() {
        let terrain = GridTerrain::open(4, 4, 32.0).with_outer_ring();
        let out = resolve_terrain(&terrain, Vec2::new(40.0, 48.0), 8.0, Vec2::new(-2.0, 0.0));
        assert!(out.blocked_x);
        assert!(out.contacts.is_empty());
        assert_eq!(out.pos, Vec2::new(40.0, 48.0));
    }

    #[test]
    fn test_pitfalls_do_not_block_movement() {
        let terrain = GridTerrain::open(4, 4, 32.0).with_pitfall(IVec2::new(1, 1));
        let out = resolve_terrain(&terrain, Vec2::new(24.0, 48.0), 4.0, Vec2::new(3.0, 0.0));
        assert!(!out.blocked());
        assert_eq!(out.pos, Vec2::new(27.0, 48.0));
    }
}
