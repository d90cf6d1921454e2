use bevy::prelude::*;
use fixedbitset::FixedBitSet;
use rustc_hash::FxHashMap;

use crate::game::math::cell_of;

/// Classification of a terrain cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellClass {
    Floor,
    Wall,
    Pitfall,
    OuterWall,
    /// Beyond the grid.
    Outside,
}

impl CellClass {
    /// Walls that take damage from contact. Outer walls are indestructible.
    pub fn is_damageable(self) -> bool {
        matches!(self, CellClass::Wall)
    }
}

/// Read-only level queries consumed by the behavior core.
///
/// Implementations must be pure lookups: the core calls these many times per
/// agent per tick and never caches the answers across ticks.
pub trait TerrainQuery: Send + Sync {
    fn cell_size(&self) -> f32;

    /// Grid extent in cells (columns, rows).
    fn grid_size(&self) -> UVec2;

    fn cell_class(&self, cell: IVec2) -> CellClass;

    fn is_blocked(&self, cell: IVec2) -> bool {
        self.cell_class(cell) != CellClass::Floor
    }

    fn is_blocked_at(&self, pos: Vec2) -> bool {
        self.is_blocked(cell_of(pos, self.cell_size()))
    }

    fn is_pitfall(&self, cell: IVec2) -> bool {
        self.cell_class(cell) == CellClass::Pitfall
    }

    fn in_grid(&self, cell: IVec2) -> bool {
        let size = self.grid_size().as_ivec2();
        cell.x >= 0 && cell.y >= 0 && cell.x < size.x && cell.y < size.y
    }

    /// World-space size of the level.
    fn bounds(&self) -> Vec2 {
        self.grid_size().as_vec2() * self.cell_size()
    }

    /// Line of sight through walls and pitfalls.
    ///
    /// Samples the segment at `max(1, min(cell / 2, dist))` spacing. Cells
    /// beyond the grid do not block, so a ray may leave and re-enter the level.
    fn raycast_clear(&self, from: Vec2, to: Vec2) -> bool {
        let cell_size = self.cell_size();
        let delta = to - from;
        let dist = delta.length();
        if cell_size <= 0.0 || dist <= 1e-6 {
            return true;
        }
        let step = (cell_size * 0.5).min(dist).max(1.0);
        let samples = ((dist / step).ceil() as usize).max(1);
        for i in 0..=samples {
            let t = i as f32 / samples as f32;
            let cell = cell_of(from + delta * t, cell_size);
            if !self.in_grid(cell) {
                continue;
            }
            if matches!(self.cell_class(cell), CellClass::Wall | CellClass::OuterWall) {
                return false;
            }
        }
        true
    }

    /// Additive velocity applied by a moving floor under `pos`.
    fn floor_drift(&self, _pos: Vec2) -> Vec2 {
        Vec2::ZERO
    }

    /// Zones where the tracked party leaves no scent (puddles, vehicles parked on a cell...).
    fn suppresses_footprints(&self, _pos: Vec2) -> bool {
        false
    }
}

/// Shared handle to the level collaborator.
#[derive(Resource)]
pub struct Terrain(pub Box<dyn TerrainQuery>);

impl Terrain {
    pub fn new(terrain: impl TerrainQuery + 'static) -> Self {
        Self(Box::new(terrain))
    }
}

impl std::ops::Deref for Terrain {
    type Target = dyn TerrainQuery;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

/// Uniform grid terrain backed by bitsets, one bit per cell and layer.
///
/// # Implementation Notes
///
/// - Row-major indexing: `idx = row * cols + col`
/// - Layers are independent; `cell_class` resolves them in the order
///   outer wall, wall, pitfall, floor
/// - Moving floors are sparse and live in a hash map keyed by cell
#[derive(Clone, Debug)]
pub struct GridTerrain {
    cols: u32,
    rows: u32,
    cell_size: f32,
    walls: FixedBitSet,
    outer_walls: FixedBitSet,
    pitfalls: FixedBitSet,
    no_scent: FixedBitSet,
    floors: FxHashMap<IVec2, Vec2>,
}

impl GridTerrain {
    pub fn open(cols: u32, rows: u32, cell_size: f32) -> Self {
        let len = (cols * rows) as usize;
        Self {
            cols,
            rows,
            cell_size,
            walls: FixedBitSet::with_capacity(len),
            outer_walls: FixedBitSet::with_capacity(len),
            pitfalls: FixedBitSet::with_capacity(len),
            no_scent: FixedBitSet::with_capacity(len),
            floors: FxHashMap::default(),
        }
    }

    fn index(&self, cell: IVec2) -> Option<usize> {
        if cell.x < 0 || cell.y < 0 || cell.x >= self.cols as i32 || cell.y >= self.rows as i32 {
            return None;
        }
        Some(cell.y as usize * self.cols as usize + cell.x as usize)
    }

    pub fn set_wall(&mut self, cell: IVec2, wall: bool) {
        if let Some(idx) = self.index(cell) {
            self.walls.set(idx, wall);
        }
    }

    pub fn with_wall(mut self, cell: IVec2) -> Self {
        self.set_wall(cell, true);
        self
    }

    /// Fill an inclusive rectangle of cells with wall.
    pub fn with_wall_rect(mut self, min: IVec2, max: IVec2) -> Self {
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                self.set_wall(IVec2::new(x, y), true);
            }
        }
        self
    }

    pub fn with_pitfall(mut self, cell: IVec2) -> Self {
        if let Some(idx) = self.index(cell) {
            self.pitfalls.insert(idx);
        }
        self
    }

    pub fn with_no_scent(mut self, cell: IVec2) -> Self {
        if let Some(idx) = self.index(cell) {
            self.no_scent.insert(idx);
        }
        self
    }

    /// Mark the one-cell border of the grid as outer wall.
    pub fn with_outer_ring(mut self) -> Self {
        for x in 0..self.cols as i32 {
            for y in [0, self.rows as i32 - 1] {
                if let Some(idx) = self.index(IVec2::new(x, y)) {
                    self.outer_walls.insert(idx);
                }
            }
        }
        for y in 0..self.rows as i32 {
            for x in [0, self.cols as i32 - 1] {
                if let Some(idx) = self.index(IVec2::new(x, y)) {
                    self.outer_walls.insert(idx);
                }
            }
        }
        self
    }

    pub fn with_floor(mut self, cell: IVec2, drift: Vec2) -> Self {
        if self.index(cell).is_some() {
            self.floors.insert(cell, drift);
        }
        self
    }

    pub fn wall_count(&self) -> usize {
        self.walls.count_ones(..)
    }
}

impl TerrainQuery for GridTerrain {
    fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn grid_size(&self) -> UVec2 {
        UVec2::new(self.cols, self.rows)
    }

    fn cell_class(&self, cell: IVec2) -> CellClass {
        let Some(idx) = self.index(cell) else {
            return CellClass::Outside;
        };
        if self.outer_walls.contains(idx) {
            CellClass::OuterWall
        } else if self.walls.contains(idx) {
            CellClass::Wall
        } else if self.pitfalls.contains(idx) {
            CellClass::Pitfall
        } else {
            CellClass::Floor
        }
    }

    fn floor_drift(&self, pos: Vec2) -> Vec2 {
        self.floors
            .get(&cell_of(pos, self.cell_size))
            .copied()
            .unwrap_or(Vec2::ZERO)
    }

    fn suppresses_footprints(&self, pos: Vec2) -> bool {
        self.index(cell_of(pos, self.cell_size))
            .is_some_and(|idx| self.no_scent.contains(idx))
    }
}
