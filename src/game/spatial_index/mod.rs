use bevy::prelude::*;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::game::types::AgentId;

mod grid;
mod query;
#[cfg(test)]
mod tests;

/// Ids stored per cell; most cells hold a handful of agents.
pub type CellBucket = SmallVec<[AgentId; 8]>;

/// Uniform-grid index from world cells to the agents centered in them.
///
/// The index is purely geometric: it stores an id and the last committed
/// position, and never looks at what kind of agent an id belongs to.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::Vec2;
/// use pursuit::game::spatial_index::SpatialIndex;
/// use pursuit::game::types::AgentId;
///
/// let mut index = SpatialIndex::new(32.0);
/// index.insert(AgentId(1), Vec2::new(10.0, 10.0));
/// index.insert(AgentId(2), Vec2::new(40.0, 10.0));
///
/// let near = index.query_radius(Vec2::new(12.0, 10.0), 5.0);
/// assert_eq!(near, vec![AgentId(1)]);
/// ```
///
/// # Performance
///
/// - **Insert / update / remove:** O(1) amortized, plus a scan of one bucket
/// - **Radius query:** O(k) where k = agents in the cells overlapping the circle
/// - **Update within the same cell:** only the cached position changes
///
/// # Implementation Notes
///
/// - Cells are sparse (`FxHashMap`), so the index has no bounds and any cell
///   outside the populated area simply answers empty
/// - Buckets are `SmallVec`s kept in insertion order; query results are
///   sorted by id so callers see a stable order regardless of history
/// - Empty buckets are dropped eagerly, keeping `non_empty_cells` exact
#[derive(Resource, Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f32,
    cells: FxHashMap<IVec2, CellBucket>,
    entries: FxHashMap<AgentId, Entry>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    cell: IVec2,
    pos: Vec2,
}

/// Inclusive rectangle of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub min: IVec2,
    pub max: IVec2,
}

impl CellRect {
    pub fn new(min: IVec2, max: IVec2) -> Self {
        Self { min, max }
    }

    /// The square of cells within `reach` of `center`.
    pub fn around(center: IVec2, reach: i32) -> Self {
        Self {
            min: center.saturating_sub(IVec2::splat(reach)),
            max: center.saturating_add(IVec2::splat(reach)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    pub fn contains(&self, cell: IVec2) -> bool {
        cell.x >= self.min.x && cell.x <= self.max.x && cell.y >= self.min.y && cell.y <= self.max.y
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(32.0)
    }
}

impl SpatialIndex {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: if cell_size > 0.0 { cell_size } else { 32.0 },
            cells: FxHashMap::default(),
            entries: FxHashMap::default(),
        }
    }

    /// Drop every entry and adopt a new cell size.
    pub fn reset(&mut self, cell_size: f32) {
        *self = Self::new(cell_size);
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Last committed position of `id`.
    pub fn position(&self, id: AgentId) -> Option<Vec2> {
        self.entries.get(&id).map(|e| e.pos)
    }

    pub fn cell_of_agent(&self, id: AgentId) -> Option<IVec2> {
        self.entries.get(&id).map(|e| e.cell)
    }

    /// Count the total number of id entries across all cells.
    /// Equal to `len()` whenever the index is consistent.
    pub fn total_entries(&self) -> usize {
        self.cells.values().map(|bucket| bucket.len()).sum()
    }

    pub fn non_empty_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }
}
