use bevy::prelude::*;

use crate::game::math::cell_of;
use crate::game::types::AgentId;
use super::{Entry, SpatialIndex};

impl SpatialIndex {
    pub fn cell_for(&self, pos: Vec2) -> IVec2 {
        cell_of(pos, self.cell_size)
    }

    /// Insert `id` at `pos`. Inserting an id that is already present moves it.
    pub fn insert(&mut self, id: AgentId, pos: Vec2) {
        if self.entries.contains_key(&id) {
            self.update(id, pos);
            return;
        }
        let cell = self.cell_for(pos);
        self.cells.entry(cell).or_default().push(id);
        self.entries.insert(id, Entry { cell, pos });
    }

    /// Move `id` to `pos`. Returns true if the agent changed cells.
    ///
    /// Calling this with a position in the same cell only refreshes the cached
    /// position, so repeated calls are idempotent. An unknown id is inserted.
    pub fn update(&mut self, id: AgentId, pos: Vec2) -> bool {
        let new_cell = self.cell_for(pos);
        let Some(entry) = self.entries.get_mut(&id) else {
            self.cells.entry(new_cell).or_default().push(id);
            self.entries.insert(id, Entry { cell: new_cell, pos });
            return true;
        };

        entry.pos = pos;
        if entry.cell == new_cell {
            return false;
        }

        let old_cell = entry.cell;
        entry.cell = new_cell;
        self.detach(id, old_cell);
        self.cells.entry(new_cell).or_default().push(id);
        true
    }

    /// Remove `id`. Returns false if it was not indexed.
    pub fn remove(&mut self, id: AgentId) -> bool {
        match self.entries.remove(&id) {
            Some(entry) => {
                self.detach(id, entry.cell);
                true
            }
            None => false,
        }
    }

    fn detach(&mut self, id: AgentId, cell: IVec2) {
        let Some(bucket) = self.cells.get_mut(&cell) else {
            debug_assert!(false, "spatial index entry without bucket for {}", id);
            return;
        };
        if let Some(slot) = bucket.iter().position(|&other| other == id) {
            bucket.remove(slot);
        }
        if bucket.is_empty() {
            self.cells.remove(&cell);
        }
    }
}
