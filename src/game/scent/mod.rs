use bevy::prelude::*;
use std::collections::VecDeque;

pub mod tracker;
#[cfg(test)]
mod tests;

/// One scent sample left by a tracked party. Never mutated after creation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Footprint {
    pub id: u64,
    pub pos: Vec2,
    pub time_ms: u64,
    /// Rendering hint only; trackers follow invisible footprints too.
    pub visible: bool,
}

/// Result ordering for [`ScentTrail::query`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScentOrder {
    NearestFirst,
    NewestFirst,
    OldestFirst,
}

/// Append-only, time-ordered ledger of footprints.
///
/// Footprints are stored oldest first. Expiry is a read-time filter: callers
/// pass a time boundary and older samples are skipped. [`ScentTrail::prune`]
/// and the count cap only ever drop from the old end, so the relative order
/// of everything that remains is unchanged.
#[derive(Resource, Debug, Clone)]
pub struct ScentTrail {
    footprints: VecDeque<Footprint>,
    next_id: u64,
    max_footprints: usize,
    step_distance: f32,
    lifetime_ms: u64,
    last_recorded: Option<Vec2>,
}

impl Default for ScentTrail {
    fn default() -> Self {
        Self::new(24.0, 300, 135_000)
    }
}

impl ScentTrail {
    pub fn new(step_distance: f32, max_footprints: usize, lifetime_ms: u64) -> Self {
        Self {
            footprints: VecDeque::with_capacity(max_footprints.min(4096)),
            next_id: 1,
            max_footprints: max_footprints.max(1),
            step_distance,
            lifetime_ms,
            last_recorded: None,
        }
    }

    /// Append a footprint unconditionally and return its id.
    ///
    /// Times must be non-decreasing; an older time is clamped to the newest
    /// recorded time so the ledger stays sorted.
    pub fn record(&mut self, pos: Vec2, time_ms: u64, visible: bool) -> u64 {
        let newest = self.footprints.back().map_or(0, |fp| fp.time_ms);
        debug_assert!(time_ms >= newest, "footprint time went backwards");
        let time_ms = time_ms.max(newest);

        let id = self.next_id;
        self.next_id += 1;
        self.footprints.push_back(Footprint { id, pos, time_ms, visible });
        self.last_recorded = Some(pos);
        while self.footprints.len() > self.max_footprints {
            self.footprints.pop_front();
        }
        id
    }

    /// Record only if the party moved at least the footprint step since the
    /// last sample.
    pub fn record_step(&mut self, pos: Vec2, time_ms: u64, visible: bool) -> Option<u64> {
        if let Some(last) = self.last_recorded {
            if last.distance_squared(pos) < self.step_distance * self.step_distance {
                return None;
            }
        }
        Some(self.record(pos, time_ms, visible))
    }

    /// Footprints within `radius` of `center` strictly newer than
    /// `min_time_exclusive`, in the requested order.
    pub fn query(
        &self,
        center: Vec2,
        radius: f32,
        min_time_exclusive: Option<u64>,
        order: ScentOrder,
    ) -> Vec<Footprint> {
        let radius_sq = radius * radius;
        let start = match min_time_exclusive {
            Some(boundary) => self.footprints.partition_point(|fp| fp.time_ms <= boundary),
            None => 0,
        };
        let mut out: Vec<Footprint> = self
            .footprints
            .range(start..)
            .filter(|fp| fp.pos.distance_squared(center) <= radius_sq)
            .copied()
            .collect();

        match order {
            ScentOrder::OldestFirst => {}
            ScentOrder::NewestFirst => out.reverse(),
            ScentOrder::NearestFirst => out.sort_by(|a, b| {
                let da = a.pos.distance_squared(center);
                let db = b.pos.distance_squared(center);
                da.total_cmp(&db).then(a.id.cmp(&b.id))
            }),
        }
        out
    }

    /// Whether any footprint is strictly newer than `boundary`.
    pub fn has_newer_than(&self, boundary: u64) -> bool {
        self.footprints.back().is_some_and(|fp| fp.time_ms > boundary)
    }

    /// Oldest time still inside the lifetime window at `now_ms`.
    /// Footprints at or before the returned boundary count as expired.
    pub fn expiry_boundary(&self, now_ms: u64) -> Option<u64> {
        now_ms.checked_sub(self.lifetime_ms)
    }

    /// Drop expired footprints from the old end. Returns how many were dropped.
    pub fn prune(&mut self, now_ms: u64) -> usize {
        let Some(boundary) = self.expiry_boundary(now_ms) else {
            return 0;
        };
        let before = self.footprints.len();
        while self.footprints.front().is_some_and(|fp| fp.time_ms <= boundary) {
            self.footprints.pop_front();
        }
        before - self.footprints.len()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Footprint> {
        self.footprints.iter()
    }

    pub fn newest(&self) -> Option<&Footprint> {
        self.footprints.back()
    }

    pub fn len(&self) -> usize {
        self.footprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.footprints.is_empty()
    }

    pub fn step_distance(&self) -> f32 {
        self.step_distance
    }

    pub fn lifetime_ms(&self) -> u64 {
        self.lifetime_ms
    }
}
