use bevy::prelude::*;
use std::collections::VecDeque;

/// Minimum number of samples a history keeps room for.
pub const MIN_HISTORY_CAPACITY: usize = 64;

pub fn manhattan(a: Vec2, b: Vec2) -> f32 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}

/// Bounded trail of a train head's past positions, oldest first.
///
/// Samples are appended only after the head has moved past the record
/// threshold, so a stationary head does not flush its own history. Marker
/// `i` lives `(i + 1) * gap` samples behind the newest one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainHistory {
    samples: VecDeque<Vec2>,
    capacity: usize,
}

impl TrainHistory {
    pub fn new(start: Vec2, markers: usize, gap: usize) -> Self {
        let mut history = Self { samples: VecDeque::new(), capacity: 0 };
        history.ensure_capacity(markers, gap);
        history.samples.push_back(start);
        history
    }

    pub fn required_capacity(markers: usize, gap: usize) -> usize {
        MIN_HISTORY_CAPACITY.max((markers + 2) * gap + 8)
    }

    /// Grow the bound to fit `markers`. Never shrinks.
    pub fn ensure_capacity(&mut self, markers: usize, gap: usize) {
        let required = Self::required_capacity(markers, gap);
        if required > self.capacity {
            self.capacity = required;
            self.samples.reserve(required.saturating_sub(self.samples.len()));
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn newest(&self) -> Option<Vec2> {
        self.samples.back().copied()
    }

    pub fn oldest(&self) -> Option<Vec2> {
        self.samples.front().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vec2> {
        self.samples.iter()
    }

    /// Append `pos` if the head moved more than `threshold` (Manhattan)
    /// since the newest sample. Returns whether a sample was taken.
    pub fn record(&mut self, pos: Vec2, threshold: f32) -> bool {
        if let Some(last) = self.newest() {
            if manhattan(pos, last) <= threshold {
                return false;
            }
        }
        self.samples.push_back(pos);
        while self.samples.len() > self.capacity.max(1) {
            self.samples.pop_front();
        }
        true
    }

    /// Make sure `markers` markers fit behind the newest sample by
    /// prepending samples interpolated from the oldest sample to `toward`.
    /// The new oldest sample is exactly `toward`.
    pub fn backfill(&mut self, markers: usize, gap: usize, toward: Vec2) {
        self.ensure_capacity(markers, gap);
        let needed = markers * gap + 1;
        if self.samples.is_empty() {
            self.samples.push_back(toward);
        }
        let missing = needed.saturating_sub(self.samples.len());
        let Some(oldest) = self.oldest() else {
            return;
        };
        for step in 1..=missing {
            let t = step as f32 / missing as f32;
            self.samples.push_front(oldest.lerp(toward, t));
        }
    }

    /// Position of marker `ordinal`, `frac` of the way from its own sample
    /// to the next newer one.
    pub fn marker_position(&self, ordinal: usize, gap: usize, frac: f32) -> Option<Vec2> {
        let newest = self.samples.len().checked_sub(1)?;
        let back = (ordinal + 1) * gap;
        debug_assert!(back <= newest, "marker {} needs {} samples, history has {}", ordinal, back + 1, newest + 1);
        let idx = newest.saturating_sub(back);
        let a = self.samples[idx];
        let b = self.samples[(idx + 1).min(newest)];
        Some(a.lerp(b, frac.clamp(0.0, 1.0)))
    }

    /// Squared distance from `pos` to the closest recorded sample.
    pub fn min_distance_sq(&self, pos: Vec2) -> Option<f32> {
        self.samples
            .iter()
            .map(|s| s.distance_squared(pos))
            .min_by(|a, b| a.total_cmp(b))
    }
}
