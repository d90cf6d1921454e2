//! Crowd breaker for scent trackers.
//!
//! Trackers walking the same trail end up stacked on one footprint, all
//! heading the same way. Every `cadence_ticks` the controller buckets moving
//! trackers by coarse cell and heading octant; a bucket at or over the
//! threshold has enough of its members forced to wander that it drops back
//! below it.

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

use crate::game::config::CongestionConfig;
use crate::game::math::{cell_of, heading_bin};
use crate::game::simulation::AgentTable;
use crate::game::types::{AgentId, AgentKind};

/// Coarse cell plus heading octant.
pub type BucketKey = (i32, i32, u8);

#[derive(Resource, Debug, Default, Clone, PartialEq, Eq)]
pub struct CongestionController {
    pub last_run_tick: Option<u64>,
    /// Agents forced on the last run.
    pub forced: usize,
    pub crowded_buckets: usize,
}

impl CongestionController {
    pub fn is_due(&self, tick: u64, tuning: &CongestionConfig) -> bool {
        tick % tuning.cadence_ticks.max(1) == 0
    }

    /// Moving trackers that are free to track, grouped by bucket. Members
    /// are in id order.
    pub fn bucket_members(agents: &AgentTable, cell_size: f32) -> BTreeMap<BucketKey, Vec<AgentId>> {
        let mut buckets: BTreeMap<BucketKey, Vec<AgentId>> = BTreeMap::new();
        for agent in agents.iter_alive().filter(|a| a.kind() == AgentKind::Tracker) {
            if agent.behavior.tracker_scent().is_some_and(|s| s.force_wander) {
                continue;
            }
            let Some(bin) = heading_bin(agent.last_move) else {
                continue;
            };
            let cell = cell_of(agent.pos, cell_size);
            buckets.entry((cell.x, cell.y, bin)).or_default().push(agent.id);
        }
        buckets
    }

    /// Recompute every force flag. Returns how many agents were forced.
    pub fn run(&mut self, tick: u64, agents: &mut AgentTable, tuning: &CongestionConfig, now_ms: u64, rng: &mut StdRng) -> usize {
        for agent in agents.iter_mut() {
            if let Some(scent) = agent.behavior.tracker_scent_mut() {
                scent.force_wander = false;
            }
        }
        let buckets = Self::bucket_members(agents, tuning.cell_size);

        let threshold = tuning.threshold.max(1);
        let mut forced = 0;
        let mut crowded = 0;
        for (key, mut members) in buckets {
            if members.len() < threshold {
                continue;
            }
            crowded += 1;
            let excess = members.len() - threshold + 1;
            let (chosen, _) = members.partial_shuffle(rng, excess);
            for id in chosen.iter() {
                let Some(scent) = agents.get_mut(*id).and_then(|a| a.behavior.tracker_scent_mut()) else {
                    continue;
                };
                scent.force_wander = true;
                scent.abandon(Some(now_ms));
                forced += 1;
            }
            debug!("[CONGESTION] bucket {:?} held {}, forced {} to wander", key, members.len(), excess);
        }

        self.last_run_tick = Some(tick);
        self.forced = forced;
        self.crowded_buckets = crowded;
        forced
    }
}

#[cfg(test)]
#[path = "congestion_tests.rs"]
mod tests;
