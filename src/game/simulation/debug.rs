/// Debug aggregates for the simulation.
///
/// This module handles the counters a HUD or log polls each tick:
/// - Live agents, total and per kind
/// - Trains and their markers
/// - Footprints in the scent ledger
/// - Trackers that are following scent or forced to wander

use bevy::prelude::*;

use crate::game::scent::ScentTrail;
use crate::game::train::TrainManager;

use super::resources::{AgentTable, DebugCounts, SimTick};

// ============================================================================
// Aggregation
// ============================================================================

impl DebugCounts {
    pub fn collect(agents: &AgentTable, trains: &TrainManager, trail: &ScentTrail) -> Self {
        let mut counts = Self::default();
        for agent in agents.iter_alive() {
            counts.live_agents += 1;
            *counts.by_kind.entry(agent.kind()).or_default() += 1;
            if let Some(scent) = agent.behavior.tracker_scent() {
                if scent.force_wander {
                    counts.forced_wanderers += 1;
                } else if scent.target.is_some() {
                    counts.tracking += 1;
                }
            }
        }
        counts.trains = trains.len();
        counts.markers = trains.total_marker_count();
        counts.footprints = trail.len();
        counts
    }
}

pub fn update_debug_counts(
    agents: Res<AgentTable>,
    trains: Res<TrainManager>,
    trail: Res<ScentTrail>,
    mut counts: ResMut<DebugCounts>,
) {
    let fresh = DebugCounts::collect(&agents, &trains, &trail);
    // Skip the write so change detection only fires on real changes
    if *counts != fresh {
        *counts = fresh;
    }
}

// ============================================================================
// Status Logging
// ============================================================================

pub fn log_debug_counts(
    #[allow(unused_variables)] tick: Res<SimTick>,
    #[allow(unused_variables)] counts: Res<DebugCounts>,
) {
    use crate::profile_log;

    profile_log!(
        tick,
        "[DEBUG COUNTS] live {} {:?} | trains {} ({} markers) | footprints {} | tracking {} | forced {}",
        counts.live_agents,
        counts.by_kind,
        counts.trains,
        counts.markers,
        counts.footprints,
        counts.tracking,
        counts.forced_wanderers
    );
}
