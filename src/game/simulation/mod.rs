/// Simulation layer - deterministic agent logic.
///
/// This module is organized into:
/// - **components**: The agent record, vitals and render views
/// - **resources**: Config snapshot, clock, RNG, tracked parties, agent table
/// - **events**: Messages in (spawn, damage, strikes) and out (contacts, removals)
/// - **collision**: Terrain resolution and neighbour separation
/// - **spawn**: Building agents for a kind
/// - **dispatch**: The per-agent pass
/// - **systems**: Tick systems wiring everything into FixedUpdate
/// - **snapshot**: Determinism fingerprints and snapshot files
/// - **debug**: Aggregate counts for HUD and logs

use bevy::prelude::*;

use crate::game::congestion::CongestionController;
use crate::game::scent::ScentTrail;
use crate::game::spatial_index::SpatialIndex;
use crate::game::train::TrainManager;

// Module declarations
pub mod components;
pub mod resources;
pub mod events;
pub mod collision;
pub mod spawn;
pub mod dispatch;
pub mod systems;
pub mod systems_config;
pub mod snapshot;
pub mod debug;

// Re-export commonly used items
pub use components::*;
pub use resources::*;
pub use events::*;
pub use snapshot::WorldSnapshot;

// System sets for organizing execution order
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum SimSet {
    Input,      // Tick, clock, input messages, footprints
    Trains,     // Dissolve, promote, retarget, merge
    Steering,   // The dispatcher pass
    Sweep,      // Deferred removal
    PostUpdate, // Train markers, congestion, debug counts
}

/// Main simulation plugin
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        // Configure FixedUpdate timestep (replaced from SimConfig at startup)
        app.insert_resource(Time::<Fixed>::from_seconds(1.0 / 60.0));

        // Defaults until init_sim_config_from_initial runs
        app.init_resource::<SimConfig>();
        app.init_resource::<SimPerformance>();
        app.init_resource::<SimTick>();
        app.init_resource::<SimClock>();
        app.init_resource::<SimRng>();
        app.init_resource::<SimSpeed>();
        app.init_resource::<Targets>();
        app.init_resource::<AgentTable>();
        app.init_resource::<TrainManager>();
        app.init_resource::<CongestionController>();
        app.init_resource::<DebugCounts>();
        app.init_resource::<ScentTrail>();
        app.insert_resource(SpatialIndex::new(32.0));

        // Register messages
        app.add_message::<SpawnAgent>();
        app.add_message::<DamageAgent>();
        app.add_message::<StrikeMarkers>();
        app.add_message::<WallContact>();
        app.add_message::<AgentRemoved>();
        app.add_message::<AgentDamaged>();
        app.add_message::<MarkersStruck>();

        // Configure System Sets
        app.configure_sets(FixedUpdate, (
            SimSet::Input,
            SimSet::Trains,
            SimSet::Steering,
            SimSet::Sweep,
            SimSet::PostUpdate,
        ).chain());

        // Startup systems
        app.add_systems(Startup, systems_config::init_sim_config_from_initial);

        // Update systems
        app.add_systems(Update, systems::apply_sim_speed);

        // Fixed update systems (deterministic simulation)
        app.add_systems(FixedUpdate, (
            // Increment tick counter first (before all other systems)
            systems::increment_sim_tick.before(systems::sim_start).in_set(SimSet::Input),

            // Pre-simulation
            systems::sim_start.in_set(SimSet::Input),

            // Input processing
            (
                systems::process_damage,
                systems::process_spawns,
                systems::process_marker_strikes,
                systems::record_footprints,
            ).chain().after(systems::sim_start).in_set(SimSet::Input),

            // Trains
            systems::train_pre_pass.in_set(SimSet::Trains),

            // Steering
            systems::dispatch_agents.in_set(SimSet::Steering),

            // Removal
            systems::sweep_removed.in_set(SimSet::Sweep),

            // Post-update
            (
                systems::train_post_pass,
                systems::run_congestion,
                debug::update_debug_counts,
                debug::log_debug_counts,
            ).chain().in_set(SimSet::PostUpdate),

            // Post-simulation
            systems::sim_end.after(SimSet::PostUpdate),
        ));
    }
}
