use bevy::prelude::*;

pub mod types;
pub mod math;
pub mod config;
pub mod terrain;
pub mod spatial_index;
pub mod scent;
pub mod behavior;
pub mod congestion;
pub mod train;
pub mod simulation;
pub mod scenario;
pub mod profiling;

use config::ConfigPlugin;
use simulation::SimulationPlugin;

/// Configuration loading plus the fixed-step simulation. Rendering, input
/// and level generation live in the embedding app.
pub struct GamePlugin;

impl Plugin for GamePlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            ConfigPlugin,
            SimulationPlugin,
        ));
    }
}
