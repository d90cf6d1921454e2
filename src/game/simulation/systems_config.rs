/// Configuration initialization systems
///
/// Turns the loaded `InitialConfig` into the runtime resources the tick
/// reads: the sanitized `SimConfig`, the seeded RNG, the clock, the spatial
/// index, the scent ledger and (when nobody supplied one) the terrain.

use bevy::prelude::*;

use crate::game::config::InitialConfig;
use crate::game::scent::ScentTrail;
use crate::game::spatial_index::SpatialIndex;
use crate::game::terrain::{GridTerrain, Terrain};

use super::resources::*;

/// Build every simulation resource from `InitialConfig` at startup.
pub fn init_sim_config_from_initial(
    mut commands: Commands,
    mut fixed_time: ResMut<Time<Fixed>>,
    initial_config: Option<Res<InitialConfig>>,
    terrain: Option<Res<Terrain>>,
) {
    info!("Initializing SimConfig from InitialConfig");

    let config = match initial_config {
        Some(cfg) => SimConfig::from_initial(&cfg),
        None => {
            warn!("InitialConfig not found, using defaults");
            SimConfig::from_initial(&InitialConfig::default())
        }
    };

    fixed_time.set_timestep_seconds(1.0 / config.tick_rate as f64);

    commands.insert_resource(SimRng::new(config.seed));
    commands.insert_resource(SimClock::at(0, config.tick_rate));
    commands.insert_resource(SimTick(0));
    commands.insert_resource(SpatialIndex::new(config.spatial_cell_size));
    commands.insert_resource(ScentTrail::new(
        config.scent.step_distance,
        config.scent.max_footprints,
        config.scent.lifetime_ms,
    ));

    if terrain.is_none() {
        let world = &config.world;
        info!("No terrain supplied, using an open {}x{} field", world.cols, world.rows);
        commands.insert_resource(Terrain::new(GridTerrain::open(world.cols, world.rows, world.cell_size)));
    }

    info!(
        "SimConfig initialized: seed {}, {} Hz, world {:?}, spatial cell {}",
        config.seed,
        config.tick_rate,
        config.world_size(),
        config.spatial_cell_size
    );
    commands.insert_resource(config);
}
