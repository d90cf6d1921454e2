//! Demo scenario for the headless binary.
//!
//! Builds a walled arena, spawns the configured number of agents through
//! `SpawnAgent` messages and walks the primary party around a fixed route.

use bevy::prelude::*;
use rand::Rng;

use crate::game::config::WorldConfig;
use crate::game::math::cell_center;
use crate::game::simulation::systems_config::init_sim_config_from_initial;
use crate::game::simulation::{AgentRemoved, SimConfig, SimRng, SimSet, SpawnAgent, Targets, TrackedParty};
use crate::game::terrain::{GridTerrain, Terrain, TerrainQuery};

/// Waypoint loop walked by the primary party.
#[derive(Resource, Debug, Clone)]
pub struct PartyRoute {
    pub waypoints: Vec<Vec2>,
    pub next: usize,
    /// World units per tick.
    pub speed: f32,
}

impl PartyRoute {
    /// Advance `pos` toward the current waypoint, moving on when it is reached.
    pub fn step(&mut self, pos: Vec2) -> Vec2 {
        let Some(&goal) = self.waypoints.get(self.next) else {
            return pos;
        };
        let delta = goal - pos;
        if delta.length() <= self.speed {
            self.next = (self.next + 1) % self.waypoints.len();
            return goal;
        }
        pos + delta.normalize() * self.speed
    }
}

pub struct ScenarioPlugin;

impl Plugin for ScenarioPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_scenario.after(init_sim_config_from_initial));
        app.add_systems(FixedUpdate, move_party.before(SimSet::Input));
        app.add_systems(FixedUpdate, log_removals.after(SimSet::Sweep));
    }
}

/// Outer ring, two wall blocks, a pitfall patch, a puddle and a conveyor strip.
pub fn build_arena(world: &WorldConfig) -> GridTerrain {
    let cols = world.cols as i32;
    let rows = world.rows as i32;
    let mut terrain = GridTerrain::open(world.cols, world.rows, world.cell_size).with_outer_ring();
    if cols < 12 || rows < 12 {
        return terrain;
    }

    let (qx, qy) = (cols / 4, rows / 4);
    terrain = terrain
        .with_wall_rect(IVec2::new(qx, qy), IVec2::new(qx + 1, rows - qy - 1))
        .with_wall_rect(IVec2::new(cols - qx - 2, qy), IVec2::new(cols - qx - 1, qy + 2));
    for cell in [IVec2::new(cols / 2, rows / 2), IVec2::new(cols / 2 + 1, rows / 2)] {
        terrain = terrain.with_pitfall(cell);
    }
    for x in 2..5 {
        terrain = terrain.with_no_scent(IVec2::new(x, rows - 3));
    }
    for y in qy..rows - qy {
        terrain = terrain.with_floor(IVec2::new(cols - 3, y), Vec2::new(0.0, 0.25));
    }
    terrain
}

/// Rectangular loop just inside the outer ring.
fn default_route(world: &WorldConfig) -> Vec<Vec2> {
    let cols = world.cols as i32;
    let rows = world.rows as i32;
    [IVec2::new(2, 2), IVec2::new(cols - 4, 2), IVec2::new(cols - 4, rows - 3), IVec2::new(2, rows - 3)]
        .into_iter()
        .map(|cell| cell_center(cell, world.cell_size))
        .collect()
}

pub fn setup_scenario(
    mut commands: Commands,
    config: Res<SimConfig>,
    mut rng: ResMut<SimRng>,
    mut spawns: MessageWriter<SpawnAgent>,
) {
    let terrain = build_arena(&config.world);
    let waypoints = default_route(&config.world);
    let start = waypoints[0];

    let count = config.initial_agents.min(config.agent.max_agents);
    let grid = terrain.grid_size().as_ivec2();
    let mut placed = 0;
    // Random floor cells away from the party's starting corner
    for _ in 0..count * 20 {
        if placed == count {
            break;
        }
        let cell = IVec2::new(rng.random_range(1..grid.x - 1), rng.random_range(1..grid.y - 1));
        let pos = cell_center(cell, terrain.cell_size());
        if terrain.is_blocked(cell) || pos.distance(start) < config.agent.sight_range {
            continue;
        }
        spawns.write(SpawnAgent { kind: None, pos });
        placed += 1;
    }
    if placed < count {
        warn!("[SCENARIO] placed {} of {} agents, arena too crowded", placed, count);
    }

    info!(
        "[SCENARIO] arena {}x{} with {} wall cells, {} agents queued",
        config.world.cols,
        config.world.rows,
        terrain.wall_count(),
        placed
    );

    commands.insert_resource(Targets {
        parties: vec![TrackedParty { id: 1, pos: start, radius: config.agent.radius, in_vehicle: false, visible: true }],
    });
    commands.insert_resource(PartyRoute { waypoints, next: 1, speed: config.agent.base_speed * 1.2 });
    commands.insert_resource(Terrain::new(terrain));
}

pub fn move_party(route: Option<ResMut<PartyRoute>>, mut targets: ResMut<Targets>) {
    let Some(mut route) = route else {
        return;
    };
    if let Some(party) = targets.parties.first_mut() {
        party.pos = route.step(party.pos);
    }
}

pub fn log_removals(mut removed: MessageReader<AgentRemoved>) {
    for event in removed.read() {
        debug!("[SCENARIO] {} ({:?}) gone: {:?}", event.agent, event.kind, event.reason);
    }
}
