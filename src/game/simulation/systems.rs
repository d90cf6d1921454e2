/// Core simulation systems.
///
/// This module contains systems for:
/// - Tick and clock management
/// - Input processing (spawn, damage and marker strikes)
/// - Scent recording
/// - The train passes
/// - The dispatcher pass and the deferred sweep
/// - Congestion control
/// - Simulation timing/performance tracking

use bevy::prelude::*;
use crate::game::profiling::profile;

use crate::game::congestion::CongestionController;
use crate::game::scent::ScentTrail;
use crate::game::spatial_index::SpatialIndex;
use crate::game::terrain::Terrain;
use crate::game::train::{Admission, TrainManager, TrainWorld};
use crate::game::types::AgentKind;

use super::dispatch::Dispatcher;
use super::events::*;
use super::resources::*;
use super::spawn::AgentSpawner;

// ============================================================================
// Tick Management
// ============================================================================

/// Increment the global simulation tick counter and derive the clock.
///
/// This system runs first in the FixedUpdate schedule so every later system
/// of the tick sees the same tick and timestamp.
pub fn increment_sim_tick(mut tick: ResMut<SimTick>, mut clock: ResMut<SimClock>, config: Res<SimConfig>) {
    tick.increment();
    *clock = SimClock::at(tick.0, config.tick_rate);
}

// ============================================================================
// Input Processing
// ============================================================================

/// Apply external damage. Messages are handled in arrival order.
pub fn process_damage(mut damage_events: MessageReader<DamageAgent>, mut agents: ResMut<AgentTable>) {
    for event in damage_events.read() {
        let Some(agent) = agents.get_mut(event.agent).filter(|a| a.is_alive()) else {
            debug!("[INPUT] damage for unknown or removed {}", event.agent);
            continue;
        };
        if agent.apply_damage(event.amount) {
            agents.tombstone(event.agent, RemovalReason::Damage);
        }
    }
}

/// Spawn requested agents. Train-kind spawns go through train admission and
/// may join an existing train instead of creating an agent.
#[allow(clippy::too_many_arguments)]
pub fn process_spawns(
    mut spawn_events: MessageReader<SpawnAgent>,
    config: Res<SimConfig>,
    clock: Res<SimClock>,
    targets: Res<Targets>,
    mut agents: ResMut<AgentTable>,
    mut index: ResMut<SpatialIndex>,
    mut trains: ResMut<TrainManager>,
    mut rng: ResMut<SimRng>,
) {
    for event in spawn_events.read() {
        let kind = event.kind.unwrap_or_else(|| config.spawn.pick(&mut rng.0));
        let spawner = AgentSpawner::new(&config, *clock);

        if kind == AgentKind::Train {
            let mut world = TrainWorld {
                agents: &mut agents,
                index: &mut index,
                targets: &targets,
                spawner,
                rng: &mut rng.0,
            };
            if trains.admit(event.pos, &mut world, clock.now_ms) == Admission::Rejected {
                debug!("[SPAWN] train spawn at {:?} rejected, population cap reached", event.pos);
            }
            continue;
        }

        if !spawner.has_room(&agents) {
            debug!("[SPAWN] {:?} spawn at {:?} rejected, population cap reached", kind, event.pos);
            continue;
        }
        spawner.spawn(kind, event.pos, &mut agents, &mut index, &mut rng.0);
    }
}

/// Remove train markers hit by external damage.
pub fn process_marker_strikes(
    mut strike_events: MessageReader<StrikeMarkers>,
    mut trains: ResMut<TrainManager>,
    mut struck: MessageWriter<MarkersStruck>,
) {
    for event in strike_events.read() {
        let count = trains.pop_markers_colliding_circle(event.center, event.radius);
        if count > 0 {
            struck.write(MarkersStruck { count });
        }
    }
}

// ============================================================================
// Scent
// ============================================================================

/// Lay footprints behind the primary party and drop expired ones.
pub fn record_footprints(
    targets: Res<Targets>,
    terrain: Res<Terrain>,
    clock: Res<SimClock>,
    mut trail: ResMut<ScentTrail>,
) {
    if let Some(party) = targets.primary() {
        if !party.in_vehicle && !terrain.suppresses_footprints(party.pos) {
            trail.record_step(party.pos, clock.now_ms, party.visible);
        }
    }
    trail.prune(clock.now_ms);
}

// ============================================================================
// Trains
// ============================================================================

/// Dissolve, promote, retarget and merge before any agent moves.
#[allow(clippy::too_many_arguments)]
pub fn train_pre_pass(
    config: Res<SimConfig>,
    clock: Res<SimClock>,
    targets: Res<Targets>,
    mut agents: ResMut<AgentTable>,
    mut index: ResMut<SpatialIndex>,
    mut trains: ResMut<TrainManager>,
    mut rng: ResMut<SimRng>,
    mut removed: MessageWriter<AgentRemoved>,
) {
    let mut world = TrainWorld {
        agents: &mut agents,
        index: &mut index,
        targets: &targets,
        spawner: AgentSpawner::new(&config, *clock),
        rng: &mut rng.0,
    };
    let report = trains.pre_update(&mut world, clock.now_ms);
    for agent in report.absorbed {
        removed.write(AgentRemoved { agent, kind: AgentKind::Train, reason: RemovalReason::Absorbed });
    }
}

/// Sample head paths and lay markers along them.
pub fn train_post_pass(config: Res<SimConfig>, agents: Res<AgentTable>, mut trains: ResMut<TrainManager>) {
    trains.post_update(&agents, &config.train);
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Step every live agent in id order.
#[profile(2)]
#[allow(clippy::too_many_arguments)]
pub fn dispatch_agents(
    #[allow(unused_variables)] tick: Res<SimTick>,
    clock: Res<SimClock>,
    config: Res<SimConfig>,
    terrain: Res<Terrain>,
    trail: Res<ScentTrail>,
    targets: Res<Targets>,
    mut agents: ResMut<AgentTable>,
    mut index: ResMut<SpatialIndex>,
    mut rng: ResMut<SimRng>,
    mut wall_contacts: MessageWriter<WallContact>,
    mut damaged: MessageWriter<AgentDamaged>,
) {
    use crate::profile_log;

    let dispatcher = Dispatcher {
        clock: *clock,
        config: &config,
        terrain: &**terrain,
        trail: &trail,
        targets: &targets,
    };
    let report = dispatcher.run(&mut agents, &mut index, &mut rng.0);

    profile_log!(
        tick,
        "[DISPATCH] stepped {} | tombstoned {} | wall contacts {} | bites {}",
        report.stepped,
        report.tombstoned,
        report.wall_contacts.len(),
        report.damaged.len()
    );

    wall_contacts.write_batch(report.wall_contacts);
    damaged.write_batch(report.damaged);
}

/// Delete tombstoned agents from the table and the spatial index.
pub fn sweep_removed(
    mut agents: ResMut<AgentTable>,
    mut index: ResMut<SpatialIndex>,
    mut removed: MessageWriter<AgentRemoved>,
) {
    for agent in agents.sweep() {
        index.remove(agent.id);
        let reason = agent.removal.unwrap_or(RemovalReason::Damage);
        debug!("[SWEEP] {} ({:?}) removed: {:?}", agent.id, agent.kind(), reason);
        removed.write(AgentRemoved { agent: agent.id, kind: agent.kind(), reason });
    }
}

// ============================================================================
// Congestion
// ============================================================================

pub fn run_congestion(
    tick: Res<SimTick>,
    clock: Res<SimClock>,
    config: Res<SimConfig>,
    mut controller: ResMut<CongestionController>,
    mut agents: ResMut<AgentTable>,
    mut rng: ResMut<SimRng>,
) {
    if !controller.is_due(tick.0, &config.congestion) {
        return;
    }
    controller.run(tick.0, &mut agents, &config.congestion, clock.now_ms, &mut rng.0);
}

// ============================================================================
// Simulation Speed and Timing
// ============================================================================

/// Time acceleration runs more fixed steps per frame; it never stretches a step.
pub fn apply_sim_speed(speed: Res<SimSpeed>, mut time: ResMut<Time<Virtual>>) {
    if !speed.is_changed() {
        return;
    }
    let multiplier = if speed.multiplier.is_finite() && speed.multiplier > 0.0 {
        speed.multiplier
    } else {
        warn!("[SIM] invalid speed multiplier {}, using 1.0", speed.multiplier);
        1.0
    };
    time.set_relative_speed(multiplier);
    info!("[SIM] speed set to {}x", multiplier);
}

pub fn sim_start(
    #[allow(unused_variables)] stats: Res<SimPerformance>,
    #[allow(unused_variables)] tick: Res<SimTick>,
    #[allow(unused_variables)] agents: Res<AgentTable>,
    #[allow(unused_variables)] trains: Res<TrainManager>,
) {
    use crate::profile_log;

    profile_log!(tick, "[SIM STATUS] Tick: {} | Agents: {} | Trains: {} | Last sim duration: {:?}",
          tick.0, agents.len(), trains.len(), stats.last_duration);
}

pub fn sim_end(mut stats: ResMut<SimPerformance>, time: Res<Time<Fixed>>) {
    // Configured tick duration, not wall-clock time
    stats.last_duration = time.delta();
}
