//! Resource definitions for the simulation.
//!
//! Everything the tick reads or writes lives here as a Bevy resource:
//! the sanitized configuration snapshot, time, randomness, the tracked
//! parties and the agent table itself.

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::game::config::{
    AgentConfig, CongestionConfig, DogConfig, InitialConfig, ScentConfig, SolitaryConfig, SpawnRatios,
    TrackerConfig, TrainConfig, WallHugConfig, WorldConfig,
};
use crate::game::types::{AgentId, AgentKind, IdAllocator};

use super::components::{Agent, AgentView};
use super::events::RemovalReason;

// ============================================================================
// Performance Tracking
// ============================================================================

/// Wall-clock cost of the last fixed tick, for status logging only.
#[derive(Resource)]
pub struct SimPerformance {
    pub start_time: Option<Instant>,
    pub last_duration: Duration,
}

impl Default for SimPerformance {
    fn default() -> Self {
        Self {
            start_time: None,
            last_duration: Duration::from_secs(0),
        }
    }
}

// ============================================================================
// Time
// ============================================================================

/// Number of fixed steps run since startup.
#[derive(Resource, Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 += 1;
    }
}

/// Monotonic simulation time derived from the tick count. Never reads the
/// wall clock, so replays see identical timestamps.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimClock {
    pub tick: u64,
    pub now_ms: u64,
    pub tick_rate: u32,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::at(0, 60)
    }
}

impl SimClock {
    pub fn at(tick: u64, tick_rate: u32) -> Self {
        let rate = tick_rate.max(1) as u64;
        Self { tick, now_ms: tick * 1000 / rate, tick_rate: rate as u32 }
    }

    pub fn ms_to_ticks(&self, ms: u64) -> u64 {
        ms * self.tick_rate as u64 / 1000
    }
}

/// Time acceleration. Applied as the relative speed of `Time<Virtual>`, so
/// Bevy runs more fixed steps per frame; a step is always one tick.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct SimSpeed {
    pub multiplier: f32,
}

impl Default for SimSpeed {
    fn default() -> Self {
        Self { multiplier: 1.0 }
    }
}

// ============================================================================
// Randomness
// ============================================================================

/// The only source of randomness in the simulation. Strategies receive it
/// explicitly; nothing else may draw random numbers during a tick.
#[derive(Resource, Debug, Clone)]
pub struct SimRng(pub StdRng);

impl SimRng {
    pub fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl Default for SimRng {
    fn default() -> Self {
        Self::new(InitialConfig::default().seed)
    }
}

impl std::ops::Deref for SimRng {
    type Target = StdRng;

    fn deref(&self) -> &StdRng {
        &self.0
    }
}

impl std::ops::DerefMut for SimRng {
    fn deref_mut(&mut self) -> &mut StdRng {
        &mut self.0
    }
}

// ============================================================================
// Simulation Configuration
// ============================================================================

/// Normalized spawn weights.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnTable {
    weights: [(AgentKind, f32); 6],
    total: f32,
}

impl Default for SpawnTable {
    fn default() -> Self {
        Self::from_ratios(&SpawnRatios::default())
    }
}

impl SpawnTable {
    /// Negative weights count as zero. An all-zero table spawns only Normal.
    pub fn from_ratios(ratios: &SpawnRatios) -> Self {
        let mut weights = AgentKind::ALL.map(|kind| (kind, ratios.weight(kind)));
        for (kind, weight) in weights.iter_mut() {
            if !weight.is_finite() || *weight < 0.0 {
                warn!("[CONFIG] spawn ratio for {:?} is {}, clamping to 0", kind, weight);
                *weight = 0.0;
            }
        }
        let mut total: f32 = weights.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            warn!("[CONFIG] spawn ratios sum to zero, spawning Normal only");
            weights = AgentKind::ALL.map(|kind| (kind, if kind == AgentKind::Normal { 1.0 } else { 0.0 }));
            total = 1.0;
        }
        Self { weights, total }
    }

    pub fn probability(&self, kind: AgentKind) -> f32 {
        self.weights
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(0.0, |(_, w)| w / self.total)
    }

    pub fn pick(&self, rng: &mut StdRng) -> AgentKind {
        let mut roll = rng.random::<f32>() * self.total;
        let mut last = AgentKind::Normal;
        for (kind, weight) in self.weights {
            if weight <= 0.0 {
                continue;
            }
            if roll < weight {
                return kind;
            }
            roll -= weight;
            last = kind;
        }
        last
    }
}

/// Immutable runtime snapshot of the scenario configuration.
///
/// Built once from [`InitialConfig`] by [`SimConfig::from_initial`], which
/// repairs anything out of range instead of failing. Each repair logs a
/// `warn!` so a bad config file is visible in the log.
#[derive(Resource, Debug, Clone)]
pub struct SimConfig {
    pub seed: u64,
    pub tick_rate: u32,
    pub world: WorldConfig,
    pub agent: AgentConfig,
    pub spawn: SpawnTable,
    pub scent: ScentConfig,
    pub tracker: TrackerConfig,
    pub wall_hug: WallHugConfig,
    pub train: TrainConfig,
    pub congestion: CongestionConfig,
    pub solitary: SolitaryConfig,
    pub dog: DogConfig,
    pub spatial_cell_size: f32,
    pub initial_agents: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::from_initial(&InitialConfig::default())
    }
}

fn positive_f32(value: f32, fallback: f32, name: &str) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        warn!("[CONFIG] {} must be positive, got {}; using {}", name, value, fallback);
        fallback
    }
}

fn non_negative_f32(value: f32, name: &str) -> f32 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        warn!("[CONFIG] {} must not be negative, got {}; using 0", name, value);
        0.0
    }
}

fn unit_ratio(value: f32, name: &str) -> f32 {
    if !value.is_finite() {
        warn!("[CONFIG] {} is not finite; using 0", name);
        return 0.0;
    }
    let clamped = value.clamp(0.0, 1.0);
    if clamped != value {
        warn!("[CONFIG] {} = {} outside [0, 1]; clamped to {}", name, value, clamped);
    }
    clamped
}

fn at_least<T: PartialOrd + Copy + std::fmt::Display>(value: T, min: T, fallback: T, name: &str) -> T {
    if value >= min {
        value
    } else {
        warn!("[CONFIG] {} = {} is below {}; using {}", name, value, min, fallback);
        fallback
    }
}

impl SimConfig {
    pub fn from_initial(initial: &InitialConfig) -> Self {
        let tick_rate = positive_f32(initial.tick_rate as f32, 60.0, "tick_rate").round().max(1.0) as u32;

        let world_default = WorldConfig::default();
        let world = WorldConfig {
            cols: at_least(initial.world.cols, 1, world_default.cols, "world.cols"),
            rows: at_least(initial.world.rows, 1, world_default.rows, "world.rows"),
            cell_size: positive_f32(initial.world.cell_size, world_default.cell_size, "world.cell_size"),
        };

        let agent_default = AgentConfig::default();
        let a = &initial.agent;
        let agent = AgentConfig {
            radius: positive_f32(a.radius, agent_default.radius, "agent.radius"),
            base_speed: non_negative_f32(a.base_speed, "agent.base_speed"),
            speed_jitter: unit_ratio(a.speed_jitter, "agent.speed_jitter"),
            separation_distance: non_negative_f32(a.separation_distance, "agent.separation_distance"),
            max_durability: at_least(a.max_durability, 1, agent_default.max_durability, "agent.max_durability"),
            decay_frames: non_negative_f32(a.decay_frames, "agent.decay_frames"),
            decay_min_speed_ratio: unit_ratio(a.decay_min_speed_ratio, "agent.decay_min_speed_ratio"),
            sight_range: non_negative_f32(a.sight_range, "agent.sight_range"),
            wander_interval_ms: a.wander_interval_ms,
            max_agents: at_least(a.max_agents, 1, agent_default.max_agents, "agent.max_agents"),
        };

        let scent_default = ScentConfig::default();
        let scent = ScentConfig {
            step_distance: positive_f32(initial.scent.step_distance, scent_default.step_distance, "scent.step_distance"),
            max_footprints: at_least(initial.scent.max_footprints, 1, scent_default.max_footprints, "scent.max_footprints"),
            lifetime_ms: at_least(initial.scent.lifetime_ms, 1, scent_default.lifetime_ms, "scent.lifetime_ms"),
        };

        let t = &initial.tracker;
        let mut tracker = TrackerConfig {
            sight_range: non_negative_f32(t.sight_range, "tracker.sight_range"),
            scan_interval_ticks: at_least(t.scan_interval_ticks, 1, 1, "tracker.scan_interval_ticks"),
            scent_radius: non_negative_f32(t.scent_radius, "tracker.scent_radius"),
            far_scent_radius: non_negative_f32(t.far_scent_radius, "tracker.far_scent_radius"),
            newer_footprint_ms: t.newer_footprint_ms,
            top_k: at_least(t.top_k, 1, 1, "tracker.top_k"),
            lost_timeout_ms: t.lost_timeout_ms,
            lost_nudge_range: non_negative_f32(t.lost_nudge_range, "tracker.lost_nudge_range"),
            wander_interval_ms: t.wander_interval_ms,
        };
        if tracker.far_scent_radius < tracker.scent_radius {
            warn!(
                "[CONFIG] tracker.far_scent_radius {} is below scent_radius {}; raising it",
                tracker.far_scent_radius, tracker.scent_radius
            );
            tracker.far_scent_radius = tracker.scent_radius;
        }

        let wh_default = WallHugConfig::default();
        let w = &initial.wall_hug;
        let wall_hug = WallHugConfig {
            sight_range: non_negative_f32(w.sight_range, "wall_hug.sight_range"),
            probe_min_distance: non_negative_f32(w.probe_min_distance, "wall_hug.probe_min_distance"),
            probe_cell_ratio: non_negative_f32(w.probe_cell_ratio, "wall_hug.probe_cell_ratio"),
            probe_step: positive_f32(w.probe_step, wh_default.probe_step, "wall_hug.probe_step"),
            probe_angle_deg: positive_f32(w.probe_angle_deg, wh_default.probe_angle_deg, "wall_hug.probe_angle_deg"),
            target_gap: non_negative_f32(w.target_gap, "wall_hug.target_gap"),
            turn_step_deg: positive_f32(w.turn_step_deg, wh_default.turn_step_deg, "wall_hug.turn_step_deg"),
            reference_speed: positive_f32(w.reference_speed, wh_default.reference_speed, "wall_hug.reference_speed"),
            lost_wall_ms: w.lost_wall_ms,
            gap_turn_deg: non_negative_f32(w.gap_turn_deg, "wall_hug.gap_turn_deg"),
            bump_reverse_chance: unit_ratio(w.bump_reverse_chance, "wall_hug.bump_reverse_chance"),
        };

        let train_default = TrainConfig::default();
        let tr = &initial.train;
        let train = TrainConfig {
            speed_multiplier: positive_f32(tr.speed_multiplier, train_default.speed_multiplier, "train.speed_multiplier"),
            sight_range: non_negative_f32(tr.sight_range, "train.sight_range"),
            join_radius: non_negative_f32(tr.join_radius, "train.join_radius"),
            history_proximity: non_negative_f32(tr.history_proximity, "train.history_proximity"),
            merge_dwell_ms: tr.merge_dwell_ms,
            dissolve_interval_ms: tr.dissolve_interval_ms,
            sample_gap: at_least(tr.sample_gap, 1, train_default.sample_gap, "train.sample_gap"),
            record_threshold: positive_f32(tr.record_threshold, train_default.record_threshold, "train.record_threshold"),
            repel_ticks: tr.repel_ticks,
            repel_strength: non_negative_f32(tr.repel_strength, "train.repel_strength"),
            draw_shift_alpha: unit_ratio(tr.draw_shift_alpha, "train.draw_shift_alpha"),
        };

        let cg_default = CongestionConfig::default();
        let c = &initial.congestion;
        let congestion = CongestionConfig {
            cadence_ticks: at_least(c.cadence_ticks, 1, cg_default.cadence_ticks, "congestion.cadence_ticks"),
            cell_size: positive_f32(c.cell_size, cg_default.cell_size, "congestion.cell_size"),
            threshold: at_least(c.threshold, 1, cg_default.threshold, "congestion.threshold"),
        };

        let so_default = SolitaryConfig::default();
        let s = &initial.solitary;
        let solitary = SolitaryConfig {
            window_ticks: at_least(s.window_ticks, 1, so_default.window_ticks, "solitary.window_ticks"),
            band_cells: at_least(s.band_cells, 1, so_default.band_cells, "solitary.band_cells"),
            target_weight: s.target_weight,
            sight_range: non_negative_f32(s.sight_range, "solitary.sight_range"),
            reverse_tolerance: s.reverse_tolerance,
        };

        let dog_default = DogConfig::default();
        let d = &initial.dog;
        let dog = DogConfig {
            radius: positive_f32(d.radius, dog_default.radius, "dog.radius"),
            sight_range: non_negative_f32(d.sight_range, "dog.sight_range"),
            pack_chase_range: non_negative_f32(d.pack_chase_range, "dog.pack_chase_range"),
            patrol_speed: non_negative_f32(d.patrol_speed, "dog.patrol_speed"),
            assault_speed: non_negative_f32(d.assault_speed, "dog.assault_speed"),
            charge_windup_ticks: d.charge_windup_ticks,
            bite_interval_ticks: at_least(d.bite_interval_ticks, 1, dog_default.bite_interval_ticks, "dog.bite_interval_ticks"),
            bite_damage: d.bite_damage.max(0),
            wander_interval_ms: d.wander_interval_ms,
        };

        let spatial_cell_size = positive_f32(initial.spatial_cell_size, world.cell_size, "spatial_cell_size");

        Self {
            seed: initial.seed,
            tick_rate,
            world,
            agent,
            spawn: SpawnTable::from_ratios(&initial.spawn_ratios),
            scent,
            tracker,
            wall_hug,
            train,
            congestion,
            solitary,
            dog,
            spatial_cell_size,
            initial_agents: initial.initial_agents,
        }
    }

    /// World-space extent of the level.
    pub fn world_size(&self) -> Vec2 {
        Vec2::new(self.world.cols as f32, self.world.rows as f32) * self.world.cell_size
    }
}

// ============================================================================
// Tracked Parties
// ============================================================================

/// A party the agents hunt, fed in each frame by the game layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedParty {
    pub id: u32,
    pub pos: Vec2,
    pub radius: f32,
    /// A party in a vehicle leaves no scent.
    pub in_vehicle: bool,
    /// Whether freshly laid footprints render.
    pub visible: bool,
}

/// Current positions of the tracked parties. The first entry is the primary
/// party, the only one that lays scent.
#[derive(Resource, Debug, Clone, Default)]
pub struct Targets {
    pub parties: Vec<TrackedParty>,
}

impl Targets {
    pub fn single(pos: Vec2) -> Self {
        Self {
            parties: vec![TrackedParty { id: 1, pos, radius: 8.0, in_vehicle: false, visible: true }],
        }
    }

    pub fn primary(&self) -> Option<&TrackedParty> {
        self.parties.first()
    }

    pub fn get(&self, id: u32) -> Option<&TrackedParty> {
        self.parties.iter().find(|p| p.id == id)
    }

    /// Nearest party within `range` of `pos`; ties go to the lower id.
    pub fn nearest_within(&self, pos: Vec2, range: f32) -> Option<&TrackedParty> {
        let range_sq = range * range;
        self.parties
            .iter()
            .map(|p| (p, p.pos.distance_squared(pos)))
            .filter(|(_, d)| *d <= range_sq)
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.id.cmp(&b.0.id)))
            .map(|(p, _)| p)
    }
}

// ============================================================================
// Agent Table
// ============================================================================

/// Owner of every live agent, iterated in id order.
///
/// Removal is two-phase: [`AgentTable::tombstone`] marks an agent and
/// [`AgentTable::sweep`] drops all marked agents at the end of the tick, so
/// nothing disappears while the dispatcher is iterating.
#[derive(Resource, Debug, Default)]
pub struct AgentTable {
    agents: BTreeMap<AgentId, Agent>,
    ids: IdAllocator,
}

impl AgentTable {
    pub fn allocate_id(&mut self) -> AgentId {
        AgentId(self.ids.next_raw())
    }

    pub fn insert(&mut self, agent: Agent) {
        debug_assert!(!self.agents.contains_key(&agent.id), "duplicate {}", agent.id);
        self.agents.insert(agent.id, agent);
    }

    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    /// Take an agent out for exclusive mutation. Pair with [`AgentTable::restore`].
    pub fn take(&mut self, id: AgentId) -> Option<Agent> {
        self.agents.remove(&id)
    }

    pub fn restore(&mut self, agent: Agent) {
        self.agents.insert(agent.id, agent);
    }

    /// Remove immediately, bypassing the tombstone phase. Only for use
    /// outside the dispatcher pass.
    pub fn remove_now(&mut self, id: AgentId) -> Option<Agent> {
        self.agents.remove(&id)
    }

    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Agent> {
        self.agents.values_mut()
    }

    pub fn iter_alive(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values().filter(|a| a.is_alive())
    }

    pub fn kind_of(&self, id: AgentId) -> Option<AgentKind> {
        self.agents.get(&id).filter(|a| a.is_alive()).map(|a| a.kind())
    }

    pub fn is_alive(&self, id: AgentId) -> bool {
        self.agents.get(&id).is_some_and(|a| a.is_alive())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn alive_count(&self) -> usize {
        self.iter_alive().count()
    }

    pub fn count_kind(&self, kind: AgentKind) -> usize {
        self.iter_alive().filter(|a| a.kind() == kind).count()
    }

    /// Mark for removal. The first reason recorded wins.
    pub fn tombstone(&mut self, id: AgentId, reason: RemovalReason) -> bool {
        match self.agents.get_mut(&id) {
            Some(agent) if agent.is_alive() => {
                agent.removal = Some(reason);
                true
            }
            _ => false,
        }
    }

    /// Drop every tombstoned agent, oldest id first.
    pub fn sweep(&mut self) -> Vec<Agent> {
        let dead: Vec<AgentId> = self
            .agents
            .values()
            .filter(|a| !a.is_alive())
            .map(|a| a.id)
            .collect();
        dead.into_iter().filter_map(|id| self.agents.remove(&id)).collect()
    }

    /// Render-facing snapshot of every live agent.
    pub fn views(&self) -> Vec<AgentView> {
        self.iter_alive().map(Agent::view).collect()
    }
}

// ============================================================================
// Debug Aggregates
// ============================================================================

/// Aggregate counts polled by HUD and logging.
#[derive(Resource, Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugCounts {
    pub live_agents: usize,
    pub by_kind: BTreeMap<AgentKind, usize>,
    pub trains: usize,
    pub markers: usize,
    pub footprints: usize,
    pub forced_wanderers: usize,
    pub tracking: usize,
}
