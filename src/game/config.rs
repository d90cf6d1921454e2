use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::game::types::AgentKind;

pub const INITIAL_CONFIG_PATH: &str = "assets/initial_config.ron";

/// Scenario configuration loaded once at startup.
///
/// Every value here is fixed for the lifetime of a scenario: the simulation
/// reads the sanitized copy in [`crate::game::simulation::SimConfig`] and
/// never looks back at this resource after startup. Distances are world
/// units, speeds are world units per tick, durations are milliseconds of
/// simulation time unless the field name says ticks.
#[derive(Resource, Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct InitialConfig {
    pub seed: u64,
    pub tick_rate: f64,
    pub world: WorldConfig,
    pub agent: AgentConfig,
    pub spawn_ratios: SpawnRatios,
    pub scent: ScentConfig,
    pub tracker: TrackerConfig,
    pub wall_hug: WallHugConfig,
    pub train: TrainConfig,
    pub congestion: CongestionConfig,
    pub solitary: SolitaryConfig,
    pub dog: DogConfig,
    pub spatial_cell_size: f32,
    /// Agents spawned by the demo scenario at startup.
    pub initial_agents: usize,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct WorldConfig {
    pub cols: u32,
    pub rows: u32,
    pub cell_size: f32,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct AgentConfig {
    pub radius: f32,
    pub base_speed: f32,
    /// Fraction of the base speed used as a uniform jitter at spawn.
    pub speed_jitter: f32,
    pub separation_distance: f32,
    pub max_durability: i32,
    /// Ticks for a full durability bar to decay to zero. Zero disables decay.
    pub decay_frames: f32,
    pub decay_min_speed_ratio: f32,
    pub sight_range: f32,
    pub wander_interval_ms: u64,
    pub max_agents: usize,
}

/// Relative spawn weights per agent kind.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct SpawnRatios {
    pub normal: f32,
    pub tracker: f32,
    pub wall_hugger: f32,
    pub train: f32,
    pub spacing_seeker: f32,
    pub dog: f32,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct ScentConfig {
    pub step_distance: f32,
    pub max_footprints: usize,
    pub lifetime_ms: u64,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct TrackerConfig {
    pub sight_range: f32,
    pub scan_interval_ticks: u64,
    pub scent_radius: f32,
    pub far_scent_radius: f32,
    /// Freshness margin: a footprint this much newer than the target wins outright.
    pub newer_footprint_ms: u64,
    pub top_k: usize,
    pub lost_timeout_ms: u64,
    /// On trail loss, a target closer than this seeds the wander heading.
    pub lost_nudge_range: f32,
    pub wander_interval_ms: u64,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct WallHugConfig {
    pub sight_range: f32,
    pub probe_min_distance: f32,
    pub probe_cell_ratio: f32,
    pub probe_step: f32,
    pub probe_angle_deg: f32,
    /// Desired clearance between the agent's edge and the wall.
    pub target_gap: f32,
    pub turn_step_deg: f32,
    pub reference_speed: f32,
    pub lost_wall_ms: u64,
    pub gap_turn_deg: f32,
    pub bump_reverse_chance: f32,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct TrainConfig {
    pub speed_multiplier: f32,
    pub sight_range: f32,
    pub join_radius: f32,
    pub history_proximity: f32,
    pub merge_dwell_ms: u64,
    pub dissolve_interval_ms: u64,
    pub sample_gap: usize,
    pub record_threshold: f32,
    pub repel_ticks: u32,
    pub repel_strength: f32,
    pub draw_shift_alpha: f32,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct CongestionConfig {
    pub cadence_ticks: u64,
    pub cell_size: f32,
    pub threshold: usize,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct SolitaryConfig {
    pub window_ticks: u32,
    pub band_cells: i32,
    pub target_weight: u32,
    pub sight_range: f32,
    pub reverse_tolerance: u32,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct DogConfig {
    pub radius: f32,
    pub sight_range: f32,
    pub pack_chase_range: f32,
    pub patrol_speed: f32,
    pub assault_speed: f32,
    pub charge_windup_ticks: u32,
    pub bite_interval_ticks: u32,
    pub bite_damage: i32,
    pub wander_interval_ms: u64,
}

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(PreStartup, load_initial_config);
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(ron::error::SpannedError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "read failed: {}", e),
            ConfigError::Parse(e) => write!(f, "parse failed: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl InitialConfig {
    pub fn from_ron_str(contents: &str) -> Result<Self, ConfigError> {
        ron::from_str::<InitialConfig>(contents).map_err(ConfigError::Parse)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_ron_str(&contents)
    }
}

/// Load the scenario configuration synchronously at startup.
///
/// A config already present in the world (inserted by a test or an
/// embedding app) wins over the file on disk.
fn load_initial_config(mut commands: Commands, existing: Option<Res<InitialConfig>>) {
    if existing.is_some() {
        info!("InitialConfig already provided, skipping {}", INITIAL_CONFIG_PATH);
        return;
    }

    match InitialConfig::from_file(INITIAL_CONFIG_PATH) {
        Ok(config) => {
            info!("Loaded initial config from {}", INITIAL_CONFIG_PATH);
            commands.insert_resource(config);
        }
        Err(e) => {
            error!("Failed to load {}: {}", INITIAL_CONFIG_PATH, e);
            error!("Using default InitialConfig");
            commands.insert_resource(InitialConfig::default());
        }
    }
}

impl SpawnRatios {
    pub fn weight(&self, kind: AgentKind) -> f32 {
        match kind {
            AgentKind::Normal => self.normal,
            AgentKind::Tracker => self.tracker,
            AgentKind::WallHugger => self.wall_hugger,
            AgentKind::Train => self.train,
            AgentKind::SpacingSeeker => self.spacing_seeker,
            AgentKind::PursuitDog => self.dog,
        }
    }

    /// Only one kind spawns.
    pub fn only(kind: AgentKind) -> Self {
        let mut ratios = Self {
            normal: 0.0,
            tracker: 0.0,
            wall_hugger: 0.0,
            train: 0.0,
            spacing_seeker: 0.0,
            dog: 0.0,
        };
        match kind {
            AgentKind::Normal => ratios.normal = 1.0,
            AgentKind::Tracker => ratios.tracker = 1.0,
            AgentKind::WallHugger => ratios.wall_hugger = 1.0,
            AgentKind::Train => ratios.train = 1.0,
            AgentKind::SpacingSeeker => ratios.spacing_seeker = 1.0,
            AgentKind::PursuitDog => ratios.dog = 1.0,
        }
        ratios
    }
}

impl Default for InitialConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            tick_rate: 60.0,
            world: WorldConfig::default(),
            agent: AgentConfig::default(),
            spawn_ratios: SpawnRatios::default(),
            scent: ScentConfig::default(),
            tracker: TrackerConfig::default(),
            wall_hug: WallHugConfig::default(),
            train: TrainConfig::default(),
            congestion: CongestionConfig::default(),
            solitary: SolitaryConfig::default(),
            dog: DogConfig::default(),
            spatial_cell_size: 32.0,
            initial_agents: 120,
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self { cols: 40, rows: 30, cell_size: 32.0 }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            radius: 8.0,
            base_speed: 0.9,
            speed_jitter: 0.2,
            separation_distance: 20.0,
            max_durability: 100,
            decay_frames: 60.0 * 60.0 * 3.0,
            decay_min_speed_ratio: 0.45,
            sight_range: 120.0,
            wander_interval_ms: 1600,
            max_agents: 400,
        }
    }
}

impl Default for SpawnRatios {
    fn default() -> Self {
        Self {
            normal: 0.4,
            tracker: 0.2,
            wall_hugger: 0.15,
            train: 0.1,
            spacing_seeker: 0.1,
            dog: 0.05,
        }
    }
}

impl Default for ScentConfig {
    fn default() -> Self {
        Self {
            step_distance: 24.0,
            max_footprints: 300,
            lifetime_ms: 135_000,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sight_range: 160.0,
            scan_interval_ticks: 30,
            scent_radius: 96.0,
            far_scent_radius: 320.0,
            newer_footprint_ms: 1200,
            top_k: 3,
            lost_timeout_ms: 6000,
            lost_nudge_range: 240.0,
            wander_interval_ms: 2400,
        }
    }
}

impl Default for WallHugConfig {
    fn default() -> Self {
        Self {
            sight_range: 160.0,
            probe_min_distance: 24.0,
            probe_cell_ratio: 0.75,
            probe_step: 1.0,
            probe_angle_deg: 45.0,
            target_gap: 6.0,
            turn_step_deg: 5.0,
            reference_speed: 0.9,
            lost_wall_ms: 2500,
            gap_turn_deg: 90.0,
            bump_reverse_chance: 0.1,
        }
    }
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.1,
            sight_range: 220.0,
            join_radius: 36.0,
            history_proximity: 24.0,
            merge_dwell_ms: 250,
            dissolve_interval_ms: 0,
            sample_gap: 10,
            record_threshold: 2.0,
            repel_ticks: 12,
            repel_strength: 1.5,
            draw_shift_alpha: 0.45,
        }
    }
}

impl Default for CongestionConfig {
    fn default() -> Self {
        Self {
            cadence_ticks: 15,
            cell_size: 32.0,
            threshold: 3,
        }
    }
}

impl Default for SolitaryConfig {
    fn default() -> Self {
        Self {
            window_ticks: 10,
            band_cells: 3,
            target_weight: 3,
            sight_range: 160.0,
            reverse_tolerance: 1,
        }
    }
}

impl Default for DogConfig {
    fn default() -> Self {
        Self {
            radius: 7.0,
            sight_range: 200.0,
            pack_chase_range: 160.0,
            patrol_speed: 0.7,
            assault_speed: 2.2,
            charge_windup_ticks: 20,
            bite_interval_ticks: 30,
            bite_damage: 10,
            wander_interval_ms: 1800,
        }
    }
}
