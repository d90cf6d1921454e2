//! Per-kind steering strategies.
//!
//! Every strategy is a function of the agent's own state plus a read-only
//! [`SteerContext`] and returns a desired velocity for this tick. Separation,
//! drift and terrain collision are applied afterwards by the dispatcher.

use bevy::prelude::*;
use rand::rngs::StdRng;

use crate::game::scent::tracker::TrackerScent;
use crate::game::scent::ScentTrail;
use crate::game::simulation::{AgentTable, SimConfig, Targets};
use crate::game::spatial_index::SpatialIndex;
use crate::game::terrain::TerrainQuery;
use crate::game::types::{AgentId, AgentKind};

pub mod chase;
pub mod dog;
pub mod solitary;
pub mod tracker;
pub mod train_head;
pub mod wall_hug;
pub mod wander;


pub use dog::{DogMode, DogState};
pub use solitary::{BandCounts, SolitaryState};
pub use tracker::TrackerState;
pub use train_head::TrainHeadState;
pub use wall_hug::WallHugState;
pub use wander::WanderState;

/// Kinematic snapshot of the agent being steered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Body {
    pub id: AgentId,
    pub pos: Vec2,
    pub radius: f32,
    /// Current speed after decay.
    pub speed: f32,
    /// `speed / initial_speed`, used to scale kind-specific speeds.
    pub speed_ratio: f32,
    pub last_move: Vec2,
}

/// Everything a strategy may read. Nothing in here is mutated during steering.
pub struct SteerContext<'a> {
    pub tick: u64,
    pub now_ms: u64,
    pub config: &'a SimConfig,
    pub terrain: &'a dyn TerrainQuery,
    pub index: &'a SpatialIndex,
    pub trail: &'a ScentTrail,
    pub targets: &'a Targets,
    /// Other agents. The agent being steered is not in the table while it runs.
    pub agents: &'a AgentTable,
}

/// Output of one strategy call.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Steer {
    pub velocity: Vec2,
    /// Agent bitten this tick.
    pub bite: Option<AgentId>,
}

impl Steer {
    pub fn moving(velocity: Vec2) -> Self {
        Self { velocity, bite: None }
    }

    pub fn still() -> Self {
        Self::default()
    }
}

/// Behavior variant plus its private state.
#[derive(Clone, Debug)]
pub enum Behavior {
    Normal(WanderState),
    Tracker(TrackerState),
    WallHugger(WallHugState),
    Train(TrainHeadState),
    SpacingSeeker(SolitaryState),
    PursuitDog(DogState),
}

impl Behavior {
    pub fn kind(&self) -> AgentKind {
        match self {
            Behavior::Normal(_) => AgentKind::Normal,
            Behavior::Tracker(_) => AgentKind::Tracker,
            Behavior::WallHugger(_) => AgentKind::WallHugger,
            Behavior::Train(_) => AgentKind::Train,
            Behavior::SpacingSeeker(_) => AgentKind::SpacingSeeker,
            Behavior::PursuitDog(_) => AgentKind::PursuitDog,
        }
    }

    pub fn steer(&mut self, body: &Body, ctx: &SteerContext, rng: &mut StdRng) -> Steer {
        match self {
            Behavior::Normal(wander) => {
                let sight = ctx.config.agent.sight_range;
                match ctx.targets.nearest_within(body.pos, sight) {
                    Some(party) => Steer::moving(chase::direct(body, party.pos)),
                    None => Steer::moving(wander::wander(wander, body, ctx.terrain, ctx.now_ms, rng)),
                }
            }
            Behavior::Tracker(state) => state.steer(body, ctx, rng),
            Behavior::WallHugger(state) => state.steer(body, ctx, rng),
            Behavior::Train(state) => state.steer(body, ctx, rng),
            Behavior::SpacingSeeker(state) => state.steer(body, ctx),
            Behavior::PursuitDog(state) => state.steer(body, ctx, rng),
        }
    }

    /// Terrain stopped the agent on at least one axis.
    pub fn on_wall_hit(&mut self, rng: &mut StdRng) {
        if let Behavior::PursuitDog(state) = self {
            state.on_wall_hit(rng);
        }
    }

    /// Whether separation should push this agent away from `other`.
    pub fn separates_from(&self, other: AgentKind) -> bool {
        match self {
            Behavior::PursuitDog(_) => other == AgentKind::PursuitDog,
            _ => true,
        }
    }

    pub fn tracker_scent(&self) -> Option<&TrackerScent> {
        match self {
            Behavior::Tracker(state) => Some(&state.scent),
            _ => None,
        }
    }

    pub fn tracker_scent_mut(&mut self) -> Option<&mut TrackerScent> {
        match self {
            Behavior::Tracker(state) => Some(&mut state.scent),
            _ => None,
        }
    }

    pub fn wall_hug_mut(&mut self) -> Option<&mut WallHugState> {
        match self {
            Behavior::WallHugger(state) => Some(state),
            _ => None,
        }
    }

    pub fn train_head(&self) -> Option<&TrainHeadState> {
        match self {
            Behavior::Train(state) => Some(state),
            _ => None,
        }
    }

    pub fn train_head_mut(&mut self) -> Option<&mut TrainHeadState> {
        match self {
            Behavior::Train(state) => Some(state),
            _ => None,
        }
    }
}
