//! Agent construction.
//!
//! Everything that creates an agent goes through [`AgentSpawner`]: input
//! messages, the initial population and train promotion. It never touches
//! the train manager, so train admission decides *whether* to build an
//! agent and the spawner decides *what* it looks like.

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::Rng;

use crate::game::behavior::{
    Behavior, DogState, SolitaryState, TrackerState, TrainHeadState, WallHugState, WanderState,
};
use crate::game::math::facing_bin;
use crate::game::scent::tracker::TrackerScent;
use crate::game::spatial_index::SpatialIndex;
use crate::game::types::{AgentId, AgentKind};

use super::components::{Agent, Vitals};
use super::resources::{AgentTable, SimClock, SimConfig};

pub struct AgentSpawner<'a> {
    pub config: &'a SimConfig,
    pub clock: SimClock,
}

impl<'a> AgentSpawner<'a> {
    pub fn new(config: &'a SimConfig, clock: SimClock) -> Self {
        Self { config, clock }
    }

    /// Whether the live population leaves room for one more agent.
    pub fn has_room(&self, agents: &AgentTable) -> bool {
        agents.alive_count() < self.config.agent.max_agents
    }

    /// Base speed with a uniform jitter either side.
    fn roll_speed(&self, kind: AgentKind, rng: &mut StdRng) -> f32 {
        let agent = &self.config.agent;
        let jitter = if agent.speed_jitter > 0.0 {
            rng.random_range(-agent.speed_jitter..=agent.speed_jitter)
        } else {
            0.0
        };
        let speed = agent.base_speed * (1.0 + jitter);
        match kind {
            AgentKind::Train => speed * self.config.train.speed_multiplier,
            _ => speed,
        }
    }

    fn behavior_for(&self, id: AgentId, kind: AgentKind, rng: &mut StdRng) -> Behavior {
        let now = self.clock.now_ms;
        let c = self.config;
        match kind {
            AgentKind::Normal => Behavior::Normal(WanderState::new(c.agent.wander_interval_ms, now, rng)),
            AgentKind::Tracker => {
                let interval = c.tracker.scan_interval_ticks.max(1);
                Behavior::Tracker(TrackerState {
                    scent: TrackerScent::new(self.clock.tick, id.0 as u64 % interval),
                    wander: WanderState::new(c.tracker.wander_interval_ms, now, rng),
                })
            }
            AgentKind::WallHugger => {
                let wander = WanderState::new(c.agent.wander_interval_ms, now, rng);
                Behavior::WallHugger(WallHugState::random(wander, rng))
            }
            AgentKind::Train => {
                Behavior::Train(TrainHeadState::new(WanderState::new(c.agent.wander_interval_ms, now, rng)))
            }
            AgentKind::SpacingSeeker => Behavior::SpacingSeeker(SolitaryState::default()),
            AgentKind::PursuitDog => {
                Behavior::PursuitDog(DogState::new(WanderState::new(c.dog.wander_interval_ms, now, rng)))
            }
        }
    }

    /// Build an agent without registering it anywhere.
    pub fn build(&self, id: AgentId, kind: AgentKind, pos: Vec2, rng: &mut StdRng) -> Agent {
        let speed = self.roll_speed(kind, rng);
        let behavior = self.behavior_for(id, kind, rng);
        let radius = match kind {
            AgentKind::PursuitDog => self.config.dog.radius,
            _ => self.config.agent.radius,
        };
        let agent = &self.config.agent;
        let facing = match &behavior {
            Behavior::Normal(w) | Behavior::Train(TrainHeadState { wander: w, .. }) => {
                facing_bin(Vec2::from_angle(w.angle)).unwrap_or(0)
            }
            _ => 0,
        };

        Agent {
            id,
            pos,
            radius,
            initial_speed: speed,
            speed,
            facing_bin: facing,
            last_move: Vec2::ZERO,
            vitals: Vitals::new(agent.max_durability, agent.decay_frames, agent.decay_min_speed_ratio),
            behavior,
            train: None,
            spawned_tick: self.clock.tick,
            removal: None,
        }
    }

    /// Build an agent, add it to the table and the spatial index.
    pub fn spawn(
        &self,
        kind: AgentKind,
        pos: Vec2,
        agents: &mut AgentTable,
        index: &mut SpatialIndex,
        rng: &mut StdRng,
    ) -> AgentId {
        let id = agents.allocate_id();
        let agent = self.build(id, kind, pos, rng);
        index.insert(id, pos);
        agents.insert(agent);
        id
    }
}
