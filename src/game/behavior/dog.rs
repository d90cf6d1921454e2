use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::Rng;
use std::f32::consts::TAU;

use super::{chase, Body, Steer, SteerContext, WanderState};
use crate::game::math::heading;
use crate::game::types::{AgentId, AgentKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DogMode {
    Wander,
    /// Locked-direction dash at the tracked party, after a windup.
    Charge,
    /// Hunting another agent.
    Chase,
}

/// Pursuit dog: patrols, charges the party on sight, and hunts other agents.
#[derive(Clone, Debug, PartialEq)]
pub struct DogState {
    pub mode: DogMode,
    pub charge_dir: Vec2,
    pub windup_left: u32,
    pub prey: Option<AgentId>,
    pub bite_cooldown: u32,
    pub wander: WanderState,
}

impl DogState {
    pub fn new(wander: WanderState) -> Self {
        Self {
            mode: DogMode::Wander,
            charge_dir: Vec2::ZERO,
            windup_left: 0,
            prey: None,
            bite_cooldown: 0,
            wander,
        }
    }

    /// Nearest live non-dog agent within the pack chase range.
    fn nearest_prey(body: &Body, ctx: &SteerContext) -> Option<(AgentId, Vec2, f32)> {
        let range = ctx.config.dog.pack_chase_range;
        let range_sq = range * range;
        ctx.index
            .query_radius(body.pos, range)
            .into_iter()
            .filter(|id| *id != body.id)
            .filter_map(|id| {
                let agent = ctx.agents.get(id)?;
                (agent.is_alive() && agent.kind() != AgentKind::PursuitDog)
                    .then_some((id, agent.pos, agent.radius))
            })
            .map(|(id, pos, radius)| (id, pos, radius, pos.distance_squared(body.pos)))
            .filter(|(.., d)| *d <= range_sq)
            .min_by(|a, b| a.3.total_cmp(&b.3).then(a.0.cmp(&b.0)))
            .map(|(id, pos, radius, _)| (id, pos, radius))
    }

    pub fn steer(&mut self, body: &Body, ctx: &SteerContext, rng: &mut StdRng) -> Steer {
        let tuning = &ctx.config.dog;
        let patrol = tuning.patrol_speed * body.speed_ratio;
        let assault = tuning.assault_speed * body.speed_ratio;
        self.bite_cooldown = self.bite_cooldown.saturating_sub(1);

        let prey = Self::nearest_prey(body, ctx);
        match prey {
            Some((id, ..)) => {
                self.mode = DogMode::Chase;
                self.prey = Some(id);
            }
            None if self.mode == DogMode::Chase => {
                self.mode = DogMode::Wander;
                self.prey = None;
            }
            None => {}
        }

        let party = ctx.targets.nearest_within(body.pos, tuning.sight_range);
        match (self.mode, party) {
            (DogMode::Wander, Some(party)) => {
                self.mode = DogMode::Charge;
                self.windup_left = tuning.charge_windup_ticks;
                self.charge_dir = (party.pos - body.pos).normalize_or_zero();
                if self.charge_dir == Vec2::ZERO {
                    self.charge_dir = heading(rng.random_range(0.0..TAU));
                }
            }
            (DogMode::Charge, None) => {
                self.mode = DogMode::Wander;
            }
            _ => {}
        }

        match self.mode {
            DogMode::Wander => {
                if ctx.now_ms.saturating_sub(self.wander.last_change_ms) > tuning.wander_interval_ms {
                    self.wander.randomize(ctx.now_ms, rng);
                }
                Steer::moving(heading(self.wander.angle) * patrol)
            }
            DogMode::Charge => {
                if self.windup_left > 0 {
                    self.windup_left -= 1;
                    return Steer::still();
                }
                Steer::moving(self.charge_dir * assault)
            }
            DogMode::Chase => {
                let Some((id, pos, radius)) = prey else {
                    return Steer::still();
                };
                let reach = body.radius + radius;
                let bite = (self.bite_cooldown == 0 && body.pos.distance_squared(pos) <= reach * reach)
                    .then(|| {
                        self.bite_cooldown = tuning.bite_interval_ticks;
                        id
                    });
                let velocity = chase::direct(&Body { speed: assault, ..*body }, pos);
                Steer { velocity, bite }
            }
        }
    }

    /// Terrain stopped the dog.
    pub fn on_wall_hit(&mut self, rng: &mut StdRng) {
        match self.mode {
            DogMode::Charge | DogMode::Chase => {
                self.mode = DogMode::Wander;
                self.prey = None;
                self.wander.angle = rng.random_range(0.0..TAU);
            }
            DogMode::Wander => self.wander.reverse(),
        }
    }
}
