//! The per-agent pass.
//!
//! Agents are stepped in id order. Each one is taken out of the table for
//! its step, so the strategy sees every *other* agent through a shared
//! borrow while it mutates its own state. Removals only tombstone; the
//! sweep after the pass does the actual deletion.

use bevy::prelude::*;
use rand::rngs::StdRng;

use crate::game::behavior::SteerContext;
use crate::game::scent::ScentTrail;
use crate::game::spatial_index::SpatialIndex;
use crate::game::terrain::TerrainQuery;
use crate::game::types::AgentId;

use super::collision::{closest_neighbor, resolve_terrain, separate};
use super::events::{AgentDamaged, RemovalReason, WallContact};
use super::resources::{AgentTable, SimClock, SimConfig, Targets};

/// Read-only inputs of one dispatcher pass.
pub struct Dispatcher<'a> {
    pub clock: SimClock,
    pub config: &'a SimConfig,
    pub terrain: &'a dyn TerrainQuery,
    pub trail: &'a ScentTrail,
    pub targets: &'a Targets,
}

/// Side effects of a pass, written out as messages by the caller.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DispatchReport {
    pub stepped: usize,
    pub wall_contacts: Vec<WallContact>,
    pub damaged: Vec<AgentDamaged>,
    pub tombstoned: usize,
}

impl Dispatcher<'_> {
    pub fn run(&self, agents: &mut AgentTable, index: &mut SpatialIndex, rng: &mut StdRng) -> DispatchReport {
        let mut report = DispatchReport::default();
        for id in agents.ids() {
            self.step(id, agents, index, rng, &mut report);
        }
        report
    }

    /// Decay, steer, separate, drift, collide, commit, bite.
    pub fn step(
        &self,
        id: AgentId,
        agents: &mut AgentTable,
        index: &mut SpatialIndex,
        rng: &mut StdRng,
        report: &mut DispatchReport,
    ) {
        let Some(mut agent) = agents.take(id) else {
            return;
        };
        if !agent.is_alive() {
            agents.restore(agent);
            return;
        }
        report.stepped += 1;

        if !agent.apply_decay() {
            agent.removal = Some(RemovalReason::Decay);
            report.tombstoned += 1;
            agents.restore(agent);
            return;
        }

        let steer = {
            let ctx = SteerContext {
                tick: self.clock.tick,
                now_ms: self.clock.now_ms,
                config: self.config,
                terrain: self.terrain,
                index,
                trail: self.trail,
                targets: self.targets,
                agents,
            };
            let body = agent.body();
            let mut steer = agent.behavior.steer(&body, &ctx, rng);

            let distance = self.config.agent.separation_distance;
            if distance > 0.0 {
                let probe = agent.pos + steer.velocity;
                if let Some(neighbor) = closest_neighbor(id, &agent.behavior, probe, distance, index, agents) {
                    let speed = if steer.velocity != Vec2::ZERO {
                        steer.velocity.length()
                    } else {
                        agent.speed
                    };
                    steer.velocity = separate(
                        &mut agent.behavior,
                        agent.pos,
                        agent.radius,
                        speed,
                        steer.velocity,
                        neighbor,
                        &self.config.wall_hug,
                        rng,
                    );
                }
            }
            steer
        };

        let velocity = steer.velocity + self.terrain.floor_drift(agent.pos);
        let resolved = resolve_terrain(self.terrain, agent.pos, agent.radius, velocity);
        if resolved.blocked() {
            agent.behavior.on_wall_hit(rng);
        }
        report
            .wall_contacts
            .extend(resolved.contacts.iter().map(|&cell| WallContact { agent: id, cell }));

        agent.commit_move(resolved.pos);
        index.update(id, agent.pos);

        let bounds = self.terrain.bounds();
        let inside = agent.pos.x >= 0.0 && agent.pos.y >= 0.0 && agent.pos.x < bounds.x && agent.pos.y < bounds.y;
        if !inside {
            agent.removal = Some(RemovalReason::OutOfBounds);
            report.tombstoned += 1;
        }
        agents.restore(agent);

        if let Some(victim) = steer.bite {
            let amount = self.config.dog.bite_damage;
            if let Some(target) = agents.get_mut(victim).filter(|a| a.is_alive()) {
                let depleted = target.apply_damage(amount);
                report.damaged.push(AgentDamaged { agent: victim, amount });
                if depleted {
                    agents.tombstone(victim, RemovalReason::Damage);
                    report.tombstoned += 1;
                }
            }
        }
    }
}
