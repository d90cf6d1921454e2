use bevy::prelude::*;
use rand::rngs::StdRng;

use super::{chase, wander, Body, Steer, SteerContext, WanderState};
use crate::game::scent::tracker::{ScanContext, ScanOutcome, TrackerScent};

/// Scent follower: direct chase in sight, trail walking otherwise.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackerState {
    pub scent: TrackerScent,
    pub wander: WanderState,
}

impl TrackerState {
    pub fn steer(&mut self, body: &Body, ctx: &SteerContext, rng: &mut StdRng) -> Steer {
        let tuning = &ctx.config.tracker;

        if let Some(party) = ctx.targets.nearest_within(body.pos, tuning.sight_range) {
            return Steer::moving(chase::direct(body, party.pos));
        }

        if self.scent.force_wander {
            if self.scent.is_tracking() {
                self.scent.abandon(None);
            }
            return Steer::moving(wander::wander(&mut self.wander, body, ctx.terrain, ctx.now_ms, rng));
        }

        let scan = ScanContext {
            origin: body.pos,
            tick: ctx.tick,
            now_ms: ctx.now_ms,
            trail: ctx.trail,
            terrain: ctx.terrain,
            tuning,
        };
        if self.scent.scan(&scan) == ScanOutcome::Lost {
            debug!("[TRACKER] {} lost the trail at tick {}", body.id, ctx.tick);
            if let Some(party) = ctx.targets.nearest_within(body.pos, tuning.lost_nudge_range) {
                let to_party = party.pos - body.pos;
                self.wander.face(to_party.y.atan2(to_party.x), ctx.now_ms);
            }
        }

        match self.scent.target {
            Some(target) => Steer::moving(chase::direct(body, target.pos)),
            None => Steer::moving(wander::wander(&mut self.wander, body, ctx.terrain, ctx.now_ms, rng)),
        }
    }
}
