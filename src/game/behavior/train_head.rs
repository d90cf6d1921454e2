use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::Rng;
use std::f32::consts::TAU;

use super::{chase, wander, Body, Steer, SteerContext, WanderState};
use crate::game::math::heading;

/// Steering state of a convoy head. The target is written by the train
/// pre-pass each tick; the head itself only pursues or wanders.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainHeadState {
    pub target: Option<Vec2>,
    pub target_radius: f32,
    pub repel_left: u32,
    pub repel_dir: Vec2,
    pub wander: WanderState,
}

impl TrainHeadState {
    pub fn new(wander: WanderState) -> Self {
        Self {
            target: None,
            target_radius: 0.0,
            repel_left: 0,
            repel_dir: Vec2::ZERO,
            wander,
        }
    }

    pub fn steer(&mut self, body: &Body, ctx: &SteerContext, rng: &mut StdRng) -> Steer {
        let tuning = &ctx.config.train;
        if self.repel_left > 0 {
            self.repel_left -= 1;
            return Steer::moving(self.repel_dir * body.speed * tuning.repel_strength);
        }

        let Some(target) = self.target else {
            return Steer::moving(wander::wander(&mut self.wander, body, ctx.terrain, ctx.now_ms, rng));
        };

        let contact = body.radius + self.target_radius;
        if body.pos.distance_squared(target) <= contact * contact {
            let away = (body.pos - target).normalize_or_zero();
            self.repel_dir = if away == Vec2::ZERO {
                heading(rng.random_range(0.0..TAU))
            } else {
                away
            };
            self.repel_left = tuning.repel_ticks.saturating_sub(1);
            return Steer::moving(self.repel_dir * body.speed * tuning.repel_strength);
        }

        Steer::moving(chase::direct(body, target))
    }
}
