use bevy::prelude::*;

use super::Body;
use crate::game::math::move_toward;

/// Straight-line pursuit at the agent's current speed.
pub fn direct(body: &Body, target: Vec2) -> Vec2 {
    move_toward(body.pos, target, body.speed)
}

pub fn in_sight(from: Vec2, target: Vec2, range: f32) -> bool {
    from.distance_squared(target) <= range * range
}
