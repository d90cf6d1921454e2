use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::Rng;
use std::f32::consts::{FRAC_PI_2, PI};

use super::{chase, wander, Body, Steer, SteerContext, WanderState};
use crate::game::config::WallHugConfig;
use crate::game::math::{heading, wrap_angle};
use crate::game::terrain::TerrainQuery;

/// Gap errors smaller than this are left alone.
const GAP_DEADBAND: f32 = 0.1;

/// Probe-steered wall follower.
///
/// Keeps a wall on `hand_side` (+1 turns counter-clockwise toward it in screen
/// space, -1 the other way) at `target_gap` clearance using three probes:
/// forward, diagonal toward the wall, and perpendicular toward the wall. The
/// perpendicular probe catches openings the diagonal probe would skim past.
#[derive(Clone, Debug, PartialEq)]
pub struct WallHugState {
    pub hand_side: f32,
    pub angle: f32,
    pub engaged: bool,
    pub last_wall_ms: Option<u64>,
    pub perp_had_wall: bool,
    pub wander: WanderState,
}

/// Distances reported by one probe sweep. A probe that sees nothing reports
/// the sensor length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbeReadings {
    pub forward: f32,
    pub diagonal: f32,
    pub perpendicular: f32,
    pub sensor: f32,
}

impl ProbeReadings {
    pub fn forward_hit(&self) -> bool {
        self.forward < self.sensor
    }

    pub fn side_hit(&self) -> bool {
        self.diagonal < self.sensor
    }

    pub fn perpendicular_hit(&self) -> bool {
        self.perpendicular < self.sensor
    }
}

pub fn sensor_length(tuning: &WallHugConfig, cell_size: f32, radius: f32) -> f32 {
    tuning.probe_min_distance.max(cell_size * tuning.probe_cell_ratio) + radius
}

/// March along `angle` from `origin` and return the distance to the first
/// blocked sample, or `max` when nothing blocks.
pub fn probe(terrain: &dyn TerrainQuery, origin: Vec2, angle: f32, max: f32, step: f32) -> f32 {
    let dir = heading(angle);
    let step = step.max(0.25);
    let mut dist = step;
    while dist <= max {
        if terrain.is_blocked_at(origin + dir * dist) {
            return dist;
        }
        dist += step;
    }
    max
}

impl WallHugState {
    pub fn new(hand_side: f32, wander: WanderState) -> Self {
        Self {
            hand_side: if hand_side < 0.0 { -1.0 } else { 1.0 },
            angle: wander.angle,
            engaged: false,
            last_wall_ms: None,
            perp_had_wall: false,
            wander,
        }
    }

    pub fn random(wander: WanderState, rng: &mut StdRng) -> Self {
        Self::new(if rng.random_bool(0.5) { 1.0 } else { -1.0 }, wander)
    }

    pub fn read_probes(&self, body: &Body, terrain: &dyn TerrainQuery, tuning: &WallHugConfig) -> ProbeReadings {
        let sensor = sensor_length(tuning, terrain.cell_size(), body.radius);
        let offset = tuning.probe_angle_deg.to_radians();
        let side = self.hand_side;
        ProbeReadings {
            forward: probe(terrain, body.pos, self.angle, sensor, tuning.probe_step),
            diagonal: probe(terrain, body.pos, self.angle + side * offset, sensor, tuning.probe_step),
            perpendicular: probe(terrain, body.pos, self.angle + side * FRAC_PI_2, sensor, tuning.probe_step),
            sensor,
        }
    }

    /// Turn around after bumping into a neighbour.
    pub fn bump_reverse(&mut self) -> f32 {
        self.angle = wrap_angle(self.angle + PI);
        self.perp_had_wall = false;
        self.angle
    }

    pub fn steer(&mut self, body: &Body, ctx: &SteerContext, rng: &mut StdRng) -> Steer {
        let tuning = &ctx.config.wall_hug;
        if let Some(party) = ctx.targets.nearest_within(body.pos, tuning.sight_range) {
            return Steer::moving(chase::direct(body, party.pos));
        }

        if !self.engaged && !self.acquire(body, ctx.terrain, tuning, ctx.now_ms) {
            let v = wander::wander(&mut self.wander, body, ctx.terrain, ctx.now_ms, rng);
            return Steer::moving(v);
        }

        match self.follow(body, ctx.terrain, tuning, ctx.now_ms) {
            Some(v) => Steer::moving(v),
            None => {
                self.wander.face(self.angle, ctx.now_ms);
                Steer::moving(wander::wander(&mut self.wander, body, ctx.terrain, ctx.now_ms, rng))
            }
        }
    }

    /// Engage when any probe around the wander heading touches a wall.
    fn acquire(&mut self, body: &Body, terrain: &dyn TerrainQuery, tuning: &WallHugConfig, now_ms: u64) -> bool {
        let sensor = sensor_length(tuning, terrain.cell_size(), body.radius);
        let offset = tuning.probe_angle_deg.to_radians();
        let angle = self.wander.angle;
        let touching = [angle, angle + offset, angle - offset]
            .into_iter()
            .any(|a| probe(terrain, body.pos, a, sensor, tuning.probe_step) < sensor);
        if touching {
            self.engaged = true;
            self.angle = angle;
            self.last_wall_ms = Some(now_ms);
            self.perp_had_wall = false;
        }
        touching
    }

    /// One controller step. `None` means the wall has been gone too long.
    pub fn follow(&mut self, body: &Body, terrain: &dyn TerrainQuery, tuning: &WallHugConfig, now_ms: u64) -> Option<Vec2> {
        let readings = self.read_probes(body, terrain, tuning);
        let side = self.hand_side;
        let turn_step = tuning.turn_step_deg.to_radians();
        let scale = if tuning.reference_speed > 0.0 {
            body.speed / tuning.reference_speed
        } else {
            1.0
        };

        if readings.forward_hit() || readings.side_hit() || readings.perpendicular_hit() {
            self.last_wall_ms = Some(now_ms);
        }

        if self.perp_had_wall && !readings.perpendicular_hit() && !readings.forward_hit() {
            // Opening on the wall side: swing into it.
            self.angle += side * tuning.gap_turn_deg.to_radians();
        } else if readings.side_hit() {
            let offset = tuning.probe_angle_deg.to_radians();
            let gap = readings.diagonal * offset.sin() - body.radius;
            let error = gap - tuning.target_gap;
            if error.abs() > GAP_DEADBAND {
                let ratio = if tuning.target_gap > 0.0 {
                    (error.abs() / tuning.target_gap).min(1.0)
                } else {
                    1.0
                };
                self.angle += side * turn_step * ratio * scale * error.signum();
            }
            if readings.forward - body.radius < tuning.target_gap {
                self.angle -= side * 1.5 * turn_step * scale;
            }
        } else if readings.forward_hit() {
            self.angle -= side * turn_step * scale;
        } else if self
            .last_wall_ms
            .is_some_and(|t| now_ms.saturating_sub(t) <= tuning.lost_wall_ms)
        {
            self.angle += side * 0.75 * turn_step * scale;
        } else {
            self.engaged = false;
            self.perp_had_wall = false;
            return None;
        }

        self.perp_had_wall = readings.perpendicular_hit();
        self.angle = wrap_angle(self.angle);
        Some(heading(self.angle) * body.speed)
    }
}
