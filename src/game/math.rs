use bevy::prelude::*;
use std::f32::consts::{PI, TAU};

/// Number of facing bins exposed to rendering (22.5 degrees each).
pub const FACING_BINS: u8 = 16;

/// Number of heading bins used for congestion bucketing (45 degrees each).
pub const HEADING_BINS: u8 = 8;

/// Movement shorter than this does not change facing or heading.
pub const MOVE_EPSILON: f32 = 0.001;

/// Quantize a direction into `bins` equal sectors, bin 0 centered on +X.
pub fn angle_bin(v: Vec2, bins: u8) -> Option<u8> {
    if v.x.abs() <= MOVE_EPSILON && v.y.abs() <= MOVE_EPSILON {
        return None;
    }
    let step = TAU / bins as f32;
    let bin = (v.y.atan2(v.x) / step).round() as i32;
    Some(bin.rem_euclid(bins as i32) as u8)
}

pub fn facing_bin(v: Vec2) -> Option<u8> {
    angle_bin(v, FACING_BINS)
}

pub fn heading_bin(v: Vec2) -> Option<u8> {
    angle_bin(v, HEADING_BINS)
}

/// Wrap an angle into `[0, TAU)`.
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped >= TAU { 0.0 } else { wrapped }
}

/// Signed shortest rotation from `from` to `to`, in `(-PI, PI]`.
pub fn angle_delta(from: f32, to: f32) -> f32 {
    let d = (to - from + PI).rem_euclid(TAU) - PI;
    if d <= -PI { d + TAU } else { d }
}

/// Integer cell containing `pos`.
pub fn cell_of(pos: Vec2, cell_size: f32) -> IVec2 {
    IVec2::new(
        (pos.x / cell_size).floor() as i32,
        (pos.y / cell_size).floor() as i32,
    )
}

pub fn cell_center(cell: IVec2, cell_size: f32) -> Vec2 {
    Vec2::new(
        (cell.x as f32 + 0.5) * cell_size,
        (cell.y as f32 + 0.5) * cell_size,
    )
}

/// Velocity of length `speed` from `from` toward `to`; zero when they coincide.
pub fn move_toward(from: Vec2, to: Vec2, speed: f32) -> Vec2 {
    let delta = to - from;
    let dist = delta.length();
    if dist <= 0.0 {
        return Vec2::ZERO;
    }
    delta / dist * speed
}

/// Unit heading vector for an angle in radians.
pub fn heading(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

/// Whether a circle overlaps an axis-aligned cell.
pub fn circle_overlaps_cell(center: Vec2, radius: f32, cell: IVec2, cell_size: f32) -> bool {
    let min = cell.as_vec2() * cell_size;
    let max = min + Vec2::splat(cell_size);
    let closest = center.clamp(min, max);
    center.distance_squared(closest) < radius * radius
}
