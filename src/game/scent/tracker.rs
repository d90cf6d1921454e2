//! Target selection for scent trackers.
//!
//! A tracker never follows the party directly unless it can see it. Instead it
//! locks onto one footprint at a time and re-evaluates every few ticks, always
//! moving forward in time along the trail.

use bevy::prelude::*;

use crate::game::config::TrackerConfig;
use crate::game::scent::{Footprint, ScentOrder, ScentTrail};
use crate::game::terrain::TerrainQuery;

/// The footprint a tracker is currently walking toward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScentTarget {
    pub footprint: u64,
    pub pos: Vec2,
    pub time_ms: u64,
}

impl From<&Footprint> for ScentTarget {
    fn from(fp: &Footprint) -> Self {
        Self { footprint: fp.id, pos: fp.pos, time_ms: fp.time_ms }
    }
}

/// Per-tracker scent memory.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackerScent {
    pub target: Option<ScentTarget>,
    /// Footprints at or before this time are never considered again.
    pub ignore_until_ms: Option<u64>,
    /// Last time the trail was seen to extend past the current target.
    pub last_progress_ms: Option<u64>,
    pub next_scan_tick: u64,
    /// Set by the congestion controller for the current cadence window.
    pub force_wander: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Not this tick; the current target stands.
    Throttled,
    Unchanged,
    Retargeted,
    /// No progress for the loss timeout. The target was dropped and the
    /// ignore boundary moved past it.
    Lost,
}

/// Read-only inputs for one scan.
pub struct ScanContext<'a> {
    pub origin: Vec2,
    pub tick: u64,
    pub now_ms: u64,
    pub trail: &'a ScentTrail,
    pub terrain: &'a dyn TerrainQuery,
    pub tuning: &'a TrackerConfig,
}

impl TrackerScent {
    /// Fresh memory whose first scan is staggered by `stagger` ticks so a
    /// crowd spawned together does not scan in lockstep.
    pub fn new(first_tick: u64, stagger: u64) -> Self {
        Self { next_scan_tick: first_tick + stagger, ..default() }
    }

    pub fn is_tracking(&self) -> bool {
        self.target.is_some()
    }

    fn is_eligible(&self, fp: &Footprint, expiry: Option<u64>) -> bool {
        let boundary = match (self.ignore_until_ms, expiry) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        boundary.is_none_or(|b| fp.time_ms > b)
    }

    /// Drop the target and never reconsider anything at or before it.
    ///
    /// With no current target the boundary still moves to `fallback_ms`
    /// when given, so an agent pulled off a trail cannot fall back onto
    /// the same stretch of it.
    pub fn abandon(&mut self, fallback_ms: Option<u64>) {
        let boundary = self.target.map(|t| t.time_ms).or(fallback_ms);
        if let Some(b) = boundary {
            self.ignore_until_ms = Some(self.ignore_until_ms.map_or(b, |old| old.max(b)));
        }
        self.target = None;
        self.last_progress_ms = None;
    }

    /// Re-evaluate the target if the scan interval has elapsed.
    pub fn scan(&mut self, ctx: &ScanContext) -> ScanOutcome {
        if ctx.tick < self.next_scan_tick {
            return ScanOutcome::Throttled;
        }
        self.next_scan_tick = ctx.tick + ctx.tuning.scan_interval_ticks.max(1);
        self.scan_now(ctx)
    }

    /// Re-evaluate the target unconditionally.
    pub fn scan_now(&mut self, ctx: &ScanContext) -> ScanOutcome {
        let expiry = ctx.trail.expiry_boundary(ctx.now_ms);

        if let Some(target) = self.target {
            let progress = *self.last_progress_ms.get_or_insert(ctx.now_ms);
            let trail_extends = ctx
                .trail
                .iter()
                .rev()
                .take_while(|fp| fp.time_ms > target.time_ms)
                .any(|fp| self.is_eligible(fp, expiry));
            if trail_extends {
                self.last_progress_ms = Some(ctx.now_ms);
            } else if ctx.now_ms.saturating_sub(progress) >= ctx.tuning.lost_timeout_ms {
                self.abandon(None);
                return ScanOutcome::Lost;
            }
        }

        let last_time = self.target.map(|t| t.time_ms);
        let floor = match (last_time, self.ignore_until_ms) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        let far: Vec<Footprint> = ctx
            .trail
            .query(ctx.origin, ctx.tuning.far_scent_radius, expiry, ScentOrder::OldestFirst)
            .into_iter()
            .filter(|fp| self.is_eligible(fp, expiry))
            .collect();
        let Some(latest) = far.last() else {
            return ScanOutcome::Unchanged;
        };

        let mut use_far = match last_time {
            None => true,
            Some(t) => latest.time_ms.saturating_sub(t) >= ctx.tuning.newer_footprint_ms,
        };

        let min_dist_sq = (ctx.trail.step_distance() * 0.5).powi(2);
        let newer_within = |radius: f32| -> Vec<Footprint> {
            let radius_sq = radius * radius;
            far.iter()
                .filter(|fp| {
                    let d = fp.pos.distance_squared(ctx.origin);
                    d > min_dist_sq && d <= radius_sq && floor.is_none_or(|f| fp.time_ms > f)
                })
                .copied()
                .collect()
        };

        let mut newer = newer_within(if use_far {
            ctx.tuning.far_scent_radius
        } else {
            ctx.tuning.scent_radius
        });
        if newer.is_empty() && !use_far {
            use_far = true;
            newer = newer_within(ctx.tuning.far_scent_radius);
        }
        if newer.is_empty() {
            return ScanOutcome::Unchanged;
        }

        let top_k = ctx.tuning.top_k.max(1);
        // Near mode only runs when nothing is `newer_footprint_ms` past the
        // target, so it steps to the oldest newer footprints in order.
        let candidates: Vec<&Footprint> = if use_far {
            newer.iter().rev().take(top_k).collect()
        } else {
            newer.iter().take(top_k).collect()
        };

        for fp in candidates {
            if ctx.terrain.raycast_clear(ctx.origin, fp.pos) {
                self.lock(fp, ctx.now_ms);
                return ScanOutcome::Retargeted;
            }
        }

        match self.target {
            Some(target) if target.pos.distance_squared(ctx.origin) > min_dist_sq => {
                ScanOutcome::Unchanged
            }
            Some(_) => {
                self.lock(&newer[0], ctx.now_ms);
                ScanOutcome::Retargeted
            }
            None => ScanOutcome::Unchanged,
        }
    }

    fn lock(&mut self, fp: &Footprint, now_ms: u64) {
        let advanced = self.target.is_none_or(|t| fp.time_ms > t.time_ms);
        self.target = Some(ScentTarget::from(fp));
        if advanced {
            self.last_progress_ms = Some(now_ms);
        }
    }
}
