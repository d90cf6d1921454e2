//! Lineformer convoys.
//!
//! A train is one real head agent trailed by markers. Markers are not
//! agents: they are derived positions sampled from the head's recorded path,
//! so a train of twenty costs one dispatcher step per tick.
//!
//! # Lifecycle
//!
//! - **Join**: a train-kind spawn near an active train's tail becomes a
//!   marker there instead of a new head.
//! - **Merge**: a head that chases another train, reaches its tail and has
//!   dwelled on its history long enough folds itself and all its markers
//!   onto that tail.
//! - **Dissolve**: a train whose head disappeared promotes its front marker
//!   to a fresh head, one per pass, until no markers remain.
//!
//! All mutation of the agent table happens in [`TrainManager::pre_update`],
//! which runs before the dispatcher pass, and [`TrainManager::admit`], which
//! runs during input handling. The post pass only reads agents.
//!
//! # Conservation
//!
//! `live train heads + markers` equals train-kind agents ever admitted minus
//! those lost to damage or decay. Joins add a marker instead of a head,
//! merges turn a head into a marker, promotion turns a marker into a head
//! and struck markers are reported as removed.

use bevy::prelude::*;
use rand::rngs::StdRng;
use std::collections::BTreeMap;

use crate::game::config::TrainConfig;
use crate::game::simulation::spawn::AgentSpawner;
use crate::game::simulation::{AgentTable, Targets};
use crate::game::spatial_index::SpatialIndex;
use crate::game::types::{AgentId, AgentKind, IdAllocator, TrainId};

pub mod history;


pub use history::TrainHistory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainState {
    Active,
    Dissolving,
}

/// What a train head is pursuing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainTarget {
    Party(u32),
    Train(TrainId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub pos: Vec2,
    /// Facing toward the previous link, in radians.
    pub angle: f32,
}

#[derive(Debug, Clone)]
pub struct Train {
    pub id: TrainId,
    pub head: AgentId,
    pub state: TrainState,
    pub target: Option<TrainTarget>,
    pub history: TrainHistory,
    /// Nearest-to-head first.
    pub markers: Vec<Marker>,
    pub next_dissolve_ms: u64,
    /// Since when the head has stayed close to the target train's history.
    pub near_history_since_ms: Option<u64>,
}

impl Train {
    /// Head plus markers.
    pub fn length(&self) -> usize {
        1 + self.markers.len()
    }

    pub fn is_active(&self) -> bool {
        self.state == TrainState::Active
    }

    /// Rearmost link: the last marker, or the head when there are none.
    pub fn tail_position(&self, agents: &AgentTable) -> Option<Vec2> {
        match self.markers.last() {
            Some(marker) => Some(marker.pos),
            None => agents.get(self.head).filter(|a| a.is_alive()).map(|a| a.pos),
        }
    }
}

/// Render-facing marker data with the head-ward draw shift applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerDraw {
    pub train: TrainId,
    pub pos: Vec2,
    pub angle: f32,
}

/// Result of admitting a train-kind spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Joined(TrainId),
    Head { agent: AgentId, train: TrainId },
    /// Population cap reached and no train to join.
    Rejected,
}

/// Mutable world access for the train passes.
pub struct TrainWorld<'a> {
    pub agents: &'a mut AgentTable,
    pub index: &'a mut SpatialIndex,
    pub targets: &'a Targets,
    pub spawner: AgentSpawner<'a>,
    pub rng: &'a mut StdRng,
}

/// What the pre-pass changed, for messages and logging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainPassReport {
    /// Heads removed as agents because their train merged away.
    pub absorbed: Vec<AgentId>,
    pub promoted: Vec<AgentId>,
    pub merges: Vec<(TrainId, TrainId)>,
    pub destroyed: Vec<TrainId>,
}

#[derive(Resource, Debug, Default)]
pub struct TrainManager {
    trains: BTreeMap<TrainId, Train>,
    ids: IdAllocator,
}

impl TrainManager {
    pub fn len(&self) -> usize {
        self.trains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trains.is_empty()
    }

    pub fn get(&self, id: TrainId) -> Option<&Train> {
        self.trains.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Train> {
        self.trains.values()
    }

    pub fn train_of_head(&self, head: AgentId) -> Option<TrainId> {
        self.trains.values().find(|t| t.head == head).map(|t| t.id)
    }

    pub fn total_marker_count(&self) -> usize {
        self.trains.values().map(|t| t.markers.len()).sum()
    }

    pub fn tail_position(&self, id: TrainId, agents: &AgentTable) -> Option<Vec2> {
        self.trains.get(&id)?.tail_position(agents)
    }

    pub fn create_train_for_head(
        &mut self,
        head: AgentId,
        pos: Vec2,
        target: Option<TrainTarget>,
        now_ms: u64,
        tuning: &TrainConfig,
    ) -> TrainId {
        let id = TrainId(self.ids.next_raw());
        let train = Train {
            id,
            head,
            state: TrainState::Active,
            target,
            history: TrainHistory::new(pos, 0, tuning.sample_gap),
            markers: Vec::new(),
            next_dissolve_ms: now_ms,
            near_history_since_ms: None,
        };
        self.trains.insert(id, train);
        id
    }

    /// Append a marker at the tail. The history is back-filled toward `pos`
    /// so the new marker has samples to sit on.
    pub fn append_marker(&mut self, id: TrainId, pos: Vec2, tuning: &TrainConfig) -> bool {
        let Some(train) = self.trains.get_mut(&id) else {
            return false;
        };
        let angle = train
            .markers
            .last()
            .map_or(0.0, |m| (m.pos - pos).to_angle());
        train.markers.push(Marker { pos, angle });
        train.history.backfill(train.markers.len(), tuning.sample_gap, pos);
        true
    }

    /// Active train whose tail is within `join_radius` of `pos`; the
    /// nearest wins and ties go to the lower train id.
    pub fn find_joinable(&self, pos: Vec2, join_radius: f32, agents: &AgentTable) -> Option<TrainId> {
        let radius_sq = join_radius * join_radius;
        self.trains
            .values()
            .filter(|t| t.is_active() && agents.is_alive(t.head))
            .filter_map(|t| Some((t.id, t.tail_position(agents)?.distance_squared(pos))))
            .filter(|(_, d)| *d <= radius_sq)
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(id, _)| id)
    }

    /// Admit a train-kind spawn at `pos`: join a nearby tail or become a
    /// new head.
    pub fn admit(&mut self, pos: Vec2, world: &mut TrainWorld, now_ms: u64) -> Admission {
        let config = world.spawner.config;
        let tuning = &config.train;
        if let Some(id) = self.find_joinable(pos, tuning.join_radius, world.agents) {
            self.append_marker(id, pos, tuning);
            debug!("[TRAIN] spawn at {:?} joined {}", pos, id);
            return Admission::Joined(id);
        }
        if !world.spawner.has_room(world.agents) {
            return Admission::Rejected;
        }
        let agent = world
            .spawner
            .spawn(AgentKind::Train, pos, world.agents, world.index, world.rng);
        let train = self.create_train_for_head(agent, pos, None, now_ms, tuning);
        if let Some(head) = world.agents.get_mut(agent) {
            head.train = Some(train);
        }
        Admission::Head { agent, train }
    }

    /// Where a target currently is, and its contact radius.
    fn resolve_target(&self, target: TrainTarget, targets: &Targets, agents: &AgentTable) -> Option<(Vec2, f32)> {
        match target {
            TrainTarget::Party(id) => targets.get(id).map(|p| (p.pos, p.radius)),
            TrainTarget::Train(id) => {
                let train = self.trains.get(&id).filter(|t| t.is_active())?;
                Some((train.tail_position(agents)?, 0.0))
            }
        }
    }

    /// Party in sight first; otherwise the nearest active train in sight
    /// whose head id is lower than ours, so chases can never form a cycle.
    fn choose_target(&self, id: TrainId, head: AgentId, pos: Vec2, targets: &Targets, agents: &AgentTable, tuning: &TrainConfig) -> Option<TrainTarget> {
        if let Some(party) = targets.nearest_within(pos, tuning.sight_range) {
            return Some(TrainTarget::Party(party.id));
        }
        let range_sq = tuning.sight_range * tuning.sight_range;
        self.trains
            .values()
            .filter(|t| t.id != id && t.is_active() && t.head < head && agents.is_alive(t.head))
            .filter_map(|t| Some((t.id, t.tail_position(agents)?.distance_squared(pos))))
            .filter(|(_, d)| *d <= range_sq)
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(tid, _)| TrainTarget::Train(tid))
    }

    // ========================================================================
    // Pre-pass
    // ========================================================================

    /// Dissolve headless trains, promote one marker per dissolving train,
    /// resolve targets and perform merges. Runs before the dispatcher.
    pub fn pre_update(&mut self, world: &mut TrainWorld, now_ms: u64) -> TrainPassReport {
        let mut report = TrainPassReport::default();
        let config = world.spawner.config;
        let tuning = &config.train;
        let ids: Vec<TrainId> = self.trains.keys().copied().collect();

        for &id in &ids {
            let Some(train) = self.trains.get_mut(&id) else {
                continue;
            };
            if train.is_active() && !world.agents.is_alive(train.head) {
                train.state = TrainState::Dissolving;
                train.next_dissolve_ms = now_ms;
                train.near_history_since_ms = None;
                info!("[TRAIN] {} lost its head {}, dissolving {} markers", id, train.head, train.markers.len());
            }
        }

        for &id in &ids {
            self.dissolve_step(id, world, now_ms, tuning, &mut report);
        }

        for &id in &ids {
            self.retarget(id, world, now_ms, tuning);
        }

        for &id in &ids {
            self.try_merge(id, world, now_ms, tuning, &mut report);
        }

        report
    }

    fn dissolve_step(&mut self, id: TrainId, world: &mut TrainWorld, now_ms: u64, tuning: &TrainConfig, report: &mut TrainPassReport) {
        let Some(train) = self.trains.get_mut(&id) else {
            return;
        };
        if train.state != TrainState::Dissolving {
            return;
        }
        if train.markers.is_empty() {
            self.trains.remove(&id);
            report.destroyed.push(id);
            debug!("[TRAIN] {} dissolved completely", id);
            return;
        }
        if now_ms < train.next_dissolve_ms || !world.spawner.has_room(world.agents) {
            return;
        }

        let marker = train.markers.remove(0);
        let inherited = train.target;
        train.next_dissolve_ms = now_ms + tuning.dissolve_interval_ms;
        let now_empty = train.markers.is_empty();

        let agent = world
            .spawner
            .spawn(AgentKind::Train, marker.pos, world.agents, world.index, world.rng);
        let new_id = self.create_train_for_head(agent, marker.pos, inherited, now_ms, tuning);
        let resolved = inherited.and_then(|t| self.resolve_target(t, world.targets, world.agents));
        if let Some(head) = world.agents.get_mut(agent) {
            head.train = Some(new_id);
            if let Some(state) = head.behavior.train_head_mut() {
                state.target = resolved.map(|(pos, _)| pos);
                state.target_radius = resolved.map_or(0.0, |(_, r)| r);
            }
        }
        report.promoted.push(agent);
        debug!("[TRAIN] {} promoted a marker to {} heading {}", id, agent, new_id);

        if now_empty {
            self.trains.remove(&id);
            report.destroyed.push(id);
        }
    }

    fn retarget(&mut self, id: TrainId, world: &mut TrainWorld, now_ms: u64, tuning: &TrainConfig) {
        let Some(train) = self.trains.get(&id).filter(|t| t.is_active()) else {
            return;
        };
        let head_id = train.head;
        let Some(head_pos) = world.agents.get(head_id).map(|a| a.pos) else {
            return;
        };

        let chosen = self.choose_target(id, head_id, head_pos, world.targets, world.agents, tuning);
        let resolved = chosen.and_then(|t| self.resolve_target(t, world.targets, world.agents));

        // Dwell on the target train's history, used by the merge gate.
        let near_history = match chosen {
            Some(TrainTarget::Train(dst)) => self
                .trains
                .get(&dst)
                .and_then(|t| t.history.min_distance_sq(head_pos))
                .is_some_and(|d| d <= tuning.history_proximity * tuning.history_proximity),
            _ => false,
        };

        if let Some(train) = self.trains.get_mut(&id) {
            if train.target != chosen {
                train.near_history_since_ms = None;
            }
            train.target = chosen;
            train.near_history_since_ms = if near_history {
                Some(train.near_history_since_ms.unwrap_or(now_ms))
            } else {
                None
            };
        }

        if let Some(state) = world.agents.get_mut(head_id).and_then(|a| a.behavior.train_head_mut()) {
            state.target = resolved.map(|(pos, _)| pos);
            state.target_radius = resolved.map_or(0.0, |(_, r)| r);
        }
    }

    fn try_merge(&mut self, src: TrainId, world: &mut TrainWorld, now_ms: u64, tuning: &TrainConfig, report: &mut TrainPassReport) {
        let Some(train) = self.trains.get(&src).filter(|t| t.is_active()) else {
            return;
        };
        let Some(TrainTarget::Train(dst)) = train.target else {
            return;
        };
        let Some(since) = train.near_history_since_ms else {
            return;
        };
        if now_ms.saturating_sub(since) < tuning.merge_dwell_ms {
            return;
        }
        let Some(head_pos) = world.agents.get(train.head).filter(|a| a.is_alive()).map(|a| a.pos) else {
            return;
        };
        let Some(tail) = self.tail_position(dst, world.agents) else {
            return;
        };
        if head_pos.distance_squared(tail) > tuning.join_radius * tuning.join_radius {
            return;
        }
        if !self.trains.get(&dst).is_some_and(|t| t.is_active()) {
            return;
        }

        let Some(absorbed) = self.trains.remove(&src) else {
            return;
        };
        self.append_marker(dst, head_pos, tuning);
        for marker in &absorbed.markers {
            self.append_marker(dst, marker.pos, tuning);
        }
        world.agents.remove_now(absorbed.head);
        world.index.remove(absorbed.head);

        info!(
            "[TRAIN] {} merged into {} ({} links absorbed)",
            src,
            dst,
            absorbed.length()
        );
        report.absorbed.push(absorbed.head);
        report.merges.push((src, dst));
    }

    // ========================================================================
    // Post-pass
    // ========================================================================

    /// Sample head positions and re-place markers along the history.
    pub fn post_update(&mut self, agents: &AgentTable, tuning: &TrainConfig) {
        let gap = tuning.sample_gap.max(1);
        for train in self.trains.values_mut() {
            if !train.is_active() {
                continue;
            }
            let Some(head_pos) = agents.get(train.head).filter(|a| a.is_alive()).map(|a| a.pos) else {
                continue;
            };
            train.history.ensure_capacity(train.markers.len(), gap);
            train.history.record(head_pos, tuning.record_threshold);

            let frac = match train.history.newest() {
                Some(newest) => (history::manhattan(head_pos, newest) / tuning.record_threshold).min(1.0),
                None => 0.0,
            };
            let mut lead = head_pos;
            for (ordinal, marker) in train.markers.iter_mut().enumerate() {
                if let Some(pos) = train.history.marker_position(ordinal, gap, frac) {
                    marker.pos = pos;
                }
                let to_lead = lead - marker.pos;
                if to_lead.length_squared() > 1e-6 {
                    marker.angle = to_lead.to_angle();
                }
                lead = marker.pos;
            }
        }
    }

    // ========================================================================
    // Queries for rendering and damage
    // ========================================================================

    /// Marker positions pulled toward the head by a fraction of the head to
    /// first-marker offset, capped at the join radius, so links read as a
    /// tight chain.
    pub fn marker_draw_data(&self, agents: &AgentTable, tuning: &TrainConfig) -> Vec<MarkerDraw> {
        let mut out = Vec::with_capacity(self.total_marker_count());
        for train in self.trains.values() {
            let Some(first) = train.markers.first() else {
                continue;
            };
            let shift = match agents.get(train.head).filter(|a| a.is_alive()) {
                Some(head) => ((head.pos - first.pos) * tuning.draw_shift_alpha).clamp_length_max(tuning.join_radius),
                None => Vec2::ZERO,
            };
            out.extend(train.markers.iter().map(|m| MarkerDraw {
                train: train.id,
                pos: m.pos + shift,
                angle: m.angle,
            }));
        }
        out
    }

    /// Remove every marker overlapping the circle. Returns how many went.
    pub fn pop_markers_colliding_circle(&mut self, center: Vec2, radius: f32) -> usize {
        let radius_sq = radius * radius;
        let mut removed = 0;
        for train in self.trains.values_mut() {
            let before = train.markers.len();
            train.markers.retain(|m| m.pos.distance_squared(center) > radius_sq);
            removed += before - train.markers.len();
        }
        removed
    }
}
