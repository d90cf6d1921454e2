//! Per-agent state owned by the agent table.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::game::behavior::{Behavior, Body};
use crate::game::math::facing_bin;
use crate::game::types::{AgentId, AgentKind, TrainId};

use super::events::RemovalReason;

// ============================================================================
// Vitals
// ============================================================================

/// Durability plus time decay.
///
/// Decay accrues `max / decay_frames` per tick in a fractional carry and is
/// paid out in whole durability points, so slow decay rates still land
/// exactly on schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct Vitals {
    pub durability: i32,
    pub max_durability: i32,
    pub decay_carry: f32,
    /// Ticks for a full bar to drain. Zero disables decay.
    pub decay_frames: f32,
    pub min_speed_ratio: f32,
}

impl Vitals {
    pub fn new(max_durability: i32, decay_frames: f32, min_speed_ratio: f32) -> Self {
        Self {
            durability: max_durability,
            max_durability,
            decay_carry: 0.0,
            decay_frames,
            min_speed_ratio,
        }
    }

    pub fn is_depleted(&self) -> bool {
        self.durability <= 0
    }

    pub fn ratio(&self) -> f32 {
        if self.max_durability <= 0 {
            return 0.0;
        }
        (self.durability as f32 / self.max_durability as f32).clamp(0.0, 1.0)
    }

    /// Speed multiplier for the current durability.
    pub fn speed_ratio(&self) -> f32 {
        self.min_speed_ratio + (1.0 - self.min_speed_ratio) * self.ratio()
    }

    /// Advance decay by one tick.
    pub fn decay(&mut self) {
        if self.decay_frames <= 0.0 {
            return;
        }
        self.decay_carry += self.max_durability as f32 / self.decay_frames;
        if self.decay_carry >= 1.0 {
            let whole = self.decay_carry.floor();
            self.decay_carry -= whole;
            self.durability -= whole as i32;
        }
    }

    pub fn damage(&mut self, amount: i32) {
        self.durability -= amount.max(0);
    }
}

// ============================================================================
// Agent
// ============================================================================

/// A simulated pursuer. Train followers are markers, not agents.
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub pos: Vec2,
    pub radius: f32,
    pub initial_speed: f32,
    /// Current speed after decay.
    pub speed: f32,
    pub facing_bin: u8,
    pub last_move: Vec2,
    pub vitals: Vitals,
    pub behavior: Behavior,
    /// Train this agent heads, if any.
    pub train: Option<TrainId>,
    pub spawned_tick: u64,
    /// Set when the agent is tombstoned; swept at tick end.
    pub removal: Option<RemovalReason>,
}

/// Render-facing view of one agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentView {
    pub id: AgentId,
    pub pos: Vec2,
    pub facing_bin: u8,
    pub kind: AgentKind,
}

impl Agent {
    pub fn kind(&self) -> AgentKind {
        self.behavior.kind()
    }

    pub fn is_alive(&self) -> bool {
        self.removal.is_none()
    }

    pub fn speed_ratio(&self) -> f32 {
        if self.initial_speed > 0.0 {
            self.speed / self.initial_speed
        } else {
            0.0
        }
    }

    pub fn body(&self) -> Body {
        Body {
            id: self.id,
            pos: self.pos,
            radius: self.radius,
            speed: self.speed,
            speed_ratio: self.speed_ratio(),
            last_move: self.last_move,
        }
    }

    /// Run one tick of decay and rescale speed. Returns false once depleted.
    pub fn apply_decay(&mut self) -> bool {
        self.vitals.decay();
        self.speed = self.initial_speed * self.vitals.speed_ratio();
        !self.vitals.is_depleted()
    }

    /// Returns true when the hit depleted the agent.
    pub fn apply_damage(&mut self, amount: i32) -> bool {
        self.vitals.damage(amount);
        self.speed = self.initial_speed * self.vitals.speed_ratio();
        self.vitals.is_depleted()
    }

    /// Commit a movement step and refresh facing. A negligible step keeps
    /// the previous facing.
    pub fn commit_move(&mut self, new_pos: Vec2) {
        let step = new_pos - self.pos;
        if let Some(bin) = facing_bin(step) {
            self.facing_bin = bin;
        }
        self.last_move = step;
        self.pos = new_pos;
    }

    pub fn view(&self) -> AgentView {
        AgentView {
            id: self.id,
            pos: self.pos,
            facing_bin: self.facing_bin,
            kind: self.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_pays_out_whole_points() {
        let mut vitals = Vitals::new(100, 400.0, 0.5);
        for _ in 0..4 {
            vitals.decay();
        }
        assert_eq!(vitals.durability, 99);
        assert!(vitals.decay_carry.abs() < 1e-4);
    }

    #[test]
    fn test_speed_ratio_interpolates_to_floor() {
        let mut vitals = Vitals::new(100, 0.0, 0.4);
        assert!((vitals.speed_ratio() - 1.0).abs() < 1e-6);
        vitals.damage(50);
        assert!((vitals.speed_ratio() - 0.7).abs() < 1e-6);
        vitals.damage(500);
        assert!((vitals.speed_ratio() - 0.4).abs() < 1e-6);
        assert!(vitals.is_depleted());
    }

    #[test]
    fn test_zero_decay_frames_never_decays() {
        let mut vitals = Vitals::new(10, 0.0, 0.5);
        for _ in 0..1000 {
            vitals.decay();
        }
        assert_eq!(vitals.durability, 10);
    }
}
