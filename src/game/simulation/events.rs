//! Messages crossing the simulation boundary.
//!
//! Inputs are written by the game layer and drained in `SimSet::Input`.
//! Outputs are written during the tick for terrain, HUD and audio
//! collaborators to read.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::game::types::{AgentId, AgentKind};

// ============================================================================
// Inputs
// ============================================================================

/// Spawn an agent of `kind`, or the spawn table's pick when `None`.
#[derive(Event, Message, Debug, Clone)]
pub struct SpawnAgent {
    pub kind: Option<AgentKind>,
    pub pos: Vec2,
}

/// External damage to one agent.
#[derive(Event, Message, Debug, Clone)]
pub struct DamageAgent {
    pub agent: AgentId,
    pub amount: i32,
}

/// External damage to train markers inside a circle.
#[derive(Event, Message, Debug, Clone)]
pub struct StrikeMarkers {
    pub center: Vec2,
    pub radius: f32,
}

// ============================================================================
// Outputs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemovalReason {
    Decay,
    Damage,
    OutOfBounds,
    /// Folded into another train as a marker.
    Absorbed,
}

/// An agent pressed against a damageable wall cell this tick.
#[derive(Event, Message, Debug, Clone, PartialEq)]
pub struct WallContact {
    pub agent: AgentId,
    pub cell: IVec2,
}

#[derive(Event, Message, Debug, Clone, PartialEq)]
pub struct AgentRemoved {
    pub agent: AgentId,
    pub kind: AgentKind,
    pub reason: RemovalReason,
}

#[derive(Event, Message, Debug, Clone, PartialEq)]
pub struct AgentDamaged {
    pub agent: AgentId,
    pub amount: i32,
}

#[derive(Event, Message, Debug, Clone, PartialEq)]
pub struct MarkersStruck {
    pub count: usize,
}
