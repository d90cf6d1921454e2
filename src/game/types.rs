use serde::{Deserialize, Serialize};

/// Stable identity of a simulated agent.
///
/// Ids are handed out in increasing order and never reused, so ordering by
/// id is ordering by creation. Iteration, tie-breaks and train precedence
/// all rely on that.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u32);

/// Identity of a convoy record owned by the train manager.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrainId(pub u32);

/// Behavior family of an agent, as seen by spawning, rendering and bucketing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    Normal,
    Tracker,
    WallHugger,
    Train,
    SpacingSeeker,
    PursuitDog,
}

impl AgentKind {
    pub const ALL: [AgentKind; 6] = [
        AgentKind::Normal,
        AgentKind::Tracker,
        AgentKind::WallHugger,
        AgentKind::Train,
        AgentKind::SpacingSeeker,
        AgentKind::PursuitDog,
    ];
}

/// Monotonic id allocator.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdAllocator {
    pub fn next_raw(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn peek(&self) -> u32 {
        self.next
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

impl std::fmt::Display for TrainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "train#{}", self.0)
    }
}
