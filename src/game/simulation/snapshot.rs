use bevy::prelude::*;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::hash::Hasher;
use std::io::{BufReader, BufWriter};

use crate::game::train::TrainManager;
use crate::game::types::{AgentId, AgentKind};

use super::resources::{AgentTable, SimTick};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AgentRecord {
    pub id: AgentId,
    /// `f32::to_bits` of x and y, so equality is exact.
    pub pos_bits: (u32, u32),
    pub facing_bin: u8,
    pub kind: AgentKind,
}

/// Everything two runs with the same seed must agree on.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct WorldSnapshot {
    pub version: u32,
    pub tick: u64,
    pub agents: Vec<AgentRecord>,
    /// Marker positions as bits, per train in id order, head side first.
    pub markers: Vec<(u32, u32)>,
}

fn bits(v: Vec2) -> (u32, u32) {
    (v.x.to_bits(), v.y.to_bits())
}

impl WorldSnapshot {
    pub fn capture(tick: SimTick, agents: &AgentTable, trains: &TrainManager) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            tick: tick.0,
            agents: agents
                .iter_alive()
                .map(|a| AgentRecord { id: a.id, pos_bits: bits(a.pos), facing_bin: a.facing_bin, kind: a.kind() })
                .collect(),
            markers: trains.iter().flat_map(|t| t.markers.iter().map(|m| bits(m.pos))).collect(),
        }
    }

    pub fn fingerprint(&self) -> Result<u64, bincode::Error> {
        let bytes = bincode::serialize(self)?;
        let mut hasher = FxHasher::default();
        hasher.write(&bytes);
        Ok(hasher.finish())
    }
}

pub fn save_snapshot(path: &str, snapshot: &WorldSnapshot) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let mut encoder = ZlibEncoder::new(writer, Compression::default());
    bincode::serialize_into(&mut encoder, snapshot)?;
    encoder.finish()?;
    Ok(())
}

pub fn load_snapshot(path: &str) -> Result<WorldSnapshot, Box<dyn std::error::Error>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut decoder = ZlibDecoder::new(reader);
    let snapshot: WorldSnapshot = bincode::deserialize_from(&mut decoder)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(format!("snapshot version {} (expected {})", snapshot.version, SNAPSHOT_VERSION).into());
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::simulation::spawn::AgentSpawner;
    use crate::game::simulation::{SimClock, SimConfig};
    use crate::game::spatial_index::SpatialIndex;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_world(seed: u64) -> (AgentTable, TrainManager) {
        let config = SimConfig::default();
        let spawner = AgentSpawner::new(&config, SimClock::default());
        let mut agents = AgentTable::default();
        let mut index = SpatialIndex::new(config.spatial_cell_size);
        let mut rng = StdRng::seed_from_u64(seed);
        for i in 0..6 {
            spawner.spawn(AgentKind::Normal, Vec2::new(50.0 + i as f32 * 20.0, 80.0), &mut agents, &mut index, &mut rng);
        }
        (agents, TrainManager::default())
    }

    #[test]
    fn test_fingerprint_tracks_state() {
        let (agents, trains) = sample_world(4);
        let a = WorldSnapshot::capture(SimTick(10), &agents, &trains);
        let b = WorldSnapshot::capture(SimTick(10), &agents, &trains);
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());

        let (mut moved, _) = sample_world(4);
        let id = moved.ids()[0];
        moved.get_mut(id).unwrap().pos.x += 0.001;
        let c = WorldSnapshot::capture(SimTick(10), &moved, &trains);
        assert_ne!(a.fingerprint().unwrap(), c.fingerprint().unwrap());
    }

    #[test]
    fn test_save_and_load() {
        let (agents, trains) = sample_world(8);
        let snapshot = WorldSnapshot::capture(SimTick(3), &agents, &trains);
        let path = std::env::temp_dir().join(format!("pursuit_snapshot_{}.bin", std::process::id()));
        let path = path.to_string_lossy().to_string();

        save_snapshot(&path, &snapshot).unwrap();
        let loaded = load_snapshot(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, snapshot);
    }
}
