use super::*;
use crate::game::scent::tracker::ScentTarget;
use crate::game::simulation::spawn::AgentSpawner;
use crate::game::simulation::{SimClock, SimConfig};
use crate::game::spatial_index::SpatialIndex;
use rand::SeedableRng;

fn crowd(agents: &mut AgentTable, config: &SimConfig, rng: &mut StdRng, pos: Vec2, step: Vec2, count: usize) -> Vec<AgentId> {
    let spawner = AgentSpawner::new(config, SimClock::default());
    let mut index = SpatialIndex::new(config.spatial_cell_size);
    (0..count)
        .map(|i| {
            let id = spawner.spawn(AgentKind::Tracker, pos + Vec2::splat(i as f32 * 0.5), agents, &mut index, rng);
            agents.get_mut(id).unwrap().last_move = step;
            id
        })
        .collect()
}

fn forced_ids(agents: &AgentTable) -> Vec<AgentId> {
    agents
        .iter()
        .filter(|a| a.behavior.tracker_scent().is_some_and(|s| s.force_wander))
        .map(|a| a.id)
        .collect()
}

#[test]
fn test_crowded_bucket_drops_below_threshold() {
    let config = SimConfig::default();
    let mut rng = StdRng::seed_from_u64(3);
    let mut agents = AgentTable::default();
    crowd(&mut agents, &config, &mut rng, Vec2::new(40.0, 40.0), Vec2::X, 5);

    let mut controller = CongestionController::default();
    let forced = controller.run(15, &mut agents, &config.congestion, 1000, &mut rng);

    assert_eq!(forced, 5 - config.congestion.threshold + 1);
    assert_eq!(forced_ids(&agents).len(), forced);
    assert_eq!(controller.crowded_buckets, 1);
    assert_eq!(controller.last_run_tick, Some(15));

    // Survivors of the cut no longer form a crowd.
    let remaining = CongestionController::bucket_members(&agents, config.congestion.cell_size);
    assert!(remaining.values().all(|m| m.len() < config.congestion.threshold));
}

#[test]
fn test_opposite_headings_do_not_share_a_bucket() {
    let config = SimConfig::default();
    let mut rng = StdRng::seed_from_u64(3);
    let mut agents = AgentTable::default();
    crowd(&mut agents, &config, &mut rng, Vec2::new(40.0, 40.0), Vec2::X, 2);
    crowd(&mut agents, &config, &mut rng, Vec2::new(40.0, 40.0), -Vec2::X, 2);

    let forced = CongestionController::default().run(0, &mut agents, &config.congestion, 0, &mut rng);
    assert_eq!(forced, 0);
}

#[test]
fn test_stationary_trackers_are_ignored() {
    let config = SimConfig::default();
    let mut rng = StdRng::seed_from_u64(3);
    let mut agents = AgentTable::default();
    crowd(&mut agents, &config, &mut rng, Vec2::new(40.0, 40.0), Vec2::ZERO, 6);

    let buckets = CongestionController::bucket_members(&agents, config.congestion.cell_size);
    assert!(buckets.is_empty());
}

#[test]
fn test_forced_tracker_drops_target_and_moves_boundary() {
    let config = SimConfig::default();
    let mut rng = StdRng::seed_from_u64(9);
    let mut agents = AgentTable::default();
    let ids = crowd(&mut agents, &config, &mut rng, Vec2::new(40.0, 40.0), Vec2::Y, 3);
    for id in &ids {
        let scent = agents.get_mut(*id).unwrap().behavior.tracker_scent_mut().unwrap();
        scent.target = Some(ScentTarget { footprint: 4, pos: Vec2::new(40.0, 90.0), time_ms: 2500 });
    }

    CongestionController::default().run(0, &mut agents, &config.congestion, 4000, &mut rng);

    let forced = forced_ids(&agents);
    assert_eq!(forced.len(), 1);
    let scent = agents.get(forced[0]).unwrap().behavior.tracker_scent().unwrap();
    assert!(scent.target.is_none());
    assert_eq!(scent.ignore_until_ms, Some(2500));
}

#[test]
fn test_flags_are_recomputed_each_run() {
    let config = SimConfig::default();
    let mut rng = StdRng::seed_from_u64(5);
    let mut agents = AgentTable::default();
    let ids = crowd(&mut agents, &config, &mut rng, Vec2::new(40.0, 40.0), Vec2::X, 4);

    let mut controller = CongestionController::default();
    assert!(controller.run(0, &mut agents, &config.congestion, 0, &mut rng) > 0);

    for id in &ids {
        agents.get_mut(*id).unwrap().last_move = Vec2::ZERO;
    }
    assert_eq!(controller.run(15, &mut agents, &config.congestion, 250, &mut rng), 0);
    assert!(forced_ids(&agents).is_empty());
}

#[test]
fn test_second_run_recounts_previously_forced_trackers() {
    let config = SimConfig::default();
    let threshold = config.congestion.threshold;
    let mut rng = StdRng::seed_from_u64(21);
    let mut agents = AgentTable::default();
    let count = threshold + 3;
    crowd(&mut agents, &config, &mut rng, Vec2::new(40.0, 40.0), Vec2::X, count);

    let mut controller = CongestionController::default();
    for tick in [0, config.congestion.cadence_ticks] {
        let forced = controller.run(tick, &mut agents, &config.congestion, 500, &mut rng);
        assert_eq!(forced, count - threshold + 1, "tick {}", tick);
        assert_eq!(forced_ids(&agents).len(), forced);

        let buckets = CongestionController::bucket_members(&agents, config.congestion.cell_size);
        for (key, members) in &buckets {
            assert!(members.len() < threshold, "tick {}: bucket {:?} holds {}", tick, key, members.len());
        }
    }
}

#[test]
fn test_cadence() {
    let config = SimConfig::default();
    let controller = CongestionController::default();
    assert!(controller.is_due(0, &config.congestion));
    assert!(!controller.is_due(1, &config.congestion));
    assert!(controller.is_due(config.congestion.cadence_ticks * 3, &config.congestion));
}
