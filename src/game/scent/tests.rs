use super::tracker::{ScanContext, ScanOutcome, ScentTarget, TrackerScent};
use super::*;
use crate::game::config::TrackerConfig;
use crate::game::terrain::GridTerrain;

fn open_terrain() -> GridTerrain {
    GridTerrain::open(20, 20, 32.0)
}

fn ctx<'a>(
    origin: Vec2,
    now_ms: u64,
    trail: &'a ScentTrail,
    terrain: &'a GridTerrain,
    tuning: &'a TrackerConfig,
) -> ScanContext<'a> {
    ScanContext { origin, tick: 0, now_ms, trail, terrain, tuning }
}

fn locked_on(fp: &Footprint, now_ms: u64) -> TrackerScent {
    TrackerScent {
        target: Some(ScentTarget::from(fp)),
        last_progress_ms: Some(now_ms),
        ..default()
    }
}

// ============================================================================
// Trail
// ============================================================================

#[test]
fn test_record_keeps_time_order_and_cap() {
    let mut trail = ScentTrail::new(10.0, 3, 10_000);
    for i in 0..5u64 {
        trail.record(Vec2::new(i as f32 * 20.0, 0.0), 100 * i, true);
    }
    assert_eq!(trail.len(), 3);
    let times: Vec<u64> = trail.iter().map(|fp| fp.time_ms).collect();
    assert_eq!(times, vec![200, 300, 400]);
}

#[test]
fn test_record_step_skips_short_moves() {
    let mut trail = ScentTrail::new(24.0, 100, 10_000);
    assert!(trail.record_step(Vec2::ZERO, 0, true).is_some());
    assert!(trail.record_step(Vec2::new(10.0, 0.0), 16, true).is_none());
    assert!(trail.record_step(Vec2::new(24.0, 0.0), 33, false).is_some());
    assert_eq!(trail.len(), 2);
    assert!(!trail.newest().unwrap().visible);
}

#[test]
fn test_query_filters_radius_and_time() {
    let mut trail = ScentTrail::new(1.0, 100, 10_000);
    trail.record(Vec2::new(0.0, 0.0), 100, true);
    trail.record(Vec2::new(10.0, 0.0), 200, true);
    trail.record(Vec2::new(50.0, 0.0), 300, true);
    trail.record(Vec2::new(5.0, 0.0), 400, true);

    let newest = trail.query(Vec2::ZERO, 20.0, Some(100), ScentOrder::NewestFirst);
    let times: Vec<u64> = newest.iter().map(|fp| fp.time_ms).collect();
    assert_eq!(times, vec![400, 200]);

    let nearest = trail.query(Vec2::ZERO, 20.0, None, ScentOrder::NearestFirst);
    let times: Vec<u64> = nearest.iter().map(|fp| fp.time_ms).collect();
    assert_eq!(times, vec![100, 400, 200]);
}

#[test]
fn test_prune_drops_expired_only() {
    let mut trail = ScentTrail::new(1.0, 100, 1_000);
    trail.record(Vec2::ZERO, 0, true);
    trail.record(Vec2::X, 500, true);
    trail.record(Vec2::Y, 1_500, true);

    assert_eq!(trail.prune(900), 0);
    assert_eq!(trail.prune(1_600), 2);
    assert_eq!(trail.newest().map(|fp| fp.time_ms), Some(1_500));
}

// ============================================================================
// Tracker target selection
// ============================================================================

#[test]
fn test_tracker_walks_trail_forward() {
    let tuning = TrackerConfig::default();
    let terrain = open_terrain();
    let mut trail = ScentTrail::new(24.0, 300, 135_000);
    let xs = [40.0, 80.0, 120.0, 160.0, 200.0];
    for (i, x) in xs.iter().enumerate() {
        trail.record(Vec2::new(*x, 16.0), 1_000 + 200 * i as u64, true);
    }
    let first = *trail.iter().next().unwrap();

    let mut pos = Vec2::new(0.0, 16.0);
    let mut state = locked_on(&first, 2_000);
    let mut seen = vec![];

    for tick in 0..200u64 {
        if tick % tuning.scan_interval_ticks == 0 {
            let now = 2_000 + tick * 1_000 / 60;
            let outcome = state.scan_now(&ctx(pos, now, &trail, &terrain, &tuning));
            assert_ne!(outcome, ScanOutcome::Lost);
            if outcome == ScanOutcome::Retargeted {
                seen.push(state.target.unwrap().time_ms);
            }
        }
        let target = state.target.unwrap().pos;
        let step = (target - pos).clamp_length_max(2.0);
        pos += step;
    }

    assert_eq!(seen, vec![1_200, 1_400, 1_600, 1_800]);
    assert!(pos.distance(Vec2::new(200.0, 16.0)) < 1.0);
}

#[test]
fn test_much_newer_footprint_wins_outright() {
    let tuning = TrackerConfig::default();
    let terrain = open_terrain();
    let mut trail = ScentTrail::new(24.0, 300, 135_000);
    trail.record(Vec2::new(40.0, 16.0), 1_000, true);
    trail.record(Vec2::new(70.0, 16.0), 1_100, true);
    trail.record(Vec2::new(100.0, 16.0), 2_500, true);
    let first = *trail.iter().next().unwrap();

    let mut state = locked_on(&first, 3_000);
    let outcome = state.scan_now(&ctx(Vec2::new(20.0, 16.0), 3_000, &trail, &terrain, &tuning));

    assert_eq!(outcome, ScanOutcome::Retargeted);
    assert_eq!(state.target.unwrap().time_ms, 2_500);
}

#[test]
fn test_blocked_candidates_are_skipped() {
    let tuning = TrackerConfig::default();
    let terrain = GridTerrain::open(10, 3, 32.0).with_wall(IVec2::new(2, 0));
    let mut trail = ScentTrail::new(24.0, 300, 135_000);
    trail.record(Vec2::new(48.0, 16.0), 900, true);
    trail.record(Vec2::new(112.0, 16.0), 1_000, true);

    let mut state = TrackerScent::default();
    let outcome = state.scan_now(&ctx(Vec2::new(16.0, 16.0), 1_000, &trail, &terrain, &tuning));

    assert_eq!(outcome, ScanOutcome::Retargeted);
    assert_eq!(state.target.unwrap().time_ms, 900);
}

#[test]
fn test_only_top_k_candidates_are_tested() {
    let terrain = GridTerrain::open(10, 3, 32.0).with_wall(IVec2::new(2, 0));
    let mut trail = ScentTrail::new(24.0, 300, 135_000);
    trail.record(Vec2::new(48.0, 16.0), 100, true);
    trail.record(Vec2::new(112.0, 16.0), 200, true);
    trail.record(Vec2::new(120.0, 16.0), 300, true);
    let origin = Vec2::new(16.0, 16.0);

    let narrow = TrackerConfig { top_k: 2, ..default() };
    let mut state = TrackerScent::default();
    let outcome = state.scan_now(&ctx(origin, 400, &trail, &terrain, &narrow));
    assert_eq!(outcome, ScanOutcome::Unchanged);
    assert!(state.target.is_none());

    let wide = TrackerConfig { top_k: 3, ..default() };
    state.scan_now(&ctx(origin, 400, &trail, &terrain, &wide));
    assert_eq!(state.target.map(|t| t.time_ms), Some(100));
}

#[test]
fn test_scan_is_throttled_and_staggered() {
    let tuning = TrackerConfig::default();
    let terrain = open_terrain();
    let mut trail = ScentTrail::new(24.0, 300, 135_000);
    trail.record(Vec2::new(60.0, 16.0), 100, true);

    let mut state = TrackerScent::new(0, 7);
    let mut scan_at = |tick: u64, state: &mut TrackerScent| {
        let c = ScanContext { tick, ..ctx(Vec2::new(16.0, 16.0), 200, &trail, &terrain, &tuning) };
        state.scan(&c)
    };
    assert_eq!(scan_at(0, &mut state), ScanOutcome::Throttled);
    assert_eq!(scan_at(7, &mut state), ScanOutcome::Retargeted);
    assert_eq!(scan_at(8, &mut state), ScanOutcome::Throttled);
    assert_eq!(state.next_scan_tick, 7 + tuning.scan_interval_ticks);
}

#[test]
fn test_loss_moves_ignore_boundary_past_target() {
    let tuning = TrackerConfig { lost_timeout_ms: 1_000, ..default() };
    let terrain = open_terrain();
    let mut trail = ScentTrail::new(24.0, 300, 135_000);
    trail.record(Vec2::new(40.0, 16.0), 500, true);
    trail.record(Vec2::new(120.0, 16.0), 1_000, true);
    let target = *trail.newest().unwrap();

    let mut state = TrackerScent { target: Some(ScentTarget::from(&target)), ..default() };
    let origin = Vec2::new(16.0, 16.0);
    assert_eq!(state.scan_now(&ctx(origin, 2_000, &trail, &terrain, &tuning)), ScanOutcome::Unchanged);
    assert_eq!(state.scan_now(&ctx(origin, 3_000, &trail, &terrain, &tuning)), ScanOutcome::Lost);
    assert_eq!(state.ignore_until_ms, Some(1_000));
    assert!(state.target.is_none());

    // Nothing newer than the boundary: stays unlocked.
    assert_eq!(state.scan_now(&ctx(origin, 3_100, &trail, &terrain, &tuning)), ScanOutcome::Unchanged);
    assert!(state.target.is_none());

    trail.record(Vec2::new(80.0, 16.0), 3_200, true);
    assert_eq!(state.scan_now(&ctx(origin, 3_300, &trail, &terrain, &tuning)), ScanOutcome::Retargeted);
    assert_eq!(state.target.map(|t| t.time_ms), Some(3_200));
}

#[test]
fn test_abandon_without_target_uses_fallback() {
    let mut state = TrackerScent { ignore_until_ms: Some(400), ..default() };
    state.abandon(Some(900));
    assert_eq!(state.ignore_until_ms, Some(900));
    state.abandon(Some(100));
    assert_eq!(state.ignore_until_ms, Some(900));
}

#[test]
fn test_target_times_never_go_backwards() {
    let tuning = TrackerConfig { lost_timeout_ms: 800, ..default() };
    let terrain = GridTerrain::open(20, 20, 32.0)
        .with_wall(IVec2::new(5, 5))
        .with_wall(IVec2::new(6, 5))
        .with_wall(IVec2::new(10, 12));
    let mut rng = fastrand::Rng::with_seed(11);
    let mut trail = ScentTrail::new(24.0, 200, 20_000);

    for seed in 0..8 {
        let mut state = TrackerScent::default();
        let mut pos = Vec2::new(rng.f32() * 600.0, rng.f32() * 600.0);
        let mut party = Vec2::new(rng.f32() * 600.0, rng.f32() * 600.0);
        let mut last_time: Option<u64> = None;

        for step in 0..400u64 {
            let now = seed * 100_000 + step * 50;
            party += Vec2::new(rng.f32() - 0.5, rng.f32() - 0.5) * 30.0;
            party = party.clamp(Vec2::ZERO, Vec2::splat(639.0));
            trail.record_step(party, now, true);
            trail.prune(now);

            if rng.u8(0..10) == 0 {
                state.abandon(Some(now.saturating_sub(200)));
            }
            state.scan_now(&ctx(pos, now, &trail, &terrain, &tuning));
            if let Some(target) = state.target {
                if let Some(prev) = last_time {
                    assert!(target.time_ms >= prev, "target went from {} back to {}", prev, target.time_ms);
                }
                last_time = Some(target.time_ms);
                pos += (target.pos - pos).clamp_length_max(12.0);
            }
        }
    }
}
