use bevy::prelude::*;
use pursuit::game::config::InitialConfig;
use pursuit::game::congestion::CongestionController;
use pursuit::game::scent::ScentTrail;
use pursuit::game::simulation::{AgentTable, SimConfig, SimTick, SpawnAgent, TrackedParty, Targets};
use pursuit::game::types::AgentKind;
use pursuit::game::GamePlugin;

fn build_app() -> App {
    let mut config = InitialConfig::default();
    config.seed = 11;
    config.agent.decay_frames = 0.0;
    config.agent.speed_jitter = 0.0;
    config.agent.separation_distance = 0.0;
    config.tracker.scan_interval_ticks = 1;

    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.insert_resource(config);
    app.add_plugins(GamePlugin);
    app.update();

    app.world_mut().insert_resource(Targets {
        parties: vec![TrackedParty {
            id: 1,
            pos: Vec2::new(1000.0, 800.0),
            radius: 8.0,
            in_vehicle: true,
            visible: true,
        }],
    });

    let mut trail = ScentTrail::new(24.0, 300, 10_000_000);
    for (i, x) in [130.0, 160.0, 190.0, 220.0, 250.0].into_iter().enumerate() {
        trail.record(Vec2::new(x, 100.0), 10_000 * (i as u64 + 1), true);
    }
    app.world_mut().insert_resource(trail);

    for i in 0..12 {
        let pos = Vec2::new(100.0 + i as f32 * 0.5, 100.0);
        app.world_mut().write_message(SpawnAgent { kind: Some(AgentKind::Tracker), pos });
    }
    app
}

#[test]
fn test_buckets_stay_under_threshold_after_each_pass() {
    let mut app = build_app();
    let (cadence, threshold, cell_size) = {
        let config = app.world().resource::<SimConfig>();
        (config.congestion.cadence_ticks, config.congestion.threshold, config.congestion.cell_size)
    };

    let mut ever_forced = 0;
    for _ in 0..240 {
        app.world_mut().run_schedule(FixedUpdate);
        let tick = app.world().resource::<SimTick>().0;
        if tick % cadence != 0 {
            continue;
        }

        let agents = app.world().resource::<AgentTable>();
        for (key, members) in CongestionController::bucket_members(agents, cell_size) {
            assert!(
                members.len() < threshold,
                "tick {}: bucket {:?} still holds {} trackers",
                tick,
                key,
                members.len()
            );
        }

        let controller = app.world().resource::<CongestionController>();
        assert_eq!(controller.last_run_tick, Some(tick));
        ever_forced += controller.forced;
    }

    assert!(ever_forced > 0, "a stacked crowd should have been broken up");
}

#[test]
fn test_forced_trackers_drop_their_target() {
    let mut app = build_app();
    let cadence = app.world().resource::<SimConfig>().congestion.cadence_ticks;
    for _ in 0..cadence {
        app.world_mut().run_schedule(FixedUpdate);
    }

    let agents = app.world().resource::<AgentTable>();
    let forced: Vec<_> = agents
        .iter_alive()
        .filter_map(|a| a.behavior.tracker_scent())
        .filter(|s| s.force_wander)
        .collect();
    assert!(!forced.is_empty());
    for scent in forced {
        assert!(scent.target.is_none());
        assert!(scent.ignore_until_ms.is_some());
    }
}
