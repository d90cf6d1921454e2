use bevy::prelude::*;
use pursuit::game::config::InitialConfig;
use pursuit::game::scent::ScentTrail;
use pursuit::game::simulation::{AgentTable, SpawnAgent, TrackedParty, Targets};
use pursuit::game::types::AgentKind;
use pursuit::game::GamePlugin;

const TRAIL: [(f32, u64); 5] = [(130.0, 100), (160.0, 200), (190.0, 300), (220.0, 400), (250.0, 500)];

fn build_app() -> App {
    let mut config = InitialConfig::default();
    config.seed = 3;
    config.agent.decay_frames = 0.0;

    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.insert_resource(config);
    app.add_plugins(GamePlugin);
    app.update();

    // The party drives away: out of sight and laying no scent of its own
    app.world_mut().insert_resource(Targets {
        parties: vec![TrackedParty {
            id: 1,
            pos: Vec2::new(900.0, 700.0),
            radius: 8.0,
            in_vehicle: true,
            visible: true,
        }],
    });

    let mut trail = ScentTrail::new(24.0, 300, 10_000_000);
    for (x, time_ms) in TRAIL {
        trail.record(Vec2::new(x, 100.0), time_ms, true);
    }
    app.world_mut().insert_resource(trail);
    app
}

#[test]
fn test_tracker_walks_the_trail_forward() {
    let mut app = build_app();
    app.world_mut().write_message(SpawnAgent { kind: Some(AgentKind::Tracker), pos: Vec2::new(100.0, 100.0) });

    let end = Vec2::new(250.0, 100.0);
    let mut last_time = 0;
    let mut closest = f32::MAX;
    let mut final_time = None;

    for _ in 0..300 {
        app.world_mut().run_schedule(FixedUpdate);

        let agents = app.world().resource::<AgentTable>();
        let tracker = agents
            .iter_alive()
            .find(|a| a.kind() == AgentKind::Tracker)
            .expect("tracker spawned");
        let scent = tracker.behavior.tracker_scent().expect("tracker memory");

        if let Some(target) = scent.target {
            assert!(target.time_ms >= last_time, "target went back in time: {} < {}", target.time_ms, last_time);
            last_time = target.time_ms;
            final_time = Some(target.time_ms);
        }
        closest = closest.min(tracker.pos.distance(end));
    }

    assert_eq!(final_time, Some(500), "tracker should end on the newest footprint");
    assert!(closest < 2.0, "tracker never reached the end of the trail (closest {})", closest);
}

#[test]
fn test_no_footprints_from_a_vehicle() {
    let mut app = build_app();
    for _ in 0..60 {
        app.world_mut().run_schedule(FixedUpdate);
    }
    assert_eq!(app.world().resource::<ScentTrail>().len(), TRAIL.len());
}
