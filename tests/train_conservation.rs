use bevy::prelude::*;
use pursuit::game::config::{InitialConfig, SpawnRatios};
use pursuit::game::simulation::{
    AgentRemoved, AgentTable, DamageAgent, MarkersStruck, RemovalReason, SimSet, SpawnAgent, StrikeMarkers, Targets,
};
use pursuit::game::train::TrainManager;
use pursuit::game::types::AgentKind;
use pursuit::game::GamePlugin;

/// Train-kind agents that left the world for good.
#[derive(Resource, Default, Debug)]
struct Losses {
    removed: usize,
    absorbed: usize,
    struck: usize,
}

fn count_losses(
    mut removed: MessageReader<AgentRemoved>,
    mut struck: MessageReader<MarkersStruck>,
    mut losses: ResMut<Losses>,
) {
    for event in removed.read().filter(|e| e.kind == AgentKind::Train) {
        if event.reason == RemovalReason::Absorbed {
            losses.absorbed += 1;
        } else {
            losses.removed += 1;
        }
    }
    for event in struck.read() {
        losses.struck += event.count;
    }
}

fn build_app() -> App {
    let mut config = InitialConfig::default();
    config.seed = 5;
    config.agent.decay_frames = 0.0;
    config.spawn_ratios = SpawnRatios::only(AgentKind::Train);

    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.insert_resource(config);
    app.add_plugins(GamePlugin);
    app.init_resource::<Losses>();
    app.add_systems(FixedUpdate, count_losses.after(SimSet::PostUpdate));
    app.update();
    app
}

fn population(app: &App) -> usize {
    let agents = app.world().resource::<AgentTable>();
    let trains = app.world().resource::<TrainManager>();
    agents.count_kind(AgentKind::Train) + trains.total_marker_count()
}

#[test]
fn test_train_population_is_conserved() {
    let mut app = build_app();
    app.world_mut().insert_resource(Targets::single(Vec2::new(640.0, 480.0)));

    // Three clusters: the first spawn in each becomes a head, the rest join it
    let mut spawned = 0;
    for (cx, cy) in [(200.0, 200.0), (300.0, 220.0), (900.0, 700.0)] {
        for i in 0..6 {
            let pos = Vec2::new(cx + i as f32 * 6.0, cy);
            app.world_mut().write_message(SpawnAgent { kind: None, pos });
            spawned += 1;
        }
    }

    for tick in 1..=900 {
        if tick == 200 || tick == 450 {
            // Kill the lowest-id head to force a dissolve
            let head = app.world().resource::<TrainManager>().iter().find(|t| t.is_active()).map(|t| t.head);
            if let Some(agent) = head {
                app.world_mut().write_message(DamageAgent { agent, amount: 1_000 });
            }
        }
        if tick == 300 {
            let markers: Vec<Vec2> = app
                .world()
                .resource::<TrainManager>()
                .iter()
                .flat_map(|t| t.markers.iter().map(|m| m.pos))
                .take(1)
                .collect();
            if let Some(&center) = markers.first() {
                app.world_mut().write_message(StrikeMarkers { center, radius: 1.0 });
            }
        }

        app.world_mut().run_schedule(FixedUpdate);

        let losses = app.world().resource::<Losses>();
        assert_eq!(
            population(&app),
            spawned - losses.removed - losses.struck,
            "tick {}: heads + markers drifted ({:?})",
            tick,
            losses
        );
    }

    let losses = app.world().resource::<Losses>();
    assert!(losses.removed >= 2, "the damaged heads were never removed: {:?}", losses);
    println!("Conserved over 900 ticks: {:?}, {} trains left", losses, app.world().resource::<TrainManager>().len());
}

#[test]
fn test_every_live_head_owns_one_train() {
    let mut app = build_app();
    for i in 0..10 {
        let pos = Vec2::new(150.0 + (i % 5) as f32 * 90.0, 150.0 + (i / 5) as f32 * 200.0);
        app.world_mut().write_message(SpawnAgent { kind: Some(AgentKind::Train), pos });
    }

    for tick in 1..=400 {
        app.world_mut().run_schedule(FixedUpdate);

        let agents = app.world().resource::<AgentTable>();
        let trains = app.world().resource::<TrainManager>();
        for agent in agents.iter_alive().filter(|a| a.kind() == AgentKind::Train) {
            let owned = trains.iter().filter(|t| t.head == agent.id).count();
            assert_eq!(owned, 1, "tick {}: head {} owns {} trains", tick, agent.id, owned);
        }
        for train in trains.iter() {
            assert!(train.markers.len() <= train.history.len(), "tick {}: train {:?} outran its history", tick, train.id);
        }
    }
}
