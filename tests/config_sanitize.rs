use bevy::prelude::*;
use pursuit::game::config::{InitialConfig, SpawnRatios};
use pursuit::game::simulation::{SimConfig, SimRng};
use pursuit::game::types::AgentKind;
use pursuit::game::GamePlugin;

fn as_json(config: &InitialConfig) -> serde_json::Value {
    serde_json::to_value(config).expect("config serializes")
}

#[test]
fn test_json_round_trip() {
    let mut config = InitialConfig::default();
    config.seed = 1234;
    config.tracker.top_k = 5;

    let text = serde_json::to_string(&config).unwrap();
    let back: InitialConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(as_json(&back), as_json(&config));
}

#[test]
fn test_shipped_config_matches_defaults() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/initial_config.ron");
    let shipped = InitialConfig::from_file(path).expect("shipped config parses");
    assert_eq!(as_json(&shipped), as_json(&InitialConfig::default()));
}

#[test]
fn test_invalid_values_are_repaired() {
    let mut initial = InitialConfig::default();
    initial.agent.radius = -3.0;
    initial.agent.base_speed = f32::NAN;
    initial.agent.speed_jitter = 4.0;
    initial.tracker.scent_radius = 200.0;
    initial.tracker.far_scent_radius = 50.0;
    initial.congestion.threshold = 0;
    initial.spawn_ratios = SpawnRatios {
        normal: 0.0,
        tracker: -1.0,
        wall_hugger: 0.0,
        train: 0.0,
        spacing_seeker: 0.0,
        dog: 0.0,
    };

    let config = SimConfig::from_initial(&initial);
    let defaults = InitialConfig::default();

    assert_eq!(config.agent.radius, defaults.agent.radius);
    assert_eq!(config.agent.base_speed, 0.0);
    assert_eq!(config.agent.speed_jitter, 1.0);
    assert_eq!(config.tracker.far_scent_radius, 200.0);
    assert_eq!(config.congestion.threshold, defaults.congestion.threshold);

    assert_eq!(config.spawn.probability(AgentKind::Normal), 1.0);
    for kind in AgentKind::ALL.into_iter().filter(|k| *k != AgentKind::Normal) {
        assert_eq!(config.spawn.probability(kind), 0.0);
    }
}

#[test]
fn test_provided_config_reaches_the_simulation() {
    let mut initial = InitialConfig::default();
    initial.seed = 99;
    initial.tick_rate = 30.0;

    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.insert_resource(initial);
    app.add_plugins(GamePlugin);
    app.update();

    let config = app.world().resource::<SimConfig>();
    assert_eq!(config.seed, 99);
    assert_eq!(config.tick_rate, 30);
    assert!(app.world().get_resource::<SimRng>().is_some());

    let step = app.world().resource::<Time<Fixed>>().timestep();
    assert!((step.as_secs_f64() - 1.0 / 30.0).abs() < 1e-9);
}
