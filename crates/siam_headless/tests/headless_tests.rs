//! End-to-end tests for scenario files, runs and saved results.

use std::path::PathBuf;

use siam_core::components::TeamId;
use siam_headless::batch::{run_batch, BatchConfig, BatchResults};
use siam_headless::runner::{run_scenario, verify_determinism, RunSummary};
use siam_headless::scenario::{Scenario, ScenarioError};

fn shipped(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(name)
}

#[test]
fn test_shipped_scenarios_parse_and_build() {
    for name in ["skirmish_1v1.ron", "ai_mirror.ron", "harvest_drill.ron"] {
        let scenario = Scenario::load(shipped(name)).unwrap_or_else(|e| panic!("{name}: {e}"));
        let sim = scenario
            .build(scenario.seed)
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        assert!(sim.world().units().count() > 0, "{name} has no units");
    }
}

#[test]
fn test_shipped_skirmish_matches_builtin() {
    let from_file = Scenario::load(shipped("skirmish_1v1.ron")).expect("load");
    assert_eq!(from_file, Scenario::skirmish_1v1());
}

#[test]
fn test_harvest_drill_fills_typed_storage() {
    let scenario = Scenario::load(shipped("harvest_drill.ron")).expect("load");
    assert!(scenario.game_config().harvest.enforce_storage_types);

    let summary = run_scenario(&scenario, 1, 2400).expect("run");
    let team = &summary.teams[0];
    assert!(team.food > 0.0);
    assert!(team.gold > 0.0);
    assert_eq!(team.gathered, team.food + team.gold);
    assert_eq!(summary.winner, None);
}

#[test]
fn test_scenario_file_roundtrip_through_tempdir() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("custom.ron");
    let mut scenario = Scenario::skirmish_1v1();
    scenario.name = "custom".to_string();
    scenario.seed = 77;
    std::fs::write(&path, ron::to_string(&scenario).expect("serialize")).expect("write");

    let loaded = Scenario::resolve(path.to_str().expect("utf-8 path")).expect("resolve");
    assert_eq!(loaded, scenario);
}

#[test]
fn test_malformed_file_is_parse_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.ron");
    std::fs::write(&path, "(name: \"broken\", teams: [(team: \"zero\")])").expect("write");

    assert!(matches!(
        Scenario::load(&path),
        Err(ScenarioError::ParseError(_))
    ));
}

#[test]
fn test_summary_saves_and_loads() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("out").join("summary.json");

    let summary = run_scenario(&Scenario::skirmish_1v1(), 3, 200).expect("run");
    summary.save(&path).expect("save");
    let loaded = RunSummary::load(&path).expect("load");

    assert_eq!(loaded.state_hash, summary.state_hash);
    assert_eq!(loaded.teams.len(), 2);
    assert_eq!(loaded.teams[1].team, TeamId(1).0);
}

#[test]
fn test_same_seed_same_summary() {
    let scenario = Scenario::load(shipped("ai_mirror.ron")).expect("load");
    let a = run_scenario(&scenario, 9, 1500).expect("first");
    let b = run_scenario(&scenario, 9, 1500).expect("second");
    assert_eq!(a, b);
    assert!(a.teams.iter().all(|t| !t.decisions.is_empty()));
}

#[test]
fn test_mirror_verifies() {
    let scenario = Scenario::load(shipped("ai_mirror.ron")).expect("load");
    let report = verify_determinism(&scenario, 4, 2, 600).expect("verify");
    assert!(report.is_deterministic(), "hashes: {:?}", report.hashes);
}

#[test]
fn test_batch_results_save_and_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let results = run_batch(
        &Scenario::skirmish_1v1(),
        BatchConfig {
            game_count: 3,
            parallel_games: 0,
            seed_start: 100,
            max_ticks: 100,
        },
    );
    let path = BatchResults::default_path(dir.path());
    results.save(&path).expect("save");

    let loaded = BatchResults::load(&path).expect("load");
    assert_eq!(loaded.games.len(), 3);
    assert_eq!(loaded.config, results.config);
    assert_eq!(loaded.games[0].state_hash, results.games[0].state_hash);
}
