//! Single-game runner and determinism verification.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use siam_core::components::TeamId;
use siam_core::economy::EconomyEvent;
use siam_core::math::Fixed;
use siam_core::simulation::Simulation;

use crate::scenario::{Scenario, ScenarioError};

/// Error type for runner operations.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// Scenario could not be loaded or built.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// Failed to write output.
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to encode or decode JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Snapshot round-trip failed.
    #[error("Snapshot failed: {0}")]
    Snapshot(String),
}

/// End-of-game numbers for one team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSummary {
    /// Team number.
    pub team: u8,
    /// Surviving non-worker units.
    pub army: usize,
    /// Surviving workers.
    pub workers: usize,
    /// Surviving buildings, finished or not.
    pub buildings: usize,
    /// Food in the stockpile.
    pub food: f64,
    /// Gold in the stockpile.
    pub gold: f64,
    /// Food and gold workers brought home over the game.
    pub gathered: f64,
    /// Units that finished training.
    pub units_trained: u32,
    /// Units and buildings lost.
    pub losses: u32,
    /// Commander decisions by name.
    pub decisions: BTreeMap<String, u32>,
}

impl TeamSummary {
    fn empty(team: TeamId) -> Self {
        Self {
            team: team.0,
            army: 0,
            workers: 0,
            buildings: 0,
            food: 0.0,
            gold: 0.0,
            gathered: 0.0,
            units_trained: 0,
            losses: 0,
            decisions: BTreeMap::new(),
        }
    }
}

/// Result of running one scenario to completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Scenario name.
    pub scenario: String,
    /// Seed used.
    pub seed: u64,
    /// Ticks simulated.
    pub ticks: u64,
    /// Game seconds simulated.
    pub game_seconds: f64,
    /// Last team standing, if the game ended by elimination.
    pub winner: Option<u8>,
    /// Final state hash.
    pub state_hash: u64,
    /// Per-team results.
    pub teams: Vec<TeamSummary>,
}

impl RunSummary {
    /// Save as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), RunnerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Load from JSON.
    pub fn load(path: &Path) -> Result<Self, RunnerError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

fn to_f64(value: Fixed) -> f64 {
    value.to_num()
}

/// Run a scenario until one team is left or `max_ticks` have passed.
pub fn run_scenario(scenario: &Scenario, seed: u64, max_ticks: u64) -> Result<RunSummary, RunnerError> {
    let mut sim = scenario.build(seed)?;
    let starting_teams = scenario.team_ids();

    let mut teams: BTreeMap<TeamId, TeamSummary> = starting_teams
        .iter()
        .map(|&team| (team, TeamSummary::empty(team)))
        .collect();
    // Remember owners so deaths can be charged after removal.
    let mut owners: BTreeMap<u64, TeamId> = BTreeMap::new();
    let mut winner = None;

    while sim.get_tick() < max_ticks {
        owners.clear();
        owners.extend(sim.world().units().map(|u| (u.id, u.team)));
        owners.extend(sim.world().buildings().map(|b| (b.id, b.team)));

        let events = sim.tick();

        for (team, decision) in &events.decisions {
            if let Some(summary) = teams.get_mut(team) {
                *summary.decisions.entry(decision.name().to_string()).or_insert(0) += 1;
            }
        }
        for trained in &events.trained {
            if let Some(summary) = sim
                .world()
                .team_of(trained.unit)
                .and_then(|team| teams.get_mut(&team))
            {
                summary.units_trained += 1;
            }
        }
        for dead in &events.deaths {
            if let Some(summary) = owners.get(dead).and_then(|team| teams.get_mut(team)) {
                summary.losses += 1;
            }
        }
        for event in &events.economy {
            if let EconomyEvent::ResourceDeposited { team, amount, .. } = event {
                if let Some(summary) = teams.get_mut(team) {
                    summary.gathered += to_f64(*amount);
                }
            }
        }

        if starting_teams.len() > 1 {
            let surviving = sim.world().surviving_teams();
            if surviving.len() <= 1 {
                winner = surviving.first().map(|team| team.0);
                tracing::info!(tick = sim.get_tick(), winner = ?winner, "Game over");
                break;
            }
        }
    }

    let world = sim.world();
    for (team, summary) in &mut teams {
        summary.army = world
            .units()
            .filter(|u| u.team == *team && !u.is_worker())
            .count();
        summary.workers = world
            .units()
            .filter(|u| u.team == *team && u.is_worker())
            .count();
        summary.buildings = world.buildings().filter(|b| b.team == *team).count();
        let pool = world.pool(*team);
        summary.food = to_f64(pool.food);
        summary.gold = to_f64(pool.gold);
    }

    let summary = RunSummary {
        scenario: scenario.name.clone(),
        seed,
        ticks: sim.get_tick(),
        game_seconds: to_f64(world.elapsed()),
        winner,
        state_hash: sim.state_hash(),
        teams: teams.into_values().collect(),
    };
    tracing::debug!(
        ticks = summary.ticks,
        state_hash = %format!("{:016x}", summary.state_hash),
        "Run finished"
    );
    Ok(summary)
}

/// Outcome of a determinism check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Seed checked.
    pub seed: u64,
    /// Ticks per run.
    pub ticks: u64,
    /// Final hash of every run.
    pub hashes: Vec<u64>,
    /// Whether a snapshot taken halfway resumed to the same hash.
    pub snapshot_matches: bool,
}

impl VerifyReport {
    /// All runs and the snapshot agree.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.snapshot_matches && self.hashes.windows(2).all(|w| w[0] == w[1])
    }
}

fn run_fixed(scenario: &Scenario, seed: u64, ticks: u64) -> Result<Simulation, RunnerError> {
    let mut sim = scenario.build(seed)?;
    sim.run(ticks);
    Ok(sim)
}

/// Run the same seed `runs` times plus one snapshot round-trip.
pub fn verify_determinism(
    scenario: &Scenario,
    seed: u64,
    runs: u32,
    ticks: u64,
) -> Result<VerifyReport, RunnerError> {
    let mut hashes = Vec::new();
    for run in 0..runs {
        let hash = run_fixed(scenario, seed, ticks)?.state_hash();
        tracing::debug!(run, hash = %format!("{hash:016x}"), "Verification run");
        hashes.push(hash);
    }

    let half = ticks / 2;
    let mut original = run_fixed(scenario, seed, half)?;
    let bytes = original
        .serialize()
        .map_err(|e| RunnerError::Snapshot(e.to_string()))?;
    let mut restored =
        Simulation::deserialize(&bytes).map_err(|e| RunnerError::Snapshot(e.to_string()))?;
    original.run(ticks - half);
    restored.run(ticks - half);
    let snapshot_matches = original.state_hash() == restored.state_hash()
        && hashes.first().map_or(true, |&h| h == original.state_hash());

    let report = VerifyReport {
        seed,
        ticks,
        hashes,
        snapshot_matches,
    };
    if report.is_deterministic() {
        tracing::info!(seed, ticks, runs, "Determinism verified");
    } else {
        tracing::warn!(seed, ticks, hashes = ?report.hashes, "Non-determinism detected");
    }
    Ok(report)
}
