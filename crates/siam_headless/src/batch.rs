//! Batch runner for AI playtesting.
//!
//! Runs many seeds of one scenario in parallel using rayon. Each game is
//! owned by a single worker thread.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::runner::{run_scenario, RunSummary, RunnerError};
use crate::scenario::Scenario;

/// Configuration for a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of games to run.
    pub game_count: u32,
    /// Maximum parallel games (0 = use rayon default).
    pub parallel_games: u32,
    /// Seed of the first game; later games count up from it.
    pub seed_start: u64,
    /// Tick cap per game (0 = scenario default).
    pub max_ticks: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            game_count: 20,
            parallel_games: 0,
            seed_start: 0,
            max_ticks: 0,
        }
    }
}

/// Error during one game of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// Seed used.
    pub seed: u64,
    /// Error message.
    pub message: String,
}

/// Results from a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResults {
    /// Scenario name.
    pub scenario: String,
    /// Configuration used.
    pub config: BatchConfig,
    /// Individual game summaries, in seed order.
    pub games: Vec<RunSummary>,
    /// Wins by team number.
    pub wins: BTreeMap<u8, u32>,
    /// Games that hit the tick cap.
    pub unfinished: u32,
    /// Games that failed to run.
    pub errors: Vec<BatchError>,
    /// Wall-clock runtime.
    pub duration_seconds: f64,
}

impl BatchResults {
    /// Save results to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), RunnerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Load results from a JSON file.
    pub fn load(path: &Path) -> Result<Self, RunnerError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Default file name inside an output directory.
    #[must_use]
    pub fn default_path(output_dir: &Path) -> PathBuf {
        output_dir.join("batch.json")
    }

    /// Fraction of finished games won by `team`.
    #[must_use]
    pub fn win_rate(&self, team: u8) -> f64 {
        let finished = self.games.len() as u32 - self.unfinished;
        if finished == 0 {
            return 0.0;
        }
        f64::from(self.wins.get(&team).copied().unwrap_or(0)) / f64::from(finished)
    }
}

/// Run a batch of games.
pub fn run_batch(scenario: &Scenario, config: BatchConfig) -> BatchResults {
    let start = Instant::now();
    let max_ticks = if config.max_ticks == 0 {
        scenario.max_ticks
    } else {
        config.max_ticks
    };

    info!(
        scenario = %scenario.name,
        games = config.game_count,
        seed_start = config.seed_start,
        max_ticks,
        "Starting batch run"
    );

    let play = |i: u32| {
        let seed = config.seed_start.wrapping_add(u64::from(i));
        run_scenario(scenario, seed, max_ticks).map_err(|e| {
            warn!(seed, error = %e, "Game failed");
            BatchError {
                seed,
                message: e.to_string(),
            }
        })
    };

    let results: Vec<Result<RunSummary, BatchError>> = if config.parallel_games > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games as usize)
            .build()
        {
            Ok(pool) => pool.install(|| (0..config.game_count).into_par_iter().map(play).collect()),
            Err(e) => {
                warn!(error = %e, "Could not build thread pool, using the global one");
                (0..config.game_count).into_par_iter().map(play).collect()
            }
        }
    } else {
        (0..config.game_count).into_par_iter().map(play).collect()
    };

    let mut games = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(game) => games.push(game),
            Err(e) => errors.push(e),
        }
    }

    let mut wins = BTreeMap::new();
    let mut unfinished = 0;
    for game in &games {
        match game.winner {
            Some(team) => *wins.entry(team).or_insert(0) += 1,
            None => unfinished += 1,
        }
    }

    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        games = games.len(),
        errors = errors.len(),
        unfinished,
        duration_seconds,
        "Batch complete"
    );

    BatchResults {
        scenario: scenario.name.clone(),
        config,
        games,
        wins,
        unfinished,
        errors,
        duration_seconds,
    }
}
