//! Headless RTS scenario runner.
//!
//! Runs scenarios without graphics for AI playtesting and CI.
//!
//! # Usage
//!
//! ```bash
//! # Run the built-in skirmish and print a JSON summary
//! cargo run -p siam_headless -- run
//!
//! # Run a batch of seeds in parallel
//! cargo run -p siam_headless -- batch --count 100 --output results/
//!
//! # Verify determinism
//! cargo run -p siam_headless -- verify --seed 12345 --runs 5
//! ```
//!
//! Output (stdout): JSON summaries
//! Logs (stderr): tracing output, `RUST_LOG` overrides `--verbose`

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use siam_headless::{
    batch::{run_batch, BatchConfig, BatchResults},
    runner::{run_scenario, verify_determinism, RunnerError},
    scenario::{Scenario, BUILTIN_SKIRMISH},
};

#[derive(Parser)]
#[command(name = "siam_headless")]
#[command(about = "Headless RTS scenario runner for AI playtesting and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single game and print its summary
    Run {
        /// Built-in scenario name or path to a RON file
        #[arg(short, long, default_value = BUILTIN_SKIRMISH)]
        scenario: String,

        /// Seed (defaults to the scenario's own)
        #[arg(long)]
        seed: Option<u64>,

        /// Tick cap (defaults to the scenario's own)
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Also write the summary to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify determinism by running same seed multiple times
    Verify {
        /// Built-in scenario name or path to a RON file
        #[arg(short, long, default_value = BUILTIN_SKIRMISH)]
        scenario: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Ticks per run
        #[arg(short, long, default_value = "2400")]
        ticks: u64,
    },

    /// Run a batch of seeds in parallel
    Batch {
        /// Built-in scenario name or path to a RON file
        #[arg(short, long, default_value = BUILTIN_SKIRMISH)]
        scenario: String,

        /// Number of games to run
        #[arg(short, long, default_value = "20")]
        count: u32,

        /// Maximum parallel games (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Tick cap per game (0 = scenario default)
        #[arg(short, long, default_value = "0")]
        ticks: u64,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries JSON
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let command = cli.command.unwrap_or(Commands::Run {
        scenario: BUILTIN_SKIRMISH.to_string(),
        seed: None,
        ticks: None,
        output: None,
    });

    let result = match command {
        Commands::Run {
            scenario,
            seed,
            ticks,
            output,
        } => cmd_run(&scenario, seed, ticks, output),
        Commands::Verify {
            scenario,
            seed,
            runs,
            ticks,
        } => cmd_verify(&scenario, seed, runs, ticks),
        Commands::Batch {
            scenario,
            count,
            parallel,
            seed,
            ticks,
            output,
        } => cmd_batch(&scenario, count, parallel, seed, ticks, &output),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("FATAL: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run a single game
fn cmd_run(
    scenario: &str,
    seed: Option<u64>,
    ticks: Option<u64>,
    output: Option<PathBuf>,
) -> Result<ExitCode, RunnerError> {
    let scenario = Scenario::resolve(scenario)?;
    let seed = seed.unwrap_or(scenario.seed);
    let ticks = ticks.unwrap_or(scenario.max_ticks);
    tracing::info!(scenario = %scenario.name, seed, ticks, "Starting run");

    let summary = run_scenario(&scenario, seed, ticks)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(path) = output {
        summary.save(&path)?;
        tracing::info!(path = %path.display(), "Summary written");
    }
    Ok(ExitCode::SUCCESS)
}

/// Verify determinism
fn cmd_verify(scenario: &str, seed: u64, runs: u32, ticks: u64) -> Result<ExitCode, RunnerError> {
    let scenario = Scenario::resolve(scenario)?;
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs, {} ticks)",
        scenario.name,
        seed,
        runs,
        ticks
    );

    let report = verify_determinism(&scenario, seed, runs, ticks)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.is_deterministic() {
        eprintln!("PASS: All {runs} runs produced identical results");
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        Ok(ExitCode::FAILURE)
    }
}

/// Run batch of games
fn cmd_batch(
    scenario: &str,
    count: u32,
    parallel: u32,
    seed: u64,
    ticks: u64,
    output: &std::path::Path,
) -> Result<ExitCode, RunnerError> {
    let scenario = Scenario::resolve(scenario)?;
    let config = BatchConfig {
        game_count: count,
        parallel_games: parallel,
        seed_start: seed,
        max_ticks: ticks,
    };

    let results = run_batch(&scenario, config);
    let path = BatchResults::default_path(output);
    results.save(&path)?;

    tracing::info!(path = %path.display(), "Batch results written");
    for (team, wins) in &results.wins {
        eprintln!(
            "team-{team}: {wins} wins ({:.1}%)",
            results.win_rate(*team) * 100.0
        );
    }
    eprintln!(
        "{} unfinished, {} failed, {:.1}s",
        results.unfinished,
        results.errors.len(),
        results.duration_seconds
    );

    if results.errors.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
