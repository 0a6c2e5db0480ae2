//! Headless scenario runner for AI playtesting and CI verification.
//!
//! Loads RON scenarios, runs the simulation without graphics and reports
//! JSON summaries:
//!
//! - **Single runs**: play one seed to elimination or a tick cap
//! - **Determinism checks**: replay a seed and a snapshot, compare hashes
//! - **Batches**: many seeds in parallel for commander tuning
//!
//! # Example
//!
//! ```bash
//! # Run the built-in skirmish
//! cargo run -p siam_headless -- run
//!
//! # Run a scenario file with a fixed seed
//! cargo run -p siam_headless -- run --scenario crates/siam_headless/scenarios/ai_mirror.ron --seed 7
//!
//! # Verify determinism
//! cargo run -p siam_headless -- verify --seed 12345 --runs 5
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod batch;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, BatchConfig, BatchResults};
pub use runner::{run_scenario, verify_determinism, RunSummary, RunnerError, VerifyReport};
pub use scenario::{Scenario, ScenarioError};
