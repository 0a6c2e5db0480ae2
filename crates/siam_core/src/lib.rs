//! # Siam Core
//!
//! Deterministic simulation core for a historical Siamese RTS.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness (every roll comes from a seeded `ChaCha8Rng`)
//! - No floating-point math (uses fixed-point)
//!
//! ## Crate Structure
//!
//! - [`math`] - Fixed-point math utilities
//! - [`components`] - Units, teams and orders
//! - [`unit_state`] - Per-unit Idle / Move / Chase / Attack state machine
//! - [`combat`] - Damage and hit chance formulas
//! - [`economy`] - Resource nodes, stockpiles and the worker harvesting loop
//! - [`buildings`] - Construction and training queues
//! - [`commander`] - AI commander decision ladder
//! - [`world`] - The game context owning every registry
//! - [`simulation`] - Core simulation loop
//! - [`config`] - Data-driven tuning

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod buildings;
pub mod combat;
pub mod commander;
pub mod components;
pub mod config;
pub mod economy;
pub mod error;
pub mod math;
pub mod simulation;
pub mod unit_state;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::buildings::{Building, BuildingKind, TrainingQueue};
    pub use crate::commander::{AiCommander, CommanderConfig, Decision, ForceSnapshot};
    pub use crate::components::*;
    pub use crate::config::{GameConfig, TICK_RATE};
    pub use crate::economy::{
        EconomyEvent, HarvestConfig, ResourceAmounts, ResourceKind, ResourceNode, WorkerState,
    };
    pub use crate::error::{GameError, Result};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::simulation::{Simulation, TickEvents};
    pub use crate::unit_state::UnitState;
    pub use crate::world::World;
}
