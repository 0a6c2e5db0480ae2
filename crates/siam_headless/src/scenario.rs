//! Scenario loading and world setup.
//!
//! Scenarios define the initial game state for headless runs: teams with
//! their starting units and buildings, resource nodes, AI commanders and
//! optional rule overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use siam_core::buildings::BuildingKind;
use siam_core::commander::{AiCommander, CommanderConfig};
use siam_core::components::{EntityId, TeamId, UnitKind};
use siam_core::config::GameConfig;
use siam_core::economy::{ResourceAmounts, ResourceKind};
use siam_core::error::GameError;
use siam_core::math::{Fixed, Vec2Fixed};
use siam_core::simulation::Simulation;

/// Name of the scenario compiled into the binary.
pub const BUILTIN_SKIRMISH: &str = "skirmish_1v1";

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The scenario describes something the rules reject.
    #[error("Invalid scenario: {0}")]
    Invalid(String),
    /// The simulation refused a setup step.
    #[error("Scenario setup failed: {0}")]
    Setup(#[from] GameError),
}

/// Commander personality presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommanderPreset {
    /// [`CommanderConfig::defensive`].
    Defensive,
    /// [`CommanderConfig::balanced`].
    #[default]
    Balanced,
    /// [`CommanderConfig::aggressive`].
    Aggressive,
}

impl CommanderPreset {
    /// Expand to a full config.
    #[must_use]
    pub fn config(self) -> CommanderConfig {
        match self {
            Self::Defensive => CommanderConfig::defensive(),
            Self::Balanced => CommanderConfig::balanced(),
            Self::Aggressive => CommanderConfig::aggressive(),
        }
    }
}

/// AI control for one team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommanderSetup {
    /// Personality.
    #[serde(default)]
    pub preset: CommanderPreset,
    /// Team whose headquarters the commander goes after.
    #[serde(default)]
    pub rival: Option<u8>,
}

/// A group of identical units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Unit kind.
    pub kind: UnitKind,
    /// X position of the first unit.
    pub x: i32,
    /// Y position of the first unit.
    pub y: i32,
    /// How many to spawn, stacked three units apart along y.
    #[serde(default = "one")]
    pub count: u32,
}

impl UnitPlacement {
    /// Create a new unit placement.
    #[must_use]
    pub fn new(kind: UnitKind, x: i32, y: i32, count: u32) -> Self {
        Self { kind, x, y, count }
    }
}

/// One building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingPlacement {
    /// Building kind.
    pub kind: BuildingKind,
    /// X position.
    pub x: i32,
    /// Y position.
    pub y: i32,
    /// Start finished rather than as a construction site.
    #[serde(default = "yes")]
    pub complete: bool,
}

impl BuildingPlacement {
    /// Create a finished building placement.
    #[must_use]
    pub fn new(kind: BuildingKind, x: i32, y: i32) -> Self {
        Self {
            kind,
            x,
            y,
            complete: true,
        }
    }
}

/// A resource node on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePlacement {
    /// What it yields.
    pub kind: ResourceKind,
    /// X position.
    pub x: i32,
    /// Y position.
    pub y: i32,
    /// Starting stock.
    pub amount: i32,
}

impl NodePlacement {
    /// Create a new node placement.
    #[must_use]
    pub fn new(kind: ResourceKind, x: i32, y: i32, amount: i32) -> Self {
        Self { kind, x, y, amount }
    }
}

/// Everything one team starts with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSetup {
    /// Team number.
    pub team: u8,
    /// Starting food.
    #[serde(default)]
    pub food: i32,
    /// Starting gold.
    #[serde(default)]
    pub gold: i32,
    /// Starting units.
    #[serde(default)]
    pub units: Vec<UnitPlacement>,
    /// Starting buildings.
    #[serde(default)]
    pub buildings: Vec<BuildingPlacement>,
    /// AI control, if any.
    #[serde(default)]
    pub commander: Option<CommanderSetup>,
    /// Put starting workers on the nearest node straight away.
    #[serde(default)]
    pub auto_harvest: bool,
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Seed used when the caller doesn't supply one.
    #[serde(default)]
    pub seed: u64,
    /// Run length cap in ticks.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
    /// Rule overrides; defaults apply when absent.
    #[serde(default)]
    pub config: Option<GameConfig>,
    /// Team setups.
    pub teams: Vec<TeamSetup>,
    /// Resource nodes.
    #[serde(default)]
    pub nodes: Vec<NodePlacement>,
}

fn one() -> u32 {
    1
}

fn yes() -> bool {
    true
}

fn default_max_ticks() -> u64 {
    // Ten minutes of game time.
    u64::from(siam_core::config::TICK_RATE) * 600
}

impl Default for Scenario {
    fn default() -> Self {
        Self::skirmish_1v1()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Resolve a built-in scenario name or a path to a RON file.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        if name_or_path == BUILTIN_SKIRMISH {
            return Ok(Self::skirmish_1v1());
        }
        Self::load(name_or_path)
    }

    /// Check team numbers and rule overrides.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.teams.is_empty() {
            return Err(ScenarioError::Invalid("no teams".to_string()));
        }
        let mut seen: Vec<u8> = Vec::with_capacity(self.teams.len());
        for setup in &self.teams {
            if seen.contains(&setup.team) {
                return Err(ScenarioError::Invalid(format!(
                    "team {} listed twice",
                    setup.team
                )));
            }
            seen.push(setup.team);
        }
        for setup in &self.teams {
            if let Some(rival) = setup.commander.as_ref().and_then(|c| c.rival) {
                if !seen.contains(&rival) {
                    return Err(ScenarioError::Invalid(format!(
                        "team {} targets unknown team {rival}",
                        setup.team
                    )));
                }
            }
        }
        if let Some(config) = &self.config {
            config.validate()?;
        }
        Ok(())
    }

    /// Rules this scenario runs under.
    #[must_use]
    pub fn game_config(&self) -> GameConfig {
        self.config.clone().unwrap_or_default()
    }

    /// Teams present at the start.
    #[must_use]
    pub fn team_ids(&self) -> Vec<TeamId> {
        self.teams.iter().map(|t| TeamId(t.team)).collect()
    }

    /// Create a standard 1v1 skirmish: a passive player base against an AI.
    #[must_use]
    pub fn skirmish_1v1() -> Self {
        Self {
            name: "Standard 1v1 Skirmish".to_string(),
            description: "Player garrison against a balanced AI commander".to_string(),
            seed: 0,
            max_ticks: default_max_ticks(),
            config: None,
            teams: vec![
                TeamSetup {
                    team: 0,
                    food: 200,
                    gold: 100,
                    units: vec![
                        UnitPlacement::new(UnitKind::Swordsman, 20, -6, 4),
                        UnitPlacement::new(UnitKind::Archer, 26, -6, 2),
                        UnitPlacement::new(UnitKind::Worker, -20, 0, 3),
                    ],
                    buildings: vec![
                        BuildingPlacement::new(BuildingKind::Headquarters, 0, 0),
                        BuildingPlacement::new(BuildingKind::DefenseTower, 15, 15),
                    ],
                    commander: None,
                    auto_harvest: true,
                },
                TeamSetup {
                    team: 1,
                    food: 600,
                    gold: 400,
                    units: vec![
                        UnitPlacement::new(UnitKind::Spearman, 380, -6, 3),
                        UnitPlacement::new(UnitKind::Worker, 420, 0, 4),
                    ],
                    buildings: vec![BuildingPlacement::new(BuildingKind::Headquarters, 400, 0)],
                    commander: Some(CommanderSetup {
                        preset: CommanderPreset::Balanced,
                        rival: Some(0),
                    }),
                    auto_harvest: false,
                },
            ],
            nodes: vec![
                NodePlacement::new(ResourceKind::Food, -40, 20, 1500),
                NodePlacement::new(ResourceKind::Gold, -40, -20, 1000),
                NodePlacement::new(ResourceKind::Food, 440, 20, 1500),
                NodePlacement::new(ResourceKind::Gold, 440, -20, 1000),
                NodePlacement::new(ResourceKind::Gold, 200, 0, 3000),
            ],
        }
    }

    /// Build the initial simulation.
    ///
    /// Nodes are spawned first, then each team's buildings and units in
    /// listed order, so entity ids are a pure function of the file.
    pub fn build(&self, seed: u64) -> Result<Simulation, ScenarioError> {
        self.validate()?;
        let mut sim = Simulation::new(self.game_config(), seed);
        let world = sim.world_mut();

        for node in &self.nodes {
            if node.amount <= 0 {
                return Err(ScenarioError::Invalid(format!(
                    "{} node at ({}, {}) has no stock",
                    node.kind.name(),
                    node.x,
                    node.y
                )));
            }
            world.spawn_resource_node(
                node.kind,
                Vec2Fixed::from_ints(node.x, node.y),
                Fixed::from_num(node.amount),
            );
        }

        let mut headquarters: Vec<(u8, EntityId)> = Vec::new();
        for setup in &self.teams {
            let team = TeamId(setup.team);
            world.grant(team, ResourceAmounts::new(setup.food, setup.gold));

            for placement in &setup.buildings {
                let id = world.spawn_building(
                    team,
                    placement.kind,
                    Vec2Fixed::from_ints(placement.x, placement.y),
                    placement.complete,
                )?;
                if placement.kind == BuildingKind::Headquarters {
                    headquarters.push((setup.team, id));
                }
            }

            let mut workers = Vec::new();
            for placement in &setup.units {
                for i in 0..placement.count {
                    let offset = i32::try_from(i)
                        .map_err(|_| ScenarioError::Invalid("unit count too large".to_string()))?
                        * 3;
                    let position = Vec2Fixed::from_ints(placement.x, placement.y + offset);
                    let id = world.spawn_unit(team, placement.kind, position)?;
                    if placement.kind.is_worker() {
                        workers.push((id, position));
                    }
                }
            }

            if setup.auto_harvest {
                for (index, (worker, position)) in workers.into_iter().enumerate() {
                    // Alternate food and gold, falling back to whatever is left.
                    let first = ResourceKind::ALL[index % ResourceKind::ALL.len()];
                    let node = std::iter::once(first)
                        .chain(ResourceKind::ALL)
                        .find_map(|kind| world.economy().find_new_resource(kind, position));
                    if let Some(node) = node {
                        world.assign_worker(worker, node)?;
                    }
                }
            }
        }

        for setup in &self.teams {
            let Some(commander) = &setup.commander else {
                continue;
            };
            let team = TeamId(setup.team);
            let mut ai = AiCommander::new(
                team,
                commander.preset.config(),
                seed.wrapping_add(u64::from(setup.team) + 1),
            );
            if let Some(rival) = commander.rival {
                if let Some(&(_, hq)) = headquarters.iter().find(|(owner, _)| *owner == rival) {
                    ai = ai.with_player_hq(hq);
                }
            }
            sim.add_commander(ai);
        }

        tracing::info!(
            scenario = %self.name,
            seed,
            teams = self.teams.len(),
            units = sim.world().units().count(),
            buildings = sim.world().buildings().count(),
            "Scenario built"
        );
        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scenario() {
        let scenario = Scenario::default();
        assert_eq!(scenario.teams.len(), 2);
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn test_builtin_builds() {
        let sim = Scenario::skirmish_1v1().build(1).expect("build");
        assert_eq!(sim.commanders().len(), 1);
        assert_eq!(sim.world().units().count(), 4 + 2 + 3 + 3 + 4);
        // Player workers are already harvesting.
        assert_eq!(sim.world().economy().assignments().count(), 3);
    }

    #[test]
    fn test_scenario_ron_roundtrip() {
        let scenario = Scenario::skirmish_1v1();
        let ron_str = ron::to_string(&scenario).expect("Should serialize");
        let parsed = Scenario::from_ron_str(&ron_str).expect("Should parse");
        assert_eq!(parsed, scenario);
    }

    #[test]
    fn test_minimal_ron_uses_defaults() {
        let scenario = Scenario::from_ron_str(
            r#"(
                name: "tiny",
                teams: [
                    (team: 0, units: [(kind: Worker, x: 0, y: 0)]),
                ],
            )"#,
        )
        .expect("parse");
        assert_eq!(scenario.max_ticks, 12_000);
        assert_eq!(scenario.teams[0].units[0].count, 1);
        assert!(scenario.config.is_none());
    }

    #[test]
    fn test_duplicate_team_rejected() {
        let result = Scenario::from_ron_str(r#"(name: "dup", teams: [(team: 1), (team: 1)])"#);
        assert!(matches!(result, Err(ScenarioError::Invalid(_))));
    }

    #[test]
    fn test_unknown_rival_rejected() {
        let result = Scenario::from_ron_str(
            r#"(name: "lonely", teams: [(team: 1, commander: Some((rival: Some(4))))])"#,
        );
        assert!(matches!(result, Err(ScenarioError::Invalid(_))));
    }

    #[test]
    fn test_empty_node_rejected() {
        let mut scenario = Scenario::skirmish_1v1();
        scenario.nodes.push(NodePlacement::new(ResourceKind::Food, 0, 0, 0));
        assert!(matches!(scenario.build(0), Err(ScenarioError::Invalid(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Scenario::load("/definitely/not/here.ron"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }
}
