//! Data-driven game configuration.
//!
//! Every tunable number lives in [`GameConfig`]. Defaults are built in code;
//! data files only need to list what they change.
//!
//! # Example RON
//!
//! ```ron
//! (
//!     tick_rate: 20,
//!     harvest: (
//!         harvest_rate: (food: 5.0, gold: 3.0),
//!         carry_capacity: (food: 10.0, gold: 10.0),
//!         harvest_range: 40.0,
//!         deposit_range: 50.0,
//!         enforce_storage_types: true,
//!     ),
//! )
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::buildings::{BuildingKind, TowerWeapon};
use crate::components::{UnitKind, UnitStats};
use crate::economy::{HarvestConfig, ResourceAmounts, ResourceKind};
use crate::error::{GameError, Result};
use crate::math::{fixed_serde, percent, Fixed};

/// Default simulation ticks per second.
pub const TICK_RATE: u32 = 20;

/// Cost, durability and stats of a unit kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTemplate {
    /// Price charged when training is queued.
    pub cost: ResourceAmounts,
    /// Maximum health points.
    #[serde(with = "fixed_serde")]
    pub max_health: Fixed,
    /// Seconds of training.
    #[serde(with = "fixed_serde")]
    pub train_time: Fixed,
    /// Combat and movement stats.
    pub stats: UnitStats,
}

/// Cost, durability and capabilities of a building kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingTemplate {
    /// Price charged when the site is placed.
    pub cost: ResourceAmounts,
    /// Maximum health points.
    #[serde(with = "fixed_serde")]
    pub max_health: Fixed,
    /// Seconds of construction.
    #[serde(with = "fixed_serde")]
    pub build_time: Fixed,
    /// Armor rating.
    #[serde(with = "fixed_serde", default)]
    pub armor: Fixed,
    /// Resource kinds the building stores.
    #[serde(default)]
    pub stores: Vec<ResourceKind>,
    /// Unit kinds the building trains.
    #[serde(default)]
    pub trains: Vec<UnitKind>,
    /// Mounted weapon.
    #[serde(default)]
    pub weapon: Option<TowerWeapon>,
}

/// Complete rule set for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Distance at which a move order counts as arrived.
    #[serde(with = "fixed_serde")]
    pub arrival_tolerance: Fixed,
    /// Unit templates by kind.
    pub units: BTreeMap<UnitKind, UnitTemplate>,
    /// Building templates by kind.
    pub buildings: BTreeMap<BuildingKind, BuildingTemplate>,
    /// Worker harvesting tuning.
    pub harvest: HarvestConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            arrival_tolerance: Fixed::ONE,
            units: default_units(),
            buildings: default_buildings(),
            harvest: HarvestConfig::default(),
        }
    }
}

impl GameConfig {
    /// Parse a config from RON text and validate it.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let config: Self = ron::from_str(ron)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.tick_rate == 0 {
            return Err(GameError::InvalidState("tick_rate must be positive".into()));
        }
        if let Some(kind) = UnitKind::ALL.iter().find(|k| !self.units.contains_key(k)) {
            return Err(GameError::InvalidState(format!(
                "missing unit template for {}",
                kind.name()
            )));
        }
        if let Some(kind) = BuildingKind::ALL
            .iter()
            .find(|k| !self.buildings.contains_key(k))
        {
            return Err(GameError::InvalidState(format!(
                "missing building template for {}",
                kind.name()
            )));
        }
        Ok(())
    }

    /// Seconds per tick.
    #[must_use]
    pub fn dt(&self) -> Fixed {
        Fixed::ONE / Fixed::from_num(self.tick_rate.max(1))
    }

    /// Template for a unit kind.
    pub fn unit(&self, kind: UnitKind) -> Result<&UnitTemplate> {
        self.units
            .get(&kind)
            .ok_or_else(|| GameError::InvalidState(format!("no template for {}", kind.name())))
    }

    /// Template for a building kind.
    pub fn building(&self, kind: BuildingKind) -> Result<&BuildingTemplate> {
        self.buildings
            .get(&kind)
            .ok_or_else(|| GameError::InvalidState(format!("no template for {}", kind.name())))
    }
}

fn fx(n: i32) -> Fixed {
    Fixed::from_num(n)
}

#[allow(clippy::too_many_arguments)]
fn unit(
    cost: (i32, i32),
    max_health: i32,
    train_time: i32,
    attack_damage: i32,
    attack_range: Fixed,
    attack_rate: Fixed,
    move_speed: Fixed,
    armor: i32,
) -> UnitTemplate {
    UnitTemplate {
        cost: ResourceAmounts::new(cost.0, cost.1),
        max_health: fx(max_health),
        train_time: fx(train_time),
        stats: UnitStats {
            attack_damage: fx(attack_damage),
            attack_range,
            attack_rate,
            move_speed,
            armor: fx(armor),
            accuracy: fx(85),
        },
    }
}

fn default_units() -> BTreeMap<UnitKind, UnitTemplate> {
    let mut units = BTreeMap::new();
    units.insert(
        UnitKind::Worker,
        unit((50, 0), 50, 10, 3, percent(150), percent(150), fx(4), 0),
    );
    units.insert(
        UnitKind::Swordsman,
        unit((60, 20), 120, 15, 12, fx(2), fx(1), fx(3), 20),
    );
    units.insert(
        UnitKind::Spearman,
        unit((50, 25), 140, 15, 10, fx(3), percent(120), fx(3), 30),
    );
    let mut archer = unit((40, 40), 80, 18, 9, fx(15), percent(150), percent(350), 5);
    archer.stats.accuracy = fx(75);
    units.insert(UnitKind::Archer, archer);
    units.insert(
        UnitKind::Elephant,
        unit((150, 100), 400, 30, 30, fx(3), fx(2), fx(2), 60),
    );
    units
}

fn building(
    cost: (i32, i32),
    max_health: i32,
    build_time: i32,
    armor: i32,
    stores: Vec<ResourceKind>,
    trains: Vec<UnitKind>,
) -> BuildingTemplate {
    BuildingTemplate {
        cost: ResourceAmounts::new(cost.0, cost.1),
        max_health: fx(max_health),
        build_time: fx(build_time),
        armor: fx(armor),
        stores,
        trains,
        weapon: None,
    }
}

fn default_buildings() -> BTreeMap<BuildingKind, BuildingTemplate> {
    let mut buildings = BTreeMap::new();
    buildings.insert(
        BuildingKind::Headquarters,
        building(
            (400, 200),
            2000,
            60,
            80,
            vec![ResourceKind::Food, ResourceKind::Gold],
            vec![UnitKind::Worker],
        ),
    );
    buildings.insert(
        BuildingKind::Barracks,
        building(
            (150, 100),
            800,
            30,
            50,
            Vec::new(),
            vec![
                UnitKind::Swordsman,
                UnitKind::Spearman,
                UnitKind::Archer,
                UnitKind::Elephant,
            ],
        ),
    );
    let mut tower = building((100, 75), 600, 25, 60, Vec::new(), Vec::new());
    tower.weapon = Some(TowerWeapon {
        attack_damage: fx(15),
        attack_range: fx(20),
        attack_rate: fx(2),
        accuracy: fx(80),
    });
    buildings.insert(BuildingKind::DefenseTower, tower);
    buildings.insert(
        BuildingKind::Granary,
        building((100, 0), 500, 20, 30, vec![ResourceKind::Food], Vec::new()),
    );
    buildings.insert(
        BuildingKind::Treasury,
        building((50, 100), 500, 20, 30, vec![ResourceKind::Gold], Vec::new()),
    );
    buildings
}
