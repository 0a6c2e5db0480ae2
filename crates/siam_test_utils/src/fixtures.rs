//! Test fixtures and helpers.
//!
//! Pre-built worlds and simulations for consistent testing. Every fixture
//! is a pure function of its arguments.

use fixed::types::I32F32;

use siam_core::buildings::BuildingKind;
use siam_core::commander::{AiCommander, CommanderConfig};
use siam_core::components::{EntityId, TeamId, UnitKind};
use siam_core::config::GameConfig;
use siam_core::economy::{ResourceAmounts, ResourceKind};
use siam_core::math::Vec2Fixed;
use siam_core::simulation::Simulation;
use siam_core::world::World;

/// Team controlled by the (absent) human player in fixtures.
pub const PLAYER: TeamId = TeamId(0);

/// Team controlled by the AI commander in fixtures.
pub const AI: TeamId = TeamId(1);

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a position from integer coordinates.
#[must_use]
pub fn pos(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(x, y)
}

/// Ids of the interesting entities in [`harvest_world`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestFixture {
    /// The worker.
    pub worker: EntityId,
    /// The food node it is assigned to.
    pub node: EntityId,
    /// The granary it deposits at.
    pub granary: EntityId,
}

/// One worker, one food node 20 units away, one granary 100 units away.
///
/// The worker is already assigned to the node.
///
/// # Panics
///
/// Panics if the default config cannot spawn the fixture.
#[must_use]
pub fn harvest_world(node_amount: i32) -> (World, HarvestFixture) {
    let mut world = World::new(GameConfig::default(), 1);
    let granary = world
        .spawn_building(PLAYER, BuildingKind::Granary, pos(100, 0), true)
        .expect("spawn granary");
    let worker = world
        .spawn_unit(PLAYER, UnitKind::Worker, pos(0, 0))
        .expect("spawn worker");
    let node = world.spawn_resource_node(ResourceKind::Food, pos(20, 0), fixed(node_amount));
    world.assign_worker(worker, node).expect("assign worker");
    (
        world,
        HarvestFixture {
            worker,
            node,
            granary,
        },
    )
}

/// Two lines of `per_side` soldiers facing each other 30 units apart.
///
/// Every unit has already been ordered to attack the unit opposite it.
///
/// # Panics
///
/// Panics if the default config cannot spawn the fixture.
#[must_use]
pub fn battle(seed: u64, per_side: i32) -> Simulation {
    let mut sim = Simulation::new(GameConfig::default(), seed);
    let world = sim.world_mut();
    let roster = [UnitKind::Swordsman, UnitKind::Spearman, UnitKind::Archer];

    let mut pairs = Vec::new();
    for i in 0..per_side {
        let kind = roster[i as usize % roster.len()];
        let left = world
            .spawn_unit(PLAYER, kind, pos(0, i * 4))
            .expect("spawn left");
        let right = world
            .spawn_unit(AI, kind, pos(30, i * 4))
            .expect("spawn right");
        pairs.push((left, right));
    }
    for (left, right) in pairs {
        world.attack_target(left, right).expect("left attacks");
        world.attack_target(right, left).expect("right attacks");
    }
    sim
}

/// A player base against an AI base with workers, nodes and a commander.
///
/// # Panics
///
/// Panics if the default config cannot spawn the fixture.
#[must_use]
pub fn skirmish(seed: u64, commander: CommanderConfig) -> Simulation {
    let mut sim = Simulation::new(GameConfig::default(), seed);
    let world = sim.world_mut();

    let player_hq = world
        .spawn_building(PLAYER, BuildingKind::Headquarters, pos(0, 0), true)
        .expect("player hq");
    for i in 0..4 {
        world
            .spawn_unit(PLAYER, UnitKind::Swordsman, pos(10, i * 3))
            .expect("player guard");
    }

    world
        .spawn_building(AI, BuildingKind::Headquarters, pos(300, 0), true)
        .expect("ai hq");
    for i in 0..3 {
        world
            .spawn_unit(AI, UnitKind::Spearman, pos(285, 20 + i * 3))
            .expect("ai guard");
    }
    for i in 0..4 {
        world
            .spawn_unit(AI, UnitKind::Worker, pos(290, i * 4))
            .expect("ai worker");
    }
    world.spawn_resource_node(ResourceKind::Food, pos(270, -20), fixed(800));
    world.spawn_resource_node(ResourceKind::Gold, pos(270, 30), fixed(800));
    world.grant(AI, ResourceAmounts::new(600, 400));

    sim.add_commander(AiCommander::new(AI, commander, seed).with_player_hq(player_hq));
    sim
}
