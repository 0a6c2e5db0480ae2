//! Simulation loop and state management.
//!
//! [`Simulation`] owns the [`World`] and every [`AiCommander`] and advances
//! them in a fixed order. Identical inputs and seeds always produce
//! identical [`Simulation::state_hash`] values.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::commander::{AiCommander, Decision};
use crate::components::{EntityId, TeamId};
use crate::config::GameConfig;
use crate::economy::EconomyEvent;
use crate::error::{GameError, Result};
use crate::math::Fixed;
use crate::world::{DamageEvent, TrainedEvent, World};

/// Events generated during a simulation tick.
#[derive(Debug, Clone, Default)]
pub struct TickEvents {
    /// Successful strikes.
    pub damage: Vec<DamageEvent>,
    /// Entities destroyed this tick.
    pub deaths: Vec<EntityId>,
    /// Construction sites that finished.
    pub completed: Vec<EntityId>,
    /// Units that came out of training.
    pub trained: Vec<TrainedEvent>,
    /// Commander decisions taken this tick.
    pub decisions: Vec<(TeamId, Decision)>,
    /// Harvesting events.
    pub economy: Vec<EconomyEvent>,
}

/// The core game simulation.
///
/// # System Execution Order
///
/// Each tick, systems run in this order:
/// 1. **Commanders** - AI teams decide and issue orders
/// 2. **Units** - state machines move units and resolve strikes
/// 3. **Towers** - finished towers fire at enemies in range
/// 4. **Economy** - worker harvesting state machines
/// 5. **Production** - construction sites and training queues
/// 6. **Cleanup** - anything left at zero HP is removed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    tick: u64,
    world: World,
    commanders: Vec<AiCommander>,
}

impl Simulation {
    /// Create a simulation with an empty world.
    ///
    /// # Example
    ///
    /// ```
    /// use siam_core::config::GameConfig;
    /// use siam_core::simulation::Simulation;
    ///
    /// let mut sim = Simulation::new(GameConfig::default(), 7);
    /// sim.tick();
    /// assert_eq!(sim.get_tick(), 1);
    /// ```
    #[must_use]
    pub fn new(config: GameConfig, seed: u64) -> Self {
        Self::from_world(World::new(config, seed))
    }

    /// Wrap an already populated world.
    #[must_use]
    pub fn from_world(world: World) -> Self {
        Self {
            tick: 0,
            world,
            commanders: Vec::new(),
        }
    }

    /// Add an AI commander. Commanders run in insertion order.
    pub fn add_commander(&mut self, commander: AiCommander) {
        self.commanders.push(commander);
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// The game state.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable game state, for issuing orders between ticks.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// AI commanders.
    #[must_use]
    pub fn commanders(&self) -> &[AiCommander] {
        &self.commanders
    }

    /// Advance by one fixed step of `1 / tick_rate` seconds.
    pub fn tick(&mut self) -> TickEvents {
        let dt = self.world.config().dt();
        self.tick_with(dt)
    }

    /// Advance by an explicit `dt` in seconds.
    pub fn tick_with(&mut self, dt: Fixed) -> TickEvents {
        let mut events = TickEvents::default();

        // 1. Commanders
        for commander in &mut self.commanders {
            if let Some(decision) = commander.update(&mut self.world, dt) {
                events.decisions.push((commander.team(), decision));
            }
        }

        // 2-3. Unit state machines, then towers
        self.world.run_unit_system(dt, &mut events);
        self.world.run_tower_system(dt, &mut events);

        // 4. Economy
        self.world.run_economy_system(dt, &mut events);

        // 5. Construction and training
        self.world.run_production_system(dt, &mut events);

        // 6. Death cleanup
        self.world.run_cleanup_system(&mut events);

        self.world.advance_clock(dt);
        self.tick += 1;

        #[cfg(feature = "debug-validation")]
        if let Err(err) = self.world.economy().check_consistency() {
            tracing::error!(tick = self.tick, %err, "Economy invariant violated");
            debug_assert!(false, "economy invariant violated: {err}");
        }

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::trace!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        events
    }

    /// Run `ticks` fixed steps, discarding events.
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Compute a hash of the current simulation state.
    ///
    /// Two simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        self.world.hash_state(&mut hasher);
        for commander in &self.commanders {
            commander.hash_state(&mut hasher);
        }
        hasher.finish()
    }

    /// Serialize the simulation state.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize simulation: {e}")))
    }

    /// Deserialize simulation state from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| {
            GameError::InvalidState(format!("Failed to deserialize simulation: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildings::BuildingKind;
    use crate::commander::CommanderConfig;
    use crate::components::UnitKind;
    use crate::economy::{ResourceAmounts, ResourceKind};
    use crate::math::Vec2Fixed;
    use crate::unit_state::UnitState;

    fn skirmish(seed: u64) -> Simulation {
        let mut sim = Simulation::new(GameConfig::default(), seed);
        let world = sim.world_mut();
        let player_hq = world
            .spawn_building(TeamId(0), BuildingKind::Headquarters, Vec2Fixed::ZERO, true)
            .expect("player hq");
        world
            .spawn_building(TeamId(1), BuildingKind::Headquarters, Vec2Fixed::from_ints(200, 0), true)
            .expect("ai hq");
        for i in 0..2 {
            world
                .spawn_unit(TeamId(1), UnitKind::Swordsman, Vec2Fixed::from_ints(180, 20 + i * 3))
                .expect("guard");
        }
        for i in 0..3 {
            let worker = world
                .spawn_unit(TeamId(1), UnitKind::Worker, Vec2Fixed::from_ints(190, i * 3))
                .expect("worker");
            let node = world.spawn_resource_node(
                ResourceKind::Food,
                Vec2Fixed::from_ints(170, i * 10),
                Fixed::from_num(300),
            );
            world.assign_worker(worker, node).expect("assign");
        }
        world.grant(TeamId(1), ResourceAmounts::new(500, 500));
        sim.add_commander(
            AiCommander::new(TeamId(1), CommanderConfig::balanced(), seed).with_player_hq(player_hq),
        );
        sim
    }

    #[test]
    fn test_tick_increments() {
        let mut sim = Simulation::new(GameConfig::default(), 1);
        sim.tick();
        sim.tick();
        assert_eq!(sim.get_tick(), 2);
        let dt = sim.world().config().dt();
        assert_eq!(sim.world().elapsed(), dt + dt);
    }

    #[test]
    fn test_movement_integration() {
        let mut sim = Simulation::new(GameConfig::default(), 1);
        let unit = sim
            .world_mut()
            .spawn_unit(TeamId(0), UnitKind::Swordsman, Vec2Fixed::ZERO)
            .expect("spawn");
        sim.world_mut()
            .move_to(unit, Vec2Fixed::from_ints(3, 0))
            .expect("move");

        // Speed 3 at 1s per tick: one tick to arrive, one to notice.
        sim.tick_with(Fixed::ONE);
        assert_eq!(
            sim.world().unit(unit).map(|u| u.position),
            Some(Vec2Fixed::from_ints(3, 0))
        );
        sim.tick_with(Fixed::ONE);
        assert_eq!(sim.world().unit(unit).map(|u| u.state), Some(UnitState::Idle));
    }

    #[test]
    fn test_duel_ends_with_target_gone_and_attacker_idle() {
        let mut sim = Simulation::new(GameConfig::default(), 9);
        let world = sim.world_mut();
        let elephant = world
            .spawn_unit(TeamId(0), UnitKind::Elephant, Vec2Fixed::ZERO)
            .expect("elephant");
        let worker = world
            .spawn_unit(TeamId(1), UnitKind::Worker, Vec2Fixed::from_ints(10, 0))
            .expect("worker");
        world.attack_target(elephant, worker).expect("attack");

        let mut deaths = Vec::new();
        for _ in 0..2000 {
            deaths.extend(sim.tick().deaths);
            if !sim.world().is_alive(worker) {
                break;
            }
        }
        assert_eq!(deaths, vec![worker]);

        sim.tick();
        assert_eq!(sim.world().unit(elephant).map(|u| u.state), Some(UnitState::Idle));
    }

    #[test]
    fn test_construction_then_training() {
        let mut sim = Simulation::new(GameConfig::default(), 1);
        let team = TeamId(0);
        sim.world_mut().grant(team, ResourceAmounts::new(1000, 1000));
        let barracks = sim
            .world_mut()
            .place_building(team, BuildingKind::Barracks, Vec2Fixed::ZERO)
            .expect("place");

        let mut completed = Vec::new();
        for _ in 0..30 {
            completed.extend(sim.tick_with(Fixed::ONE).completed);
        }
        assert_eq!(completed, vec![barracks]);

        sim.world_mut()
            .train_unit(barracks, UnitKind::Swordsman)
            .expect("train");
        let mut trained = Vec::new();
        for _ in 0..15 {
            trained.extend(sim.tick_with(Fixed::ONE).trained);
        }
        assert_eq!(trained.len(), 1);
        assert_eq!(trained[0].kind, UnitKind::Swordsman);
        assert!(sim.world().unit(trained[0].unit).is_some());
    }

    #[test]
    fn test_deterministic_hash() {
        let mut a = skirmish(5);
        let mut b = skirmish(5);
        for _ in 0..400 {
            a.tick();
            b.tick();
        }
        assert_eq!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn test_commander_decides_on_interval() {
        let mut sim = skirmish(5);
        let mut decisions = Vec::new();
        // 2 second interval at 20 ticks per second; 1/20 is truncated in
        // fixed point, so each decision lands one tick late.
        for _ in 0..100 {
            decisions.extend(sim.tick().decisions);
        }
        assert_eq!(decisions.len(), 2);
        assert!(decisions.iter().all(|(team, _)| *team == TeamId(1)));
        // No barracks yet, so the first decision is to build one.
        assert_eq!(decisions[0].1, Decision::BuildBarracks);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut sim = skirmish(11);
        for _ in 0..100 {
            sim.tick();
        }

        let bytes = sim.serialize().expect("serialize");
        let mut restored = Simulation::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored.state_hash(), sim.state_hash());

        for _ in 0..100 {
            sim.tick();
            restored.tick();
        }
        assert_eq!(restored.state_hash(), sim.state_hash());
    }
}
