//! The explicit game context.
//!
//! [`World`] owns every registry the systems touch: units, buildings, the
//! economy, team stockpiles, the id allocator and the combat RNG. Systems
//! are methods run by [`crate::simulation::Simulation`] in a fixed order and
//! always visit entities in ascending id order.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::buildings::{Building, BuildingKind};
use crate::combat::{calculate_damage, calculate_hit_chance, range_modifier, roll_hit};
use crate::components::{EntityId, Order, TeamId, Unit, UnitKind};
use crate::config::GameConfig;
use crate::economy::{
    DepositSite, Economy, HarvestHost, ResourceAmounts, ResourceKind, ResourceNode,
    WorkerAssignment, WorkerView,
};
use crate::error::{GameError, Result};
use crate::math::{fixed_serde, random_unit, Fixed, Vec2Fixed};
use crate::simulation::TickEvents;
use crate::unit_state::{StepInput, UnitAction, UnitState};

/// A successful strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageEvent {
    /// Unit or tower that struck.
    pub attacker: EntityId,
    /// Entity that was hit.
    pub target: EntityId,
    /// Damage after armor and range.
    pub amount: Fixed,
}

/// A unit that finished training.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainedEvent {
    /// Building that trained it.
    pub building: EntityId,
    /// The new unit.
    pub unit: EntityId,
    /// Its kind.
    pub kind: UnitKind,
}

#[derive(Debug, Clone, Copy)]
struct Weapon {
    attack_damage: Fixed,
    attack_range: Fixed,
    accuracy: Fixed,
}

/// Where a freshly trained unit appears relative to its building.
fn trained_unit_offset() -> Vec2Fixed {
    Vec2Fixed::from_ints(0, 6)
}

/// All simulation state outside the tick counter and commanders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    config: GameConfig,
    units: BTreeMap<EntityId, Unit>,
    buildings: BTreeMap<EntityId, Building>,
    economy: Economy,
    pools: BTreeMap<TeamId, ResourceAmounts>,
    next_id: EntityId,
    rng: ChaCha8Rng,
    #[serde(with = "fixed_serde")]
    elapsed: Fixed,
}

impl World {
    /// Create an empty world.
    ///
    /// `seed` drives every combat roll.
    #[must_use]
    pub fn new(config: GameConfig, seed: u64) -> Self {
        let economy = Economy::new(config.harvest.clone());
        Self {
            config,
            units: BTreeMap::new(),
            buildings: BTreeMap::new(),
            economy,
            pools: BTreeMap::new(),
            next_id: 1,
            rng: ChaCha8Rng::seed_from_u64(seed),
            elapsed: Fixed::ZERO,
        }
    }

    /// Rules in use.
    #[must_use]
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Seconds of game time simulated so far.
    #[must_use]
    pub fn elapsed(&self) -> Fixed {
        self.elapsed
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ------------------------------------------------------------------
    // Spawning
    // ------------------------------------------------------------------

    /// Spawn a unit from its template.
    pub fn spawn_unit(&mut self, team: TeamId, kind: UnitKind, position: Vec2Fixed) -> Result<EntityId> {
        let template = self.config.unit(kind)?;
        let (max_health, stats) = (template.max_health, template.stats);
        let id = self.allocate_id();
        self.units
            .insert(id, Unit::new(id, team, kind, position, max_health, stats));
        tracing::debug!(id, %team, kind = kind.name(), "Unit spawned");
        Ok(id)
    }

    /// Spawn a building for free, finished or as a construction site.
    pub fn spawn_building(
        &mut self,
        team: TeamId,
        kind: BuildingKind,
        position: Vec2Fixed,
        complete: bool,
    ) -> Result<EntityId> {
        let template = self.config.building(kind)?.clone();
        let id = self.allocate_id();
        let building = if complete {
            Building::completed(id, team, kind, position, &template)
        } else {
            Building::new(id, team, kind, position, &template)
        };
        self.buildings.insert(id, building);
        tracing::debug!(id, %team, kind = kind.name(), complete, "Building spawned");
        Ok(id)
    }

    /// Pay for and lay down a construction site.
    pub fn place_building(
        &mut self,
        team: TeamId,
        kind: BuildingKind,
        position: Vec2Fixed,
    ) -> Result<EntityId> {
        let cost = self.config.building(kind)?.cost;
        self.pools.entry(team).or_default().spend(&cost)?;
        let id = self.spawn_building(team, kind, position, false)?;
        tracing::info!(id, %team, kind = kind.name(), "Construction started");
        Ok(id)
    }

    /// Add a resource node to the map.
    pub fn spawn_resource_node(
        &mut self,
        kind: ResourceKind,
        position: Vec2Fixed,
        amount: Fixed,
    ) -> EntityId {
        let id = self.allocate_id();
        self.economy
            .add_node(ResourceNode::new(id, kind, position, amount));
        id
    }

    // ------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------

    /// Cancel a unit's orders and send it to `destination`.
    pub fn move_to(&mut self, unit: EntityId, destination: Vec2Fixed) -> Result<()> {
        self.units
            .get_mut(&unit)
            .ok_or(GameError::EntityNotFound(unit))?
            .move_to(destination);
        Ok(())
    }

    /// Order a unit to chase and attack `target`.
    pub fn attack_target(&mut self, unit: EntityId, target: EntityId) -> Result<()> {
        if !self.is_alive(target) {
            return Err(GameError::EntityNotFound(target));
        }
        self.units
            .get_mut(&unit)
            .ok_or(GameError::EntityNotFound(unit))?
            .attack(target);
        Ok(())
    }

    /// Append a follow-up order for when the unit next goes idle.
    pub fn queue_order(&mut self, unit: EntityId, order: Order) -> Result<()> {
        self.units
            .get_mut(&unit)
            .ok_or(GameError::EntityNotFound(unit))?
            .queue(order);
        Ok(())
    }

    /// Put a worker on a resource node.
    pub fn assign_worker(&mut self, worker: EntityId, node: EntityId) -> Result<()> {
        let unit = self
            .units
            .get(&worker)
            .ok_or(GameError::EntityNotFound(worker))?;
        if !unit.is_worker() {
            return Err(GameError::NotAWorker(worker));
        }
        self.economy.assign_worker(worker, node)
    }

    /// Take a worker off harvesting duty.
    pub fn unassign_worker(&mut self, worker: EntityId) -> Option<WorkerAssignment> {
        self.economy.unassign_worker(worker)
    }

    /// Queue a unit at a building, charging its cost up front.
    ///
    /// Nothing is charged if the building refuses the order.
    pub fn train_unit(&mut self, building: EntityId, kind: UnitKind) -> Result<()> {
        let template = self.config.unit(kind)?;
        let (cost, train_time) = (template.cost, template.train_time);
        let site = self
            .buildings
            .get_mut(&building)
            .ok_or(GameError::EntityNotFound(building))?;

        let pool = self.pools.entry(site.team).or_default();
        let mut after = *pool;
        after.spend(&cost)?;
        site.enqueue(kind, train_time)?;
        *pool = after;

        tracing::debug!(building, unit = kind.name(), "Training queued");
        Ok(())
    }

    /// Subtract HP from a unit or building, destroying it at zero.
    ///
    /// Returns `true` if the entity was destroyed.
    pub fn take_damage(&mut self, target: EntityId, amount: Fixed) -> Result<bool> {
        let died = if let Some(unit) = self.units.get_mut(&target) {
            unit.take_damage(amount)
        } else if let Some(building) = self.buildings.get_mut(&target) {
            building.take_damage(amount)
        } else {
            return Err(GameError::EntityNotFound(target));
        };

        if died {
            self.destroy(target);
        }
        Ok(died)
    }

    fn destroy(&mut self, id: EntityId) -> bool {
        if let Some(unit) = self.units.remove(&id) {
            if unit.is_worker() {
                self.economy.unassign_worker(id);
            }
            tracing::info!(id, team = %unit.team, kind = unit.kind.name(), "Unit destroyed");
            return true;
        }
        if let Some(building) = self.buildings.remove(&id) {
            tracing::info!(id, team = %building.team, kind = building.kind.name(), "Building destroyed");
            return true;
        }
        false
    }

    // ------------------------------------------------------------------
    // Stockpiles
    // ------------------------------------------------------------------

    /// A team's stockpile.
    #[must_use]
    pub fn pool(&self, team: TeamId) -> ResourceAmounts {
        self.pools.get(&team).copied().unwrap_or_default()
    }

    /// Add resources to a team's stockpile.
    pub fn grant(&mut self, team: TeamId, amounts: ResourceAmounts) {
        let pool = self.pools.entry(team).or_default();
        pool.food += amounts.food;
        pool.gold += amounts.gold;
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Look up a unit.
    #[must_use]
    pub fn unit(&self, id: EntityId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// All units in id order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Look up a building.
    #[must_use]
    pub fn building(&self, id: EntityId) -> Option<&Building> {
        self.buildings.get(&id)
    }

    /// All buildings in id order.
    pub fn buildings(&self) -> impl Iterator<Item = &Building> {
        self.buildings.values()
    }

    /// Resource nodes and worker assignments.
    #[must_use]
    pub fn economy(&self) -> &Economy {
        &self.economy
    }

    /// Position of a unit or building.
    #[must_use]
    pub fn position_of(&self, id: EntityId) -> Option<Vec2Fixed> {
        self.units
            .get(&id)
            .map(|u| u.position)
            .or_else(|| self.buildings.get(&id).map(|b| b.position))
    }

    /// Team of a unit or building.
    #[must_use]
    pub fn team_of(&self, id: EntityId) -> Option<TeamId> {
        self.units
            .get(&id)
            .map(|u| u.team)
            .or_else(|| self.buildings.get(&id).map(|b| b.team))
    }

    /// Whether a unit or building with this id exists.
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.units.contains_key(&id) || self.buildings.contains_key(&id)
    }

    /// Teams that still own at least one unit or building.
    #[must_use]
    pub fn surviving_teams(&self) -> Vec<TeamId> {
        let mut teams: Vec<TeamId> = self
            .units
            .values()
            .map(|u| u.team)
            .chain(self.buildings.values().map(|b| b.team))
            .collect();
        teams.sort_unstable();
        teams.dedup();
        teams
    }

    fn defence_of(&self, id: EntityId) -> Option<(Fixed, bool)> {
        self.units
            .get(&id)
            .map(|u| (u.stats.armor, u.in_cover))
            .or_else(|| self.buildings.get(&id).map(|b| (b.armor, false)))
    }

    // ------------------------------------------------------------------
    // Systems
    // ------------------------------------------------------------------

    pub(crate) fn advance_clock(&mut self, dt: Fixed) {
        self.elapsed += dt;
    }

    /// Step every unit's state machine and apply the resulting action.
    pub(crate) fn run_unit_system(&mut self, dt: Fixed, events: &mut TickEvents) {
        let ids: Vec<EntityId> = self.units.keys().copied().collect();
        let arrival_tolerance = self.config.arrival_tolerance;

        for id in ids {
            let Some(unit) = self.units.get_mut(&id) else {
                // Killed earlier this tick.
                continue;
            };
            unit.start_next_order();
            let (state, position, stats) = (unit.state, unit.position, unit.stats);

            let target_position = state.target().and_then(|t| self.position_of(t));
            let step = state.step(&StepInput {
                position,
                stats,
                target_position,
                dt,
                arrival_tolerance,
            });

            if let Some(unit) = self.units.get_mut(&id) {
                if unit.state.name() != step.next.name() {
                    tracing::debug!(
                        unit = id,
                        from = unit.state.name(),
                        to = step.next.name(),
                        "Unit state change"
                    );
                }
                unit.state = step.next;
                if let UnitAction::MoveTowards {
                    destination,
                    max_step,
                } = step.action
                {
                    unit.position = unit.position.move_towards(destination, max_step);
                }
            }

            if let UnitAction::Strike { target, distance } = step.action {
                let weapon = Weapon {
                    attack_damage: stats.attack_damage,
                    attack_range: stats.attack_range,
                    accuracy: stats.accuracy,
                };
                self.resolve_strike(id, weapon, target, distance, events);
            }
        }
    }

    /// Fire complete towers at the nearest enemy unit in range.
    pub(crate) fn run_tower_system(&mut self, dt: Fixed, events: &mut TickEvents) {
        let ids: Vec<EntityId> = self
            .buildings
            .values()
            .filter(|b| b.weapon.is_some() && b.is_complete())
            .map(|b| b.id)
            .collect();

        for id in ids {
            let Some(tower) = self.buildings.get_mut(&id) else {
                continue;
            };
            let Some(weapon) = tower.weapon else {
                continue;
            };
            if tower.weapon_cooldown > Fixed::ZERO {
                tower.weapon_cooldown -= dt;
                continue;
            }

            let (team, position) = (tower.team, tower.position);
            let target = self
                .units
                .values()
                .filter(|u| u.team.is_enemy_of(team))
                .filter(|u| position.within(u.position, weapon.attack_range))
                .min_by_key(|u| (position.distance_squared(u.position), u.id))
                .map(|u| (u.id, position.distance(u.position)));

            let Some((target, distance)) = target else {
                tower.weapon_cooldown = Fixed::ZERO;
                continue;
            };
            tower.weapon_cooldown += weapon.attack_rate;

            let weapon = Weapon {
                attack_damage: weapon.attack_damage,
                attack_range: weapon.attack_range,
                accuracy: weapon.accuracy,
            };
            self.resolve_strike(id, weapon, target, distance, events);
        }
    }

    fn resolve_strike(
        &mut self,
        attacker: EntityId,
        weapon: Weapon,
        target: EntityId,
        distance: Fixed,
        events: &mut TickEvents,
    ) {
        let Some((armor, in_cover)) = self.defence_of(target) else {
            return;
        };

        let chance = calculate_hit_chance(weapon.accuracy, distance, in_cover);
        let roll = random_unit(&mut self.rng);
        if !roll_hit(chance, roll) {
            tracing::trace!(attacker, target, "Strike missed");
            return;
        }

        let damage = calculate_damage(
            weapon.attack_damage,
            armor,
            range_modifier(distance, weapon.attack_range),
        );
        events.damage.push(DamageEvent {
            attacker,
            target,
            amount: damage,
        });
        if matches!(self.take_damage(target, damage), Ok(true)) {
            events.deaths.push(target);
        }
    }

    /// Drive the harvesting state machine.
    pub(crate) fn run_economy_system(&mut self, dt: Fixed, events: &mut TickEvents) {
        let mut host = WorldHarvestHost {
            units: &mut self.units,
            buildings: &self.buildings,
            pools: &mut self.pools,
        };
        events.economy.extend(self.economy.update(dt, &mut host));
    }

    /// Advance construction sites and training queues.
    pub(crate) fn run_production_system(&mut self, dt: Fixed, events: &mut TickEvents) {
        let mut finished = Vec::new();

        for building in self.buildings.values_mut() {
            if !building.is_complete() {
                if building.advance_construction(dt) {
                    tracing::info!(
                        id = building.id,
                        team = %building.team,
                        kind = building.kind.name(),
                        "Construction complete"
                    );
                    events.completed.push(building.id);
                }
                continue;
            }
            if let Some(kind) = building.advance_training(dt) {
                finished.push((
                    building.id,
                    building.team,
                    kind,
                    building.position + trained_unit_offset(),
                ));
            }
        }

        for (building, team, kind, position) in finished {
            match self.spawn_unit(team, kind, position) {
                Ok(unit) => {
                    tracing::info!(building, unit, kind = kind.name(), "Unit trained");
                    events.trained.push(TrainedEvent {
                        building,
                        unit,
                        kind,
                    });
                }
                Err(err) => tracing::warn!(building, %err, "Could not spawn trained unit"),
            }
        }
    }

    /// Remove anything left at or below zero HP.
    pub(crate) fn run_cleanup_system(&mut self, events: &mut TickEvents) {
        let dead: Vec<EntityId> = self
            .units
            .values()
            .filter(|u| u.health.is_dead())
            .map(|u| u.id)
            .chain(
                self.buildings
                    .values()
                    .filter(|b| b.health.is_dead())
                    .map(|b| b.id),
            )
            .collect();

        for id in dead {
            if self.destroy(id) {
                events.deaths.push(id);
            }
        }
    }

    /// Feed every piece of simulation state into `hasher` in id order.
    pub(crate) fn hash_state<H: Hasher>(&self, hasher: &mut H) {
        self.next_id.hash(hasher);
        self.elapsed.to_bits().hash(hasher);
        self.rng.get_word_pos().hash(hasher);

        self.units.len().hash(hasher);
        for unit in self.units.values() {
            unit.id.hash(hasher);
            unit.team.hash(hasher);
            unit.kind.hash(hasher);
            unit.position.x.to_bits().hash(hasher);
            unit.position.y.to_bits().hash(hasher);
            unit.health.current.to_bits().hash(hasher);
            unit.state.name().hash(hasher);
            unit.state.target().hash(hasher);
            match unit.state {
                UnitState::Move { destination } => {
                    destination.x.to_bits().hash(hasher);
                    destination.y.to_bits().hash(hasher);
                }
                UnitState::Attack { cooldown, .. } => cooldown.to_bits().hash(hasher),
                UnitState::Idle | UnitState::Chase { .. } => {}
            }
            unit.orders.len().hash(hasher);
        }

        self.buildings.len().hash(hasher);
        for building in self.buildings.values() {
            building.id.hash(hasher);
            building.team.hash(hasher);
            building.kind.hash(hasher);
            building.health.current.to_bits().hash(hasher);
            building.build_progress.to_bits().hash(hasher);
            building.queue.len().hash(hasher);
            building.weapon_cooldown.to_bits().hash(hasher);
        }

        for node in self.economy.nodes() {
            node.id.hash(hasher);
            node.amount.to_bits().hash(hasher);
            node.workers_assigned.hash(hasher);
        }
        for assignment in self.economy.assignments() {
            assignment.worker.hash(hasher);
            assignment.node.hash(hasher);
            (assignment.state as u8).hash(hasher);
            assignment.carrying.to_bits().hash(hasher);
        }

        for (team, pool) in &self.pools {
            team.hash(hasher);
            pool.food.to_bits().hash(hasher);
            pool.gold.to_bits().hash(hasher);
        }
    }
}

/// Split borrow of the world handed to the economy each tick.
struct WorldHarvestHost<'a> {
    units: &'a mut BTreeMap<EntityId, Unit>,
    buildings: &'a BTreeMap<EntityId, Building>,
    pools: &'a mut BTreeMap<TeamId, ResourceAmounts>,
}

impl HarvestHost for WorldHarvestHost<'_> {
    fn worker(&self, id: EntityId) -> Option<WorkerView> {
        self.units
            .get(&id)
            .filter(|u| u.is_worker())
            .map(|u| WorkerView {
                position: u.position,
                team: u.team,
                is_moving: u.is_moving(),
            })
    }

    fn order_move(&mut self, id: EntityId, destination: Vec2Fixed) {
        if let Some(unit) = self.units.get_mut(&id) {
            unit.move_to(destination);
        }
    }

    fn deposit_sites(&self, team: TeamId) -> Vec<DepositSite> {
        self.buildings
            .values()
            .filter(|b| b.team == team)
            .map(|b| DepositSite {
                id: b.id,
                position: b.position,
                is_complete: b.is_complete(),
                stores: b.stores.clone(),
            })
            .collect()
    }

    fn credit(&mut self, team: TeamId, kind: ResourceKind, amount: Fixed) {
        self.pools.entry(team).or_default().add(kind, amount);
    }
}
