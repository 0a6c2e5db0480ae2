//! Resource harvesting and team stockpiles.
//!
//! Workers are attached to resource nodes through a [`WorkerAssignment`]
//! and cycle through a small state machine:
//!
//! ```text
//! MovingToResource -> Harvesting -> Returning -> Depositing
//!        ^                                         |
//!        +----------- node has stock left ---------+
//!                                                  |
//!                FindNewResource <---- node empty -+
//!                      |
//!                      +-> nearest node of same kind, or unassigned (idle)
//! ```
//!
//! The economy never owns units or buildings. It reaches them through the
//! [`HarvestHost`] trait, which the world implements and tests can fake.
//! Exactly one state transition happens per worker per tick.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, TeamId};
use crate::error::{GameError, Result};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Harvestable resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Rice and livestock; feeds troops.
    Food,
    /// Precious metal; pays for buildings and elite units.
    Gold,
}

impl ResourceKind {
    /// Every resource kind.
    pub const ALL: [Self; 2] = [Self::Food, Self::Gold];

    /// Lowercase name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Gold => "gold",
        }
    }
}

/// One fixed-point quantity per resource kind.
///
/// Used for stockpiles, costs and per-kind tuning tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceAmounts {
    /// Food quantity.
    #[serde(with = "fixed_serde", default)]
    pub food: Fixed,
    /// Gold quantity.
    #[serde(with = "fixed_serde", default)]
    pub gold: Fixed,
}

impl ResourceAmounts {
    /// Nothing of anything.
    pub const ZERO: Self = Self {
        food: Fixed::ZERO,
        gold: Fixed::ZERO,
    };

    /// Create from whole-number quantities.
    #[must_use]
    pub fn new(food: i32, gold: i32) -> Self {
        Self {
            food: Fixed::from_num(food),
            gold: Fixed::from_num(gold),
        }
    }

    /// Quantity of one kind.
    #[must_use]
    pub const fn get(&self, kind: ResourceKind) -> Fixed {
        match kind {
            ResourceKind::Food => self.food,
            ResourceKind::Gold => self.gold,
        }
    }

    /// Mutable quantity of one kind.
    pub fn get_mut(&mut self, kind: ResourceKind) -> &mut Fixed {
        match kind {
            ResourceKind::Food => &mut self.food,
            ResourceKind::Gold => &mut self.gold,
        }
    }

    /// Add to one kind.
    pub fn add(&mut self, kind: ResourceKind, amount: Fixed) {
        *self.get_mut(kind) += amount;
    }

    /// Check if every component of `cost` is covered.
    #[must_use]
    pub fn can_afford(&self, cost: &Self) -> bool {
        ResourceKind::ALL
            .iter()
            .all(|&kind| self.get(kind) >= cost.get(kind))
    }

    /// Pay `cost`, or fail without changing anything.
    pub fn spend(&mut self, cost: &Self) -> Result<()> {
        if let Some(&kind) = ResourceKind::ALL
            .iter()
            .find(|&&kind| self.get(kind) < cost.get(kind))
        {
            return Err(GameError::InsufficientResources {
                resource: kind.name().to_string(),
                required: cost.get(kind).to_string(),
                available: self.get(kind).to_string(),
            });
        }
        self.food -= cost.food;
        self.gold -= cost.gold;
        Ok(())
    }
}

/// A field, paddy or mine that workers harvest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Unique identifier.
    pub id: EntityId,
    /// What the node yields.
    pub kind: ResourceKind,
    /// Position in world space.
    pub position: Vec2Fixed,
    /// Stock left.
    #[serde(with = "fixed_serde")]
    pub amount: Fixed,
    /// Stock when full.
    #[serde(with = "fixed_serde")]
    pub max_amount: Fixed,
    /// Workers currently assigned here (back-references only).
    pub workers_assigned: Vec<EntityId>,
}

impl ResourceNode {
    /// Create a full node.
    #[must_use]
    pub fn new(id: EntityId, kind: ResourceKind, position: Vec2Fixed, amount: Fixed) -> Self {
        Self {
            id,
            kind,
            position,
            amount,
            max_amount: amount,
            workers_assigned: Vec::new(),
        }
    }

    /// Check if this node is depleted.
    #[must_use]
    pub fn is_depleted(&self) -> bool {
        self.amount <= Fixed::ZERO
    }

    /// Extract up to `requested`, returning what was actually taken.
    pub fn extract(&mut self, requested: Fixed) -> Fixed {
        let extracted = requested.min(self.amount).max(Fixed::ZERO);
        self.amount -= extracted;
        extracted
    }
}

/// Worker harvesting state.
///
/// A worker with no assignment is idle; there is no `Idle` variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// Walking to the assigned node.
    MovingToResource,
    /// Gathering at the node.
    Harvesting,
    /// Carrying the load back to storage.
    Returning,
    /// Unloading at storage.
    Depositing,
    /// Assigned node is empty; look for another of the same kind.
    FindNewResource,
}

/// A worker's harvesting job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerAssignment {
    /// The worker.
    pub worker: EntityId,
    /// Node being harvested.
    pub node: EntityId,
    /// Current state.
    pub state: WorkerState,
    /// Amount currently carried.
    #[serde(with = "fixed_serde")]
    pub carrying: Fixed,
    /// Kind of resource carried (the node's kind).
    pub carry_kind: ResourceKind,
    /// Building the load is being taken to.
    pub deposit_target: Option<EntityId>,
}

/// Harvesting tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Units gathered per second, per kind.
    pub harvest_rate: ResourceAmounts,
    /// Maximum carried load, per kind.
    pub carry_capacity: ResourceAmounts,
    /// Distance from a node at which harvesting can start.
    #[serde(with = "fixed_serde")]
    pub harvest_range: Fixed,
    /// Distance from storage at which a load can be dropped off.
    #[serde(with = "fixed_serde")]
    pub deposit_range: Fixed,
    /// Only deposit at buildings whose store list contains the carried kind.
    ///
    /// Off by default: any complete friendly building accepts any resource.
    #[serde(default)]
    pub enforce_storage_types: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            harvest_rate: ResourceAmounts::new(5, 3),
            carry_capacity: ResourceAmounts::new(10, 10),
            harvest_range: Fixed::from_num(40),
            deposit_range: Fixed::from_num(50),
            enforce_storage_types: false,
        }
    }
}

/// What the economy needs to know about a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerView {
    /// Current position.
    pub position: Vec2Fixed,
    /// Owning team.
    pub team: TeamId,
    /// Whether the worker is already walking somewhere.
    pub is_moving: bool,
}

/// A friendly building that might take deposits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositSite {
    /// Building id.
    pub id: EntityId,
    /// Building position.
    pub position: Vec2Fixed,
    /// Finished construction.
    pub is_complete: bool,
    /// Resource kinds the building declares it stores.
    pub stores: Vec<ResourceKind>,
}

/// Collaborators the harvesting state machine drives.
pub trait HarvestHost {
    /// Look up a living worker.
    fn worker(&self, id: EntityId) -> Option<WorkerView>;

    /// Send a worker walking to `destination`.
    fn order_move(&mut self, id: EntityId, destination: Vec2Fixed);

    /// Buildings owned by `team`.
    fn deposit_sites(&self, team: TeamId) -> Vec<DepositSite>;

    /// Add resources to the team stockpile.
    fn credit(&mut self, team: TeamId, kind: ResourceKind, amount: Fixed);
}

/// Events generated by the economy system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EconomyEvent {
    /// A worker gathered from a node.
    ResourceHarvested {
        /// The worker.
        worker: EntityId,
        /// The node.
        node: EntityId,
        /// Amount gathered.
        amount: Fixed,
    },
    /// A worker unloaded at storage.
    ResourceDeposited {
        /// The worker.
        worker: EntityId,
        /// Receiving building.
        building: EntityId,
        /// Team credited.
        team: TeamId,
        /// Kind deposited.
        kind: ResourceKind,
        /// Amount deposited.
        amount: Fixed,
    },
    /// A node ran out of stock.
    NodeDepleted {
        /// The node.
        node: EntityId,
    },
    /// A worker found no more work of its kind and was unassigned.
    WorkerIdle {
        /// The worker.
        worker: EntityId,
    },
    /// An assigned worker no longer exists; its job was dropped.
    WorkerLost {
        /// The worker.
        worker: EntityId,
    },
}

/// Resource nodes plus the worker assignment table.
///
/// Keeps the invariant that `node.workers_assigned` and the assignment
/// table describe the same relation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Economy {
    config: HarvestConfig,
    nodes: BTreeMap<EntityId, ResourceNode>,
    assignments: BTreeMap<EntityId, WorkerAssignment>,
}

impl Economy {
    /// Create an empty economy.
    #[must_use]
    pub fn new(config: HarvestConfig) -> Self {
        Self {
            config,
            nodes: BTreeMap::new(),
            assignments: BTreeMap::new(),
        }
    }

    /// Harvest tuning in use.
    #[must_use]
    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Register a resource node.
    pub fn add_node(&mut self, node: ResourceNode) {
        self.nodes.insert(node.id, node);
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, id: EntityId) -> Option<&ResourceNode> {
        self.nodes.get(&id)
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    /// Look up a worker's assignment.
    #[must_use]
    pub fn assignment(&self, worker: EntityId) -> Option<&WorkerAssignment> {
        self.assignments.get(&worker)
    }

    /// All assignments in worker id order.
    pub fn assignments(&self) -> impl Iterator<Item = &WorkerAssignment> {
        self.assignments.values()
    }

    /// Put a worker on a node, replacing any previous assignment.
    ///
    /// Anything the worker was carrying under a previous assignment is lost.
    /// The caller is responsible for checking the unit really is a worker.
    pub fn assign_worker(&mut self, worker: EntityId, node_id: EntityId) -> Result<()> {
        let node = self
            .nodes
            .get(&node_id)
            .ok_or(GameError::ResourceNodeNotFound(node_id))?;
        if node.is_depleted() {
            return Err(GameError::ResourceNodeDepleted(node_id));
        }
        let kind = node.kind;

        self.unassign_worker(worker);

        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.workers_assigned.push(worker);
        }
        self.assignments.insert(
            worker,
            WorkerAssignment {
                worker,
                node: node_id,
                state: WorkerState::MovingToResource,
                carrying: Fixed::ZERO,
                carry_kind: kind,
                deposit_target: None,
            },
        );
        tracing::debug!(worker, node = node_id, kind = kind.name(), "Worker assigned");
        Ok(())
    }

    /// Remove a worker's assignment and its node back-reference.
    pub fn unassign_worker(&mut self, worker: EntityId) -> Option<WorkerAssignment> {
        let assignment = self.assignments.remove(&worker)?;
        if let Some(node) = self.nodes.get_mut(&assignment.node) {
            node.workers_assigned.retain(|&w| w != worker);
        }
        Some(assignment)
    }

    /// Nearest node of `kind` with stock left, by Euclidean distance.
    #[must_use]
    pub fn find_new_resource(&self, kind: ResourceKind, position: Vec2Fixed) -> Option<EntityId> {
        self.nodes
            .values()
            .filter(|node| node.kind == kind && !node.is_depleted())
            .min_by_key(|node| (position.distance_squared(node.position), node.id))
            .map(|node| node.id)
    }

    /// Nearest complete friendly building to drop a load at.
    ///
    /// The building's declared store list only matters when
    /// [`HarvestConfig::enforce_storage_types`] is set.
    #[must_use]
    pub fn find_nearest_deposit_building(
        &self,
        sites: &[DepositSite],
        kind: ResourceKind,
        position: Vec2Fixed,
    ) -> Option<EntityId> {
        sites
            .iter()
            .filter(|site| site.is_complete)
            .filter(|site| !self.config.enforce_storage_types || site.stores.contains(&kind))
            .min_by_key(|site| (position.distance_squared(site.position), site.id))
            .map(|site| site.id)
    }

    /// Verify node back-references match the assignment table exactly.
    pub fn check_consistency(&self) -> Result<()> {
        for node in self.nodes.values() {
            for worker in &node.workers_assigned {
                if self.assignments.get(worker).map(|a| a.node) != Some(node.id) {
                    return Err(GameError::InvalidState(format!(
                        "node {} lists worker {worker} without a matching assignment",
                        node.id
                    )));
                }
            }
        }
        for assignment in self.assignments.values() {
            let listed = self
                .nodes
                .get(&assignment.node)
                .map_or(0, |n| n.workers_assigned.iter().filter(|&&w| w == assignment.worker).count());
            if listed != 1 {
                return Err(GameError::InvalidState(format!(
                    "worker {} is listed {listed} times on node {}",
                    assignment.worker, assignment.node
                )));
            }
        }
        Ok(())
    }

    /// Advance every assignment by one tick.
    pub fn update<H: HarvestHost>(&mut self, dt: Fixed, host: &mut H) -> Vec<EconomyEvent> {
        let mut events = Vec::new();
        let workers: Vec<EntityId> = self.assignments.keys().copied().collect();

        for worker_id in workers {
            let Some(worker) = host.worker(worker_id) else {
                // Polled liveness: dead workers are noticed here.
                self.unassign_worker(worker_id);
                events.push(EconomyEvent::WorkerLost { worker: worker_id });
                continue;
            };
            let Some(assignment) = self.assignments.get(&worker_id).copied() else {
                continue;
            };

            let next = match assignment.state {
                WorkerState::MovingToResource => self.step_moving(&assignment, &worker, host),
                WorkerState::Harvesting => {
                    self.step_harvesting(assignment, &worker, dt, host, &mut events)
                }
                WorkerState::Returning => self.step_returning(assignment, &worker, host),
                WorkerState::Depositing => self.step_depositing(assignment, &worker, host, &mut events),
                WorkerState::FindNewResource => {
                    self.step_find_new(assignment, &worker, host, &mut events);
                    continue;
                }
            };

            if let Some(slot) = self.assignments.get_mut(&worker_id) {
                if slot.state != next.state {
                    tracing::debug!(
                        worker = worker_id,
                        from = ?slot.state,
                        to = ?next.state,
                        "Worker state change"
                    );
                }
                *slot = next;
            }
        }

        events
    }

    fn step_moving<H: HarvestHost>(
        &self,
        assignment: &WorkerAssignment,
        worker: &WorkerView,
        host: &mut H,
    ) -> WorkerAssignment {
        let mut next = *assignment;
        match self.nodes.get(&assignment.node) {
            Some(node) if !node.is_depleted() => {
                if worker.position.within(node.position, self.config.harvest_range) {
                    next.state = WorkerState::Harvesting;
                } else if !worker.is_moving {
                    host.order_move(assignment.worker, node.position);
                }
            }
            _ => {
                next.state = if assignment.carrying > Fixed::ZERO {
                    WorkerState::Returning
                } else {
                    WorkerState::FindNewResource
                };
            }
        }
        next
    }

    fn step_harvesting<H: HarvestHost>(
        &mut self,
        assignment: WorkerAssignment,
        worker: &WorkerView,
        dt: Fixed,
        host: &mut H,
        events: &mut Vec<EconomyEvent>,
    ) -> WorkerAssignment {
        let mut next = assignment;
        let kind = assignment.carry_kind;
        let capacity = self.config.carry_capacity.get(kind);
        let rate = self.config.harvest_rate.get(kind);

        let Some(node) = self.nodes.get_mut(&assignment.node) else {
            next.state = if assignment.carrying > Fixed::ZERO {
                WorkerState::Returning
            } else {
                WorkerState::FindNewResource
            };
            return next;
        };

        let room = (capacity - assignment.carrying).max(Fixed::ZERO);
        let wanted = (rate * dt).min(room);
        let was_stocked = !node.is_depleted();
        let gathered = node.extract(wanted);
        next.carrying += gathered;

        if gathered > Fixed::ZERO {
            events.push(EconomyEvent::ResourceHarvested {
                worker: assignment.worker,
                node: node.id,
                amount: gathered,
            });
        }
        if was_stocked && node.is_depleted() {
            tracing::info!(node = node.id, kind = kind.name(), "Resource node depleted");
            events.push(EconomyEvent::NodeDepleted { node: node.id });
        }

        if next.carrying >= capacity || node.is_depleted() {
            next.state = WorkerState::Returning;
            let sites = host.deposit_sites(worker.team);
            next.deposit_target = self.find_nearest_deposit_building(&sites, kind, worker.position);
        }
        next
    }

    fn step_returning<H: HarvestHost>(
        &self,
        assignment: WorkerAssignment,
        worker: &WorkerView,
        host: &mut H,
    ) -> WorkerAssignment {
        let mut next = assignment;
        let sites = host.deposit_sites(worker.team);

        // The old target may have been destroyed since the last tick.
        let current = assignment
            .deposit_target
            .and_then(|id| sites.iter().find(|site| site.id == id && site.is_complete));
        let target = match current {
            Some(site) => Some((site.id, site.position)),
            None => self
                .find_nearest_deposit_building(&sites, assignment.carry_kind, worker.position)
                .and_then(|id| sites.iter().find(|site| site.id == id))
                .map(|site| (site.id, site.position)),
        };

        let Some((target_id, target_position)) = target else {
            // Nowhere to unload; wait for storage to appear.
            next.deposit_target = None;
            return next;
        };

        next.deposit_target = Some(target_id);
        if worker.position.within(target_position, self.config.deposit_range) {
            next.state = WorkerState::Depositing;
        } else if !worker.is_moving {
            host.order_move(assignment.worker, target_position);
        }
        next
    }

    fn step_depositing<H: HarvestHost>(
        &self,
        assignment: WorkerAssignment,
        worker: &WorkerView,
        host: &mut H,
        events: &mut Vec<EconomyEvent>,
    ) -> WorkerAssignment {
        let mut next = assignment;

        if assignment.carrying > Fixed::ZERO {
            host.credit(worker.team, assignment.carry_kind, assignment.carrying);
            events.push(EconomyEvent::ResourceDeposited {
                worker: assignment.worker,
                building: assignment.deposit_target.unwrap_or_default(),
                team: worker.team,
                kind: assignment.carry_kind,
                amount: assignment.carrying,
            });
        }
        next.carrying = Fixed::ZERO;
        next.deposit_target = None;

        match self.nodes.get(&assignment.node) {
            Some(node) if !node.is_depleted() => {
                next.state = WorkerState::MovingToResource;
                host.order_move(assignment.worker, node.position);
            }
            _ => next.state = WorkerState::FindNewResource,
        }
        next
    }

    fn step_find_new<H: HarvestHost>(
        &mut self,
        assignment: WorkerAssignment,
        worker: &WorkerView,
        host: &mut H,
        events: &mut Vec<EconomyEvent>,
    ) {
        let worker_id = assignment.worker;
        match self.find_new_resource(assignment.carry_kind, worker.position) {
            Some(node_id) => {
                if let Some(old) = self.nodes.get_mut(&assignment.node) {
                    old.workers_assigned.retain(|&w| w != worker_id);
                }
                let mut destination = None;
                if let Some(node) = self.nodes.get_mut(&node_id) {
                    node.workers_assigned.push(worker_id);
                    destination = Some(node.position);
                }
                if let Some(slot) = self.assignments.get_mut(&worker_id) {
                    slot.node = node_id;
                    slot.state = WorkerState::MovingToResource;
                }
                if let Some(destination) = destination {
                    host.order_move(worker_id, destination);
                }
                tracing::debug!(worker = worker_id, node = node_id, "Worker found new resource");
            }
            None => {
                self.unassign_worker(worker_id);
                events.push(EconomyEvent::WorkerIdle { worker: worker_id });
                tracing::info!(
                    worker = worker_id,
                    kind = assignment.carry_kind.name(),
                    "No resource left of this kind, worker idle"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fx(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn pos(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, y)
    }

    /// In-memory stand-in for the world.
    #[derive(Default)]
    struct FakeHost {
        workers: BTreeMap<EntityId, WorkerView>,
        sites: Vec<DepositSite>,
        pool: ResourceAmounts,
        moves: Vec<(EntityId, Vec2Fixed)>,
    }

    impl FakeHost {
        fn with_worker(id: EntityId, position: Vec2Fixed) -> Self {
            let mut host = Self::default();
            host.workers.insert(
                id,
                WorkerView {
                    position,
                    team: TeamId(0),
                    is_moving: false,
                },
            );
            host
        }

        fn place(&mut self, id: EntityId, position: Vec2Fixed) {
            if let Some(worker) = self.workers.get_mut(&id) {
                worker.position = position;
            }
        }
    }

    impl HarvestHost for FakeHost {
        fn worker(&self, id: EntityId) -> Option<WorkerView> {
            self.workers.get(&id).copied()
        }

        fn order_move(&mut self, id: EntityId, destination: Vec2Fixed) {
            self.moves.push((id, destination));
        }

        fn deposit_sites(&self, _team: TeamId) -> Vec<DepositSite> {
            self.sites.clone()
        }

        fn credit(&mut self, _team: TeamId, kind: ResourceKind, amount: Fixed) {
            self.pool.add(kind, amount);
        }
    }

    fn scenario_economy() -> Economy {
        let mut economy = Economy::new(HarvestConfig {
            harvest_rate: ResourceAmounts::new(5, 5),
            carry_capacity: ResourceAmounts::new(10, 10),
            ..HarvestConfig::default()
        });
        economy.add_node(ResourceNode::new(100, ResourceKind::Food, pos(0, 0), fx(50)));
        economy
    }

    fn granary(id: EntityId, position: Vec2Fixed) -> DepositSite {
        DepositSite {
            id,
            position,
            is_complete: true,
            stores: vec![ResourceKind::Food],
        }
    }

    #[test]
    fn test_resource_amounts_spend() {
        let mut pool = ResourceAmounts::new(100, 50);
        assert!(pool.can_afford(&ResourceAmounts::new(100, 50)));
        assert!(pool.spend(&ResourceAmounts::new(40, 10)).is_ok());
        assert_eq!(pool, ResourceAmounts::new(60, 40));

        let err = pool.spend(&ResourceAmounts::new(10, 80));
        assert!(matches!(err, Err(GameError::InsufficientResources { .. })));
        assert_eq!(pool, ResourceAmounts::new(60, 40));
    }

    #[test]
    fn test_node_extraction_never_negative() {
        let mut node = ResourceNode::new(1, ResourceKind::Gold, pos(0, 0), fx(8));
        assert_eq!(node.extract(fx(5)), fx(5));
        assert_eq!(node.extract(fx(5)), fx(3));
        assert_eq!(node.amount, Fixed::ZERO);
        assert_eq!(node.extract(fx(5)), Fixed::ZERO);
        assert!(node.is_depleted());
    }

    #[test]
    fn test_assign_keeps_back_references_consistent() {
        let mut economy = scenario_economy();
        economy.add_node(ResourceNode::new(101, ResourceKind::Gold, pos(9, 9), fx(50)));

        economy.assign_worker(1, 100).expect("assign");
        assert_eq!(economy.node(100).map(|n| n.workers_assigned.clone()), Some(vec![1]));

        // Reassigning moves the back-reference.
        economy.assign_worker(1, 101).expect("reassign");
        assert!(economy.node(100).is_some_and(|n| n.workers_assigned.is_empty()));
        assert_eq!(economy.node(101).map(|n| n.workers_assigned.clone()), Some(vec![1]));
        assert_eq!(economy.assignments().count(), 1);
        assert!(economy.check_consistency().is_ok());

        economy.unassign_worker(1);
        assert!(economy.node(101).is_some_and(|n| n.workers_assigned.is_empty()));
        assert!(economy.assignment(1).is_none());
    }

    #[test]
    fn test_assign_rejects_missing_or_empty_node() {
        let mut economy = scenario_economy();
        assert!(matches!(
            economy.assign_worker(1, 999),
            Err(GameError::ResourceNodeNotFound(999))
        ));

        economy.add_node(ResourceNode::new(7, ResourceKind::Food, pos(0, 0), Fixed::ZERO));
        assert!(matches!(
            economy.assign_worker(1, 7),
            Err(GameError::ResourceNodeDepleted(7))
        ));
    }

    #[test]
    fn test_harvest_scenario_caps_at_carry_capacity() {
        let mut economy = scenario_economy();
        let mut host = FakeHost::with_worker(1, pos(0, 0));
        economy.assign_worker(1, 100).expect("assign");

        // Arrival tick: only the transition happens.
        economy.update(fx(1), &mut host);
        assert_eq!(
            economy.assignment(1).map(|a| a.state),
            Some(WorkerState::Harvesting)
        );

        economy.update(fx(1), &mut host);
        economy.update(fx(1), &mut host);

        let assignment = economy.assignment(1).copied().expect("assignment");
        assert_eq!(assignment.carrying, fx(10));
        assert_eq!(economy.node(100).map(|n| n.amount), Some(fx(40)));
        assert_eq!(assignment.state, WorkerState::Returning);
    }

    #[test]
    fn test_harvest_never_exceeds_node_stock() {
        let mut economy = scenario_economy();
        economy.add_node(ResourceNode::new(5, ResourceKind::Food, pos(0, 0), fx(3)));
        let mut host = FakeHost::with_worker(1, pos(0, 0));
        economy.assign_worker(1, 5).expect("assign");

        economy.update(fx(1), &mut host);
        let events = economy.update(fx(1), &mut host);

        assert_eq!(economy.node(5).map(|n| n.amount), Some(Fixed::ZERO));
        assert_eq!(economy.assignment(1).map(|a| a.carrying), Some(fx(3)));
        assert!(events.contains(&EconomyEvent::NodeDepleted { node: 5 }));
        assert_eq!(
            economy.assignment(1).map(|a| a.state),
            Some(WorkerState::Returning)
        );
    }

    #[test]
    fn test_full_cycle_deposits_exact_amount() {
        let mut economy = scenario_economy();
        let mut host = FakeHost::with_worker(1, pos(0, 0));
        host.sites.push(granary(200, pos(300, 0)));
        economy.assign_worker(1, 100).expect("assign");

        for _ in 0..3 {
            economy.update(fx(1), &mut host);
        }
        assert_eq!(economy.assignment(1).map(|a| a.deposit_target), Some(Some(200)));

        // Far from storage: the worker is sent walking.
        economy.update(fx(1), &mut host);
        assert!(host.moves.contains(&(1, pos(300, 0))));

        host.place(1, pos(290, 0));
        economy.update(fx(1), &mut host);
        assert_eq!(
            economy.assignment(1).map(|a| a.state),
            Some(WorkerState::Depositing)
        );

        let events = economy.update(fx(1), &mut host);
        assert_eq!(host.pool.food, fx(10));
        assert_eq!(economy.assignment(1).map(|a| a.carrying), Some(Fixed::ZERO));
        assert!(events.iter().any(|e| matches!(
            e,
            EconomyEvent::ResourceDeposited { building: 200, amount, .. } if *amount == fx(10)
        )));
        // Stock remains, so back to the node.
        assert_eq!(
            economy.assignment(1).map(|a| a.state),
            Some(WorkerState::MovingToResource)
        );
    }

    #[test]
    fn test_depleted_node_finds_nearest_same_kind() {
        let mut economy = scenario_economy();
        economy.add_node(ResourceNode::new(5, ResourceKind::Food, pos(0, 0), fx(4)));
        economy.add_node(ResourceNode::new(6, ResourceKind::Gold, pos(1, 0), fx(100)));
        economy.add_node(ResourceNode::new(7, ResourceKind::Food, pos(80, 0), fx(100)));
        let mut host = FakeHost::with_worker(1, pos(0, 0));
        host.sites.push(granary(200, pos(0, 0)));
        economy.assign_worker(1, 5).expect("assign");

        // arrive, harvest (depletes), return, deposit
        for _ in 0..4 {
            economy.update(fx(1), &mut host);
        }
        assert_eq!(
            economy.assignment(1).map(|a| a.state),
            Some(WorkerState::FindNewResource)
        );

        economy.update(fx(1), &mut host);
        let assignment = economy.assignment(1).copied().expect("assignment");
        // Node 100 (food, at origin) is nearer than node 7; gold node 6 is ignored.
        assert_eq!(assignment.node, 100);
        assert_eq!(assignment.state, WorkerState::MovingToResource);
        assert!(economy.node(5).is_some_and(|n| n.workers_assigned.is_empty()));
        assert_eq!(economy.node(100).map(|n| n.workers_assigned.clone()), Some(vec![1]));
        assert!(economy.check_consistency().is_ok());
    }

    #[test]
    fn test_no_resource_left_unassigns_worker() {
        let mut economy = Economy::new(HarvestConfig::default());
        economy.add_node(ResourceNode::new(5, ResourceKind::Gold, pos(0, 0), fx(1)));
        let mut host = FakeHost::with_worker(1, pos(0, 0));
        host.sites.push(granary(200, pos(0, 0)));
        economy.assign_worker(1, 5).expect("assign");

        let mut events = Vec::new();
        for _ in 0..5 {
            events.extend(economy.update(fx(1), &mut host));
        }

        assert!(economy.assignment(1).is_none());
        assert!(events.contains(&EconomyEvent::WorkerIdle { worker: 1 }));
        assert_eq!(host.pool.gold, fx(1));
    }

    #[test]
    fn test_dead_worker_assignment_is_dropped() {
        let mut economy = scenario_economy();
        let mut host = FakeHost::default();
        economy.assign_worker(1, 100).expect("assign");

        let events = economy.update(fx(1), &mut host);
        assert!(events.contains(&EconomyEvent::WorkerLost { worker: 1 }));
        assert!(economy.assignment(1).is_none());
        assert!(economy.node(100).is_some_and(|n| n.workers_assigned.is_empty()));
    }

    #[test]
    fn test_deposit_ignores_store_types_by_default() {
        let economy = scenario_economy();
        let sites = vec![DepositSite {
            id: 9,
            position: pos(1, 1),
            is_complete: true,
            stores: vec![ResourceKind::Gold],
        }];
        assert_eq!(
            economy.find_nearest_deposit_building(&sites, ResourceKind::Food, pos(0, 0)),
            Some(9)
        );

        let strict = Economy::new(HarvestConfig {
            enforce_storage_types: true,
            ..HarvestConfig::default()
        });
        assert_eq!(
            strict.find_nearest_deposit_building(&sites, ResourceKind::Food, pos(0, 0)),
            None
        );
    }

    #[test]
    fn test_incomplete_buildings_do_not_take_deposits() {
        let economy = scenario_economy();
        let sites = vec![
            DepositSite {
                id: 1,
                position: pos(1, 0),
                is_complete: false,
                stores: vec![ResourceKind::Food],
            },
            granary(2, pos(50, 0)),
        ];
        assert_eq!(
            economy.find_nearest_deposit_building(&sites, ResourceKind::Food, pos(0, 0)),
            Some(2)
        );
    }
}
