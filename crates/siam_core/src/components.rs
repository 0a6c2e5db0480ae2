//! Entity data definitions.
//!
//! Units are plain data plus a small amount of order bookkeeping. All
//! behavior lives in [`crate::unit_state`] and the world systems.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::unit_state::UnitState;

/// Unique identifier for entities (units, buildings and resource nodes).
pub type EntityId = u64;

/// Team an entity fights for.
///
/// Entities on different teams are enemies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub u8);

impl TeamId {
    /// Check whether `other` is an enemy of this team.
    #[must_use]
    pub fn is_enemy_of(self, other: Self) -> bool {
        self != other
    }
}

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "team-{}", self.0)
    }
}

/// Unit archetypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitKind {
    /// Peasant labourer - harvests food and gold, barely fights.
    Worker,
    /// Sword-and-shield infantry.
    Swordsman,
    /// Pike infantry, heavier armor.
    Spearman,
    /// Bow infantry with long range.
    Archer,
    /// War elephant - slow, very durable, hits hard.
    Elephant,
}

impl UnitKind {
    /// Every unit kind, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Worker,
        Self::Swordsman,
        Self::Spearman,
        Self::Archer,
        Self::Elephant,
    ];

    /// Workers harvest; everything else counts as army.
    #[must_use]
    pub const fn is_worker(self) -> bool {
        matches!(self, Self::Worker)
    }

    /// Stable lowercase name used in logs and data files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::Swordsman => "swordsman",
            Self::Spearman => "spearman",
            Self::Archer => "archer",
            Self::Elephant => "elephant",
        }
    }
}

/// Health component for damageable entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    #[serde(with = "fixed_serde")]
    pub current: Fixed,
    /// Maximum health points.
    #[serde(with = "fixed_serde")]
    pub max: Fixed,
}

impl Health {
    /// Create new health component at full health.
    #[must_use]
    pub const fn new(max: Fixed) -> Self {
        Self { current: max, max }
    }

    /// Check if entity is dead (health at or below zero).
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.current <= Fixed::ZERO
    }

    /// Apply damage, returning the health actually removed.
    pub fn apply_damage(&mut self, amount: Fixed) -> Fixed {
        let amount = amount.max(Fixed::ZERO);
        let before = self.current;
        self.current = self.current.saturating_sub(amount);
        before - self.current.max(Fixed::ZERO)
    }

    /// Fraction of health remaining, in `[0, 1]`.
    #[must_use]
    pub fn fraction(&self) -> Fixed {
        if self.max <= Fixed::ZERO {
            return Fixed::ZERO;
        }
        (self.current / self.max).clamp(Fixed::ZERO, Fixed::from_num(1))
    }
}

/// Combat and movement statistics of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    /// Damage dealt per successful strike before armor.
    #[serde(with = "fixed_serde")]
    pub attack_damage: Fixed,
    /// Maximum strike distance in world units.
    #[serde(with = "fixed_serde")]
    pub attack_range: Fixed,
    /// Seconds between strikes.
    #[serde(with = "fixed_serde")]
    pub attack_rate: Fixed,
    /// World units per second.
    #[serde(with = "fixed_serde")]
    pub move_speed: Fixed,
    /// Armor rating; see [`crate::combat::calculate_damage`].
    #[serde(with = "fixed_serde")]
    pub armor: Fixed,
    /// Base accuracy in percent before distance and cover penalties.
    #[serde(with = "fixed_serde")]
    pub accuracy: Fixed,
}

impl Default for UnitStats {
    fn default() -> Self {
        Self {
            attack_damage: Fixed::from_num(10),
            attack_range: Fixed::from_num(2),
            attack_rate: Fixed::from_num(1),
            move_speed: Fixed::from_num(3),
            armor: Fixed::ZERO,
            accuracy: Fixed::from_num(90),
        }
    }
}

/// A follow-up order executed once the unit becomes idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    /// Walk to a point.
    MoveTo(Vec2Fixed),
    /// Pursue and attack an entity.
    Attack(EntityId),
}

/// A mobile unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Unique identifier.
    pub id: EntityId,
    /// Owning team.
    pub team: TeamId,
    /// Archetype.
    pub kind: UnitKind,
    /// World position.
    pub position: Vec2Fixed,
    /// Hit points.
    pub health: Health,
    /// Combat and movement stats.
    pub stats: UnitStats,
    /// Whether the unit currently benefits from cover.
    pub in_cover: bool,
    /// Current state machine state.
    pub state: UnitState,
    /// Orders to run after the current one finishes.
    pub orders: VecDeque<Order>,
}

impl Unit {
    /// Create an idle unit at full health.
    #[must_use]
    pub fn new(
        id: EntityId,
        team: TeamId,
        kind: UnitKind,
        position: Vec2Fixed,
        max_health: Fixed,
        stats: UnitStats,
    ) -> Self {
        Self {
            id,
            team,
            kind,
            position,
            health: Health::new(max_health),
            stats,
            in_cover: false,
            state: UnitState::Idle,
            orders: VecDeque::new(),
        }
    }

    /// Cancel whatever the unit is doing and walk to `destination`.
    ///
    /// Drops the current target and any queued orders.
    pub fn move_to(&mut self, destination: Vec2Fixed) {
        self.orders.clear();
        self.state = UnitState::Move { destination };
    }

    /// Start chasing `target`.
    ///
    /// Always enters [`UnitState::Chase`]; the chase step switches to
    /// attacking once the target is in range.
    pub fn attack(&mut self, target: EntityId) {
        self.orders.clear();
        self.state = UnitState::Chase { target };
    }

    /// Append an order to run after the current one.
    pub fn queue(&mut self, order: Order) {
        self.orders.push_back(order);
    }

    /// Start the next queued order if the unit is idle.
    ///
    /// Returns `true` if an order was started.
    pub fn start_next_order(&mut self) -> bool {
        if !matches!(self.state, UnitState::Idle) {
            return false;
        }
        match self.orders.pop_front() {
            Some(Order::MoveTo(destination)) => {
                self.state = UnitState::Move { destination };
                true
            }
            Some(Order::Attack(target)) => {
                self.state = UnitState::Chase { target };
                true
            }
            None => false,
        }
    }

    /// Subtract `amount` from current HP.
    ///
    /// Returns `true` when the unit has died and must be destroyed.
    pub fn take_damage(&mut self, amount: Fixed) -> bool {
        self.health.apply_damage(amount);
        self.health.is_dead()
    }

    /// Current attack target, if chasing or attacking.
    #[must_use]
    pub fn target(&self) -> Option<EntityId> {
        self.state.target()
    }

    /// Whether the unit is currently travelling.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        matches!(self.state, UnitState::Move { .. } | UnitState::Chase { .. })
    }

    /// Idle with nothing queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self.state, UnitState::Idle) && self.orders.is_empty()
    }

    /// Whether this unit is a worker.
    #[must_use]
    pub fn is_worker(&self) -> bool {
        self.kind.is_worker()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soldier() -> Unit {
        Unit::new(
            1,
            TeamId(0),
            UnitKind::Swordsman,
            Vec2Fixed::ZERO,
            Fixed::from_num(100),
            UnitStats::default(),
        )
    }

    #[test]
    fn test_health_damage_and_death() {
        let mut health = Health::new(Fixed::from_num(100));
        assert_eq!(health.apply_damage(Fixed::from_num(30)), Fixed::from_num(30));
        assert!(!health.is_dead());
        assert_eq!(health.fraction(), Fixed::from_num(7) / Fixed::from_num(10));

        health.apply_damage(Fixed::from_num(500));
        assert!(health.is_dead());
        assert_eq!(health.fraction(), Fixed::ZERO);
    }

    #[test]
    fn test_negative_damage_is_ignored() {
        let mut health = Health::new(Fixed::from_num(50));
        assert_eq!(health.apply_damage(Fixed::from_num(-10)), Fixed::ZERO);
        assert_eq!(health.current, Fixed::from_num(50));
    }

    #[test]
    fn test_move_to_cancels_target_and_orders() {
        let mut unit = soldier();
        unit.attack(7);
        unit.queue(Order::Attack(8));
        assert_eq!(unit.target(), Some(7));

        let destination = Vec2Fixed::from_ints(5, 5);
        unit.move_to(destination);
        assert_eq!(unit.target(), None);
        assert!(unit.orders.is_empty());
        assert_eq!(unit.state, UnitState::Move { destination });
    }

    #[test]
    fn test_attack_always_enters_chase() {
        let mut unit = soldier();
        unit.attack(9);
        assert_eq!(unit.state, UnitState::Chase { target: 9 });
    }

    #[test]
    fn test_queued_orders_start_when_idle() {
        let mut unit = soldier();
        let point = Vec2Fixed::from_ints(3, 0);
        unit.queue(Order::MoveTo(point));
        unit.queue(Order::Attack(4));

        assert!(unit.start_next_order());
        assert_eq!(unit.state, UnitState::Move { destination: point });
        // Busy units do not advance their queue.
        assert!(!unit.start_next_order());

        unit.state = UnitState::Idle;
        assert!(unit.start_next_order());
        assert_eq!(unit.target(), Some(4));
    }

    #[test]
    fn test_take_damage_reports_death() {
        let mut unit = soldier();
        assert!(!unit.take_damage(Fixed::from_num(99)));
        assert!(unit.take_damage(Fixed::from_num(1)));
    }
}
