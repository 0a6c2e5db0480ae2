//! Buildings, construction progress and training queues.
//!
//! A building is placed as a construction site and becomes usable once its
//! progress reaches the template's build time. Only complete buildings
//! train units, accept deposits or fire (towers).

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, Health, TeamId, UnitKind};
use crate::config::BuildingTemplate;
use crate::economy::ResourceKind;
use crate::error::{GameError, Result};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Building archetypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuildingKind {
    /// Palace compound; trains workers and stores everything.
    Headquarters,
    /// Trains the army.
    Barracks,
    /// Watchtower that shoots at nearby enemies.
    DefenseTower,
    /// Rice store.
    Granary,
    /// Gold store.
    Treasury,
}

impl BuildingKind {
    /// Every building kind.
    pub const ALL: [Self; 5] = [
        Self::Headquarters,
        Self::Barracks,
        Self::DefenseTower,
        Self::Granary,
        Self::Treasury,
    ];

    /// Stable lowercase name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Headquarters => "headquarters",
            Self::Barracks => "barracks",
            Self::DefenseTower => "defense_tower",
            Self::Granary => "granary",
            Self::Treasury => "treasury",
        }
    }
}

/// Ranged weapon mounted on a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerWeapon {
    /// Damage per strike before armor.
    #[serde(with = "fixed_serde")]
    pub attack_damage: Fixed,
    /// Maximum strike distance.
    #[serde(with = "fixed_serde")]
    pub attack_range: Fixed,
    /// Seconds between strikes.
    #[serde(with = "fixed_serde")]
    pub attack_rate: Fixed,
    /// Base accuracy in percent.
    #[serde(with = "fixed_serde")]
    pub accuracy: Fixed,
}

/// A unit being trained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingItem {
    /// Kind being trained.
    pub kind: UnitKind,
    /// Seconds of training left.
    #[serde(with = "fixed_serde")]
    pub remaining: Fixed,
}

/// FIFO of units waiting to be trained; only the head progresses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrainingQueue {
    items: VecDeque<TrainingItem>,
}

impl TrainingQueue {
    /// Maximum number of queued units per building.
    pub const MAX_QUEUE: usize = 5;

    /// Check if the queue is full.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.len() >= Self::MAX_QUEUE
    }

    /// Check if the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of queued units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    fn push(&mut self, item: TrainingItem) {
        self.items.push_back(item);
    }

    /// Advance the head by `dt`, popping it when done.
    fn advance(&mut self, dt: Fixed) -> Option<UnitKind> {
        let head = self.items.front_mut()?;
        head.remaining -= dt;
        if head.remaining <= Fixed::ZERO {
            self.items.pop_front().map(|item| item.kind)
        } else {
            None
        }
    }
}

/// A structure on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    /// Unique identifier.
    pub id: EntityId,
    /// Owning team.
    pub team: TeamId,
    /// Archetype.
    pub kind: BuildingKind,
    /// World position.
    pub position: Vec2Fixed,
    /// Hit points.
    pub health: Health,
    /// Armor rating.
    #[serde(with = "fixed_serde")]
    pub armor: Fixed,
    /// Seconds of construction done so far.
    #[serde(with = "fixed_serde")]
    pub build_progress: Fixed,
    /// Seconds of construction needed.
    #[serde(with = "fixed_serde")]
    pub build_time: Fixed,
    /// Resource kinds this building declares it stores.
    pub stores: Vec<ResourceKind>,
    /// Unit kinds this building can train.
    pub trains: Vec<UnitKind>,
    /// Units waiting to be trained.
    pub queue: TrainingQueue,
    /// Mounted weapon, if any.
    pub weapon: Option<TowerWeapon>,
    /// Seconds until the weapon can fire again.
    #[serde(with = "fixed_serde")]
    pub weapon_cooldown: Fixed,
}

impl Building {
    /// Create a construction site from a template.
    #[must_use]
    pub fn new(
        id: EntityId,
        team: TeamId,
        kind: BuildingKind,
        position: Vec2Fixed,
        template: &BuildingTemplate,
    ) -> Self {
        Self {
            id,
            team,
            kind,
            position,
            health: Health::new(template.max_health),
            armor: template.armor,
            build_progress: Fixed::ZERO,
            build_time: template.build_time,
            stores: template.stores.clone(),
            trains: template.trains.clone(),
            queue: TrainingQueue::default(),
            weapon: template.weapon,
            weapon_cooldown: Fixed::ZERO,
        }
    }

    /// Create an already finished building (scenario setup).
    #[must_use]
    pub fn completed(
        id: EntityId,
        team: TeamId,
        kind: BuildingKind,
        position: Vec2Fixed,
        template: &BuildingTemplate,
    ) -> Self {
        let mut building = Self::new(id, team, kind, position, template);
        building.build_progress = building.build_time;
        building
    }

    /// Check if construction is finished.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.build_progress >= self.build_time
    }

    /// Construction progress in `[0, 1]`.
    #[must_use]
    pub fn construction_fraction(&self) -> Fixed {
        if self.build_time <= Fixed::ZERO {
            return Fixed::ONE;
        }
        (self.build_progress / self.build_time).clamp(Fixed::ZERO, Fixed::ONE)
    }

    /// Advance construction by `dt`.
    ///
    /// Returns `true` on the tick construction finishes.
    pub fn advance_construction(&mut self, dt: Fixed) -> bool {
        if self.is_complete() {
            return false;
        }
        self.build_progress = (self.build_progress + dt).min(self.build_time);
        self.is_complete()
    }

    /// Check if this building can train `kind` at all.
    #[must_use]
    pub fn can_train(&self, kind: UnitKind) -> bool {
        self.trains.contains(&kind)
    }

    /// Add a unit to the training queue.
    ///
    /// Payment is the caller's job; this only validates the building.
    pub fn enqueue(&mut self, kind: UnitKind, train_time: Fixed) -> Result<()> {
        if !self.is_complete() {
            return Err(GameError::BuildingIncomplete(self.id));
        }
        if !self.can_train(kind) {
            return Err(GameError::CannotTrain {
                building: self.id,
                unit: kind.name().to_string(),
            });
        }
        if self.queue.is_full() {
            return Err(GameError::QueueFull(self.id));
        }
        self.queue.push(TrainingItem {
            kind,
            remaining: train_time,
        });
        Ok(())
    }

    /// Advance training by `dt`, returning a finished unit kind.
    pub fn advance_training(&mut self, dt: Fixed) -> Option<UnitKind> {
        if !self.is_complete() {
            return None;
        }
        self.queue.advance(dt)
    }

    /// Subtract `amount` from current HP.
    ///
    /// Returns `true` when the building has been destroyed.
    pub fn take_damage(&mut self, amount: Fixed) -> bool {
        self.health.apply_damage(amount);
        self.health.is_dead()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::ResourceAmounts;

    fn barracks_template() -> BuildingTemplate {
        BuildingTemplate {
            cost: ResourceAmounts::new(150, 100),
            max_health: Fixed::from_num(800),
            build_time: Fixed::from_num(10),
            armor: Fixed::from_num(50),
            stores: Vec::new(),
            trains: vec![UnitKind::Swordsman, UnitKind::Archer],
            weapon: None,
        }
    }

    fn site() -> Building {
        Building::new(
            1,
            TeamId(0),
            BuildingKind::Barracks,
            Vec2Fixed::ZERO,
            &barracks_template(),
        )
    }

    #[test]
    fn test_construction_completes_once() {
        let mut building = site();
        assert!(!building.is_complete());
        assert!(!building.advance_construction(Fixed::from_num(4)));
        assert_eq!(
            building.construction_fraction(),
            Fixed::from_num(2) / Fixed::from_num(5)
        );
        assert!(building.advance_construction(Fixed::from_num(7)));
        assert!(building.is_complete());
        assert_eq!(building.build_progress, building.build_time);
        assert!(!building.advance_construction(Fixed::from_num(1)));
    }

    #[test]
    fn test_incomplete_building_cannot_train() {
        let mut building = site();
        assert!(matches!(
            building.enqueue(UnitKind::Swordsman, Fixed::from_num(5)),
            Err(GameError::BuildingIncomplete(1))
        ));
    }

    #[test]
    fn test_enqueue_validates_kind_and_capacity() {
        let mut building = Building::completed(
            1,
            TeamId(0),
            BuildingKind::Barracks,
            Vec2Fixed::ZERO,
            &barracks_template(),
        );
        assert!(matches!(
            building.enqueue(UnitKind::Elephant, Fixed::from_num(5)),
            Err(GameError::CannotTrain { .. })
        ));

        for _ in 0..TrainingQueue::MAX_QUEUE {
            building
                .enqueue(UnitKind::Swordsman, Fixed::from_num(5))
                .expect("room in queue");
        }
        assert!(matches!(
            building.enqueue(UnitKind::Swordsman, Fixed::from_num(5)),
            Err(GameError::QueueFull(1))
        ));
    }

    #[test]
    fn test_training_is_fifo() {
        let mut building = Building::completed(
            1,
            TeamId(0),
            BuildingKind::Barracks,
            Vec2Fixed::ZERO,
            &barracks_template(),
        );
        building
            .enqueue(UnitKind::Archer, Fixed::from_num(2))
            .expect("enqueue archer");
        building
            .enqueue(UnitKind::Swordsman, Fixed::from_num(1))
            .expect("enqueue swordsman");

        assert_eq!(building.advance_training(Fixed::from_num(1)), None);
        assert_eq!(
            building.advance_training(Fixed::from_num(1)),
            Some(UnitKind::Archer)
        );
        // The second item only starts once it reaches the head.
        assert_eq!(
            building.advance_training(Fixed::from_num(1)),
            Some(UnitKind::Swordsman)
        );
        assert!(building.queue.is_empty());
    }

    #[test]
    fn test_building_destroyed_at_zero_hp() {
        let mut building = site();
        assert!(!building.take_damage(Fixed::from_num(799)));
        assert!(building.take_damage(Fixed::from_num(1)));
    }
}
