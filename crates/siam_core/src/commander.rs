//! AI commander.
//!
//! A commander wakes every `decision_interval` seconds and:
//! 1. captures a [`ForceSnapshot`] of both sides,
//! 2. draws its [`DecisionRolls`] from its own seeded RNG,
//! 3. evaluates the priority ladder in [`decide`] (pure, first match wins),
//! 4. turns the [`Decision`] into world orders.
//!
//! The ladder, highest priority first:
//!
//! | Rule          | Condition                                                    |
//! |---------------|--------------------------------------------------------------|
//! | Retreat       | threat level > 2 and army size <= `retreat_threshold`        |
//! | Defend        | an enemy unit is within `defend_radius` of a friendly building |
//! | BuildBarracks | the team has no barracks                                     |
//! | BuildTower    | awareness >= 0.5, no tower yet, 30% roll                     |
//! | TrainUnits    | army size < `attack_threshold`                               |
//! | Attack        | army big enough and stronger than enemy x `aggression`       |
//! | Patrol        | otherwise                                                    |

use serde::{Deserialize, Serialize};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::buildings::BuildingKind;
use crate::components::{EntityId, Order, TeamId, UnitKind};
use crate::economy::ResourceKind;
use crate::math::{fixed_serde, percent, random_unit, Fixed, Vec2Fixed};
use crate::world::World;

/// Threat level reported when the commander has no army at all.
pub const MAX_THREAT: i32 = 999;

/// Threat level above which a small army retreats.
pub const RETREAT_THREAT_LEVEL: i32 = 2;

/// Units per squad.
pub const SQUAD_SIZE: usize = 4;

/// Personality and tuning of one AI commander.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommanderConfig {
    /// Seconds between decisions.
    #[serde(with = "fixed_serde")]
    pub decision_interval: Fixed,
    /// Enemy strength multiplier the army must beat before attacking.
    #[serde(with = "fixed_serde")]
    pub aggression: Fixed,
    /// 0 to 1; unlocks towers, smart targeting and flanking.
    #[serde(with = "fixed_serde")]
    pub tactical_awareness: Fixed,
    /// Army size at or below which a threatened commander retreats.
    pub retreat_threshold: usize,
    /// Army size needed before attacking.
    pub attack_threshold: usize,
    /// Radius around the base where enemies count for 1.5x.
    #[serde(with = "fixed_serde")]
    pub threat_radius: Fixed,
    /// Radius around friendly buildings that triggers a defence.
    #[serde(with = "fixed_serde")]
    pub defend_radius: Fixed,
    /// Sideways offset of each flanking half.
    #[serde(with = "fixed_serde")]
    pub flank_distance: Fixed,
    /// Half-width of the square patrol points are drawn from.
    #[serde(with = "fixed_serde")]
    pub patrol_radius: Fixed,
    /// Rally point relative to the base.
    pub rally_offset: Vec2Fixed,
    /// Distance between new buildings and the base.
    #[serde(with = "fixed_serde")]
    pub build_spacing: Fixed,
    /// Unit kinds the commander picks from when training.
    pub roster: Vec<UnitKind>,
    /// Put idle workers back to work every decision.
    pub auto_assign_workers: bool,
}

impl CommanderConfig {
    /// Turtles behind towers, attacks late.
    #[must_use]
    pub fn defensive() -> Self {
        Self {
            aggression: percent(150),
            tactical_awareness: percent(80),
            retreat_threshold: 5,
            attack_threshold: 15,
            roster: vec![UnitKind::Spearman, UnitKind::Archer, UnitKind::Archer],
            ..Self::balanced()
        }
    }

    /// Middle of the road.
    #[must_use]
    pub fn balanced() -> Self {
        Self {
            decision_interval: Fixed::from_num(2),
            aggression: Fixed::ONE,
            tactical_awareness: percent(60),
            retreat_threshold: 3,
            attack_threshold: 10,
            threat_radius: Fixed::from_num(50),
            defend_radius: Fixed::from_num(30),
            flank_distance: Fixed::from_num(20),
            patrol_radius: Fixed::from_num(40),
            rally_offset: Vec2Fixed::from_ints(12, 12),
            build_spacing: Fixed::from_num(15),
            roster: vec![
                UnitKind::Swordsman,
                UnitKind::Spearman,
                UnitKind::Archer,
                UnitKind::Elephant,
            ],
            auto_assign_workers: true,
        }
    }

    /// Attacks early with whatever it has.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            decision_interval: Fixed::from_num(1),
            aggression: percent(70),
            tactical_awareness: percent(40),
            retreat_threshold: 1,
            attack_threshold: 6,
            roster: vec![UnitKind::Swordsman, UnitKind::Elephant],
            ..Self::balanced()
        }
    }
}

impl Default for CommanderConfig {
    fn default() -> Self {
        Self::balanced()
    }
}

/// What the commander knows about one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitSummary {
    /// Unit id.
    pub id: EntityId,
    /// Archetype.
    pub kind: UnitKind,
    /// Position.
    pub position: Vec2Fixed,
    /// Current HP.
    pub health: Fixed,
    /// Current HP over max HP.
    pub health_fraction: Fixed,
    /// Base attack damage.
    pub attack_damage: Fixed,
    /// No orders and nothing queued.
    pub is_idle: bool,
}

/// What the commander knows about one building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildingSummary {
    /// Building id.
    pub id: EntityId,
    /// Archetype.
    pub kind: BuildingKind,
    /// Position.
    pub position: Vec2Fixed,
    /// Current HP.
    pub health: Fixed,
    /// Construction finished.
    pub is_complete: bool,
}

/// Both sides as seen at one decision tick. Rebuilt every time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForceSnapshot {
    /// Commander's team.
    pub team: TeamId,
    /// Friendly non-worker units.
    pub army: Vec<UnitSummary>,
    /// Friendly workers.
    pub workers: Vec<UnitSummary>,
    /// Friendly buildings, lowest id first.
    pub buildings: Vec<BuildingSummary>,
    /// Every enemy unit.
    pub enemy_units: Vec<UnitSummary>,
    /// Every enemy building.
    pub enemy_buildings: Vec<BuildingSummary>,
    /// Designated player headquarters, if still standing.
    pub player_hq: Option<EntityId>,
    /// Summed strength of the army.
    pub army_strength: Fixed,
    /// Summed, base-weighted strength of the enemy.
    pub enemy_strength: Fixed,
    /// `enemy_strength / army_strength`, or [`MAX_THREAT`] with no army.
    pub threat_level: Fixed,
}

/// Combat value of one unit: `hp_fraction * (attack * 0.5 + 50)`.
#[must_use]
pub fn unit_strength(health_fraction: Fixed, attack_damage: Fixed) -> Fixed {
    health_fraction * (attack_damage * percent(50) + Fixed::from_num(50))
}

/// Ratio of enemy to friendly strength, [`MAX_THREAT`] when the army is empty.
#[must_use]
pub fn threat_level(army_strength: Fixed, enemy_strength: Fixed) -> Fixed {
    if army_strength <= Fixed::ZERO {
        return Fixed::from_num(MAX_THREAT);
    }
    // A sliver of health left can push the ratio past the fixed-point range.
    enemy_strength
        .checked_div(army_strength)
        .unwrap_or(Fixed::from_num(MAX_THREAT))
}

impl ForceSnapshot {
    /// Assemble a snapshot and compute its strengths.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        team: TeamId,
        army: Vec<UnitSummary>,
        workers: Vec<UnitSummary>,
        buildings: Vec<BuildingSummary>,
        enemy_units: Vec<UnitSummary>,
        enemy_buildings: Vec<BuildingSummary>,
        player_hq: Option<EntityId>,
        config: &CommanderConfig,
    ) -> Self {
        let army_strength = army
            .iter()
            .map(|u| unit_strength(u.health_fraction, u.attack_damage))
            .fold(Fixed::ZERO, |acc, s| acc + s);

        let base = buildings.first().map(|b| b.position);
        let near_base_bonus = percent(150);
        let enemy_strength = enemy_units
            .iter()
            .map(|u| {
                let strength = unit_strength(u.health_fraction, u.attack_damage);
                match base {
                    Some(base) if base.within(u.position, config.threat_radius) => {
                        strength * near_base_bonus
                    }
                    _ => strength,
                }
            })
            .fold(Fixed::ZERO, |acc, s| acc + s);

        let player_hq = player_hq.filter(|hq| enemy_buildings.iter().any(|b| b.id == *hq));

        Self {
            team,
            army,
            workers,
            buildings,
            enemy_units,
            enemy_buildings,
            player_hq,
            army_strength,
            enemy_strength,
            threat_level: threat_level(army_strength, enemy_strength),
        }
    }

    /// Read both sides out of the world.
    #[must_use]
    pub fn capture(
        world: &World,
        team: TeamId,
        config: &CommanderConfig,
        player_hq: Option<EntityId>,
    ) -> Self {
        let mut army = Vec::new();
        let mut workers = Vec::new();
        let mut enemy_units = Vec::new();
        for unit in world.units() {
            let summary = UnitSummary {
                id: unit.id,
                kind: unit.kind,
                position: unit.position,
                health: unit.health.current,
                health_fraction: unit.health.fraction(),
                attack_damage: unit.stats.attack_damage,
                is_idle: unit.is_idle(),
            };
            if unit.team != team {
                enemy_units.push(summary);
            } else if unit.is_worker() {
                workers.push(summary);
            } else {
                army.push(summary);
            }
        }

        let (buildings, enemy_buildings): (Vec<_>, Vec<_>) = world
            .buildings()
            .map(|b| {
                (
                    b.team,
                    BuildingSummary {
                        id: b.id,
                        kind: b.kind,
                        position: b.position,
                        health: b.health.current,
                        is_complete: b.is_complete(),
                    },
                )
            })
            .partition(|(owner, _)| *owner == team);

        Self::from_parts(
            team,
            army,
            workers,
            buildings.into_iter().map(|(_, b)| b).collect(),
            enemy_units,
            enemy_buildings.into_iter().map(|(_, b)| b).collect(),
            player_hq,
            config,
        )
    }

    /// Position of the first friendly building, else the army's first unit.
    #[must_use]
    pub fn base_position(&self) -> Vec2Fixed {
        self.buildings
            .first()
            .map(|b| b.position)
            .or_else(|| self.army.first().map(|u| u.position))
            .unwrap_or(Vec2Fixed::ZERO)
    }

    /// Check whether the team owns a building of `kind`, finished or not.
    #[must_use]
    pub fn has_building(&self, kind: BuildingKind) -> bool {
        self.buildings.iter().any(|b| b.kind == kind)
    }

    /// Enemy unit closest to any friendly building, within `radius`.
    #[must_use]
    pub fn intruder(&self, radius: Fixed) -> Option<EntityId> {
        self.enemy_units
            .iter()
            .filter_map(|enemy| {
                self.buildings
                    .iter()
                    .map(|b| b.position.distance_squared(enemy.position))
                    .min()
                    .filter(|&d| d <= radius.saturating_mul(radius))
                    .map(|d| (d, enemy.id))
            })
            .min()
            .map(|(_, id)| id)
    }

    fn enemy_position(&self, id: EntityId) -> Option<Vec2Fixed> {
        self.enemy_units
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.position)
            .or_else(|| {
                self.enemy_buildings
                    .iter()
                    .find(|b| b.id == id)
                    .map(|b| b.position)
            })
    }
}

/// Random draws for one decision tick, taken in field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionRolls {
    /// Tower build chance roll.
    pub tower: Fixed,
    /// Flank chance roll.
    pub flank: Fixed,
    /// Roster pick.
    pub train: Fixed,
    /// Patrol point x.
    pub patrol_x: Fixed,
    /// Patrol point y.
    pub patrol_y: Fixed,
}

impl DecisionRolls {
    /// Draw all five values, every tick, so the stream never depends on the
    /// branch taken.
    pub fn draw<R: rand::Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            tower: random_unit(rng),
            flank: random_unit(rng),
            train: random_unit(rng),
            patrol_x: random_unit(rng),
            patrol_y: random_unit(rng),
        }
    }
}

/// The commander's order for this decision tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// Pull the whole army back to the rally point.
    Retreat,
    /// Send the whole army at an enemy near the base.
    Defend {
        /// Enemy to engage.
        intruder: EntityId,
    },
    /// Lay down a barracks.
    BuildBarracks,
    /// Lay down a defense tower.
    BuildTower,
    /// Queue a unit and rally idle troops.
    TrainUnits {
        /// Kind to train.
        kind: UnitKind,
    },
    /// Attack an enemy.
    Attack {
        /// Chosen target.
        target: EntityId,
        /// Split the army and come from both sides.
        flank: bool,
    },
    /// Walk idle squads to a point near the base.
    Patrol {
        /// Where to go.
        point: Vec2Fixed,
    },
}

impl Decision {
    /// Short name for logs and summaries.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Retreat => "retreat",
            Self::Defend { .. } => "defend",
            Self::BuildBarracks => "build_barracks",
            Self::BuildTower => "build_tower",
            Self::TrainUnits { .. } => "train_units",
            Self::Attack { .. } => "attack",
            Self::Patrol { .. } => "patrol",
        }
    }
}

/// Pick the attack target.
///
/// Sharp commanders (awareness > 0.7) go for the weakest enemy. Others go
/// for the player headquarters, then the first enemy they track.
#[must_use]
pub fn select_target(snapshot: &ForceSnapshot, config: &CommanderConfig) -> Option<EntityId> {
    if config.tactical_awareness > percent(70) {
        let weakest = snapshot
            .enemy_units
            .iter()
            .map(|u| (u.health, u.id))
            .chain(snapshot.enemy_buildings.iter().map(|b| (b.health, b.id)))
            .min()
            .map(|(_, id)| id);
        if weakest.is_some() {
            return weakest;
        }
    }

    snapshot
        .player_hq
        .or_else(|| snapshot.enemy_units.first().map(|u| u.id))
        .or_else(|| snapshot.enemy_buildings.first().map(|b| b.id))
}

/// Evaluate the priority ladder.
#[must_use]
pub fn decide(snapshot: &ForceSnapshot, config: &CommanderConfig, rolls: &DecisionRolls) -> Decision {
    let army_size = snapshot.army.len();

    if snapshot.threat_level > Fixed::from_num(RETREAT_THREAT_LEVEL)
        && army_size <= config.retreat_threshold
    {
        return Decision::Retreat;
    }

    if let Some(intruder) = snapshot.intruder(config.defend_radius) {
        return Decision::Defend { intruder };
    }

    if !snapshot.has_building(BuildingKind::Barracks) {
        return Decision::BuildBarracks;
    }

    if config.tactical_awareness >= percent(50)
        && !snapshot.has_building(BuildingKind::DefenseTower)
        && rolls.tower < percent(30)
    {
        return Decision::BuildTower;
    }

    if army_size < config.attack_threshold {
        let kind = if config.roster.is_empty() {
            UnitKind::Swordsman
        } else {
            let len = config.roster.len();
            let roll = rolls.train.clamp(Fixed::ZERO, Fixed::ONE - Fixed::DELTA);
            let index = (roll * Fixed::from_num(len)).to_num::<usize>();
            config.roster[index.min(len - 1)]
        };
        return Decision::TrainUnits { kind };
    }

    if snapshot.army_strength > snapshot.enemy_strength * config.aggression {
        if let Some(target) = select_target(snapshot, config) {
            return Decision::Attack {
                target,
                flank: rolls.flank < config.tactical_awareness,
            };
        }
    }

    let spread = |roll: Fixed| (roll * Fixed::from_num(2) - Fixed::ONE) * config.patrol_radius;
    let point = snapshot.base_position() + Vec2Fixed::new(spread(rolls.patrol_x), spread(rolls.patrol_y));
    Decision::Patrol { point }
}

/// Chunk the army into squads of [`SQUAD_SIZE`].
#[must_use]
pub fn squads(army: &[EntityId]) -> Vec<Vec<EntityId>> {
    army.chunks(SQUAD_SIZE).map(<[EntityId]>::to_vec).collect()
}

/// Slot for member `member` of squad `squad` around `anchor`.
///
/// Squads sit three to a row, eight units apart; members form a 2x2 block.
#[must_use]
pub fn formation_slot(anchor: Vec2Fixed, squad: usize, member: usize) -> Vec2Fixed {
    let column = (squad % 3) as i32 - 1;
    let row = (squad / 3) as i32;
    let dx = column * 8 + (member % 2) as i32 * 2;
    let dy = -row * 8 + (member / 2) as i32 * 2;
    anchor + Vec2Fixed::from_ints(dx, dy)
}

/// One AI-controlled team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiCommander {
    team: TeamId,
    config: CommanderConfig,
    rng: ChaCha8Rng,
    #[serde(with = "fixed_serde")]
    timer: Fixed,
    player_hq: Option<EntityId>,
    last_decision: Option<Decision>,
}

impl AiCommander {
    /// Create a commander with its own random stream.
    #[must_use]
    pub fn new(team: TeamId, config: CommanderConfig, seed: u64) -> Self {
        Self {
            team,
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            timer: Fixed::ZERO,
            player_hq: None,
            last_decision: None,
        }
    }

    /// Designate the building to go after when nothing smarter applies.
    #[must_use]
    pub fn with_player_hq(mut self, hq: EntityId) -> Self {
        self.player_hq = Some(hq);
        self
    }

    /// Team this commander plays.
    #[must_use]
    pub const fn team(&self) -> TeamId {
        self.team
    }

    /// Personality in use.
    #[must_use]
    pub fn config(&self) -> &CommanderConfig {
        &self.config
    }

    /// The most recent decision.
    #[must_use]
    pub const fn last_decision(&self) -> Option<Decision> {
        self.last_decision
    }

    /// Feed the commander's timer and random stream position into `hasher`.
    pub(crate) fn hash_state<H: std::hash::Hasher>(&self, hasher: &mut H) {
        use std::hash::Hash;
        self.team.hash(hasher);
        self.timer.to_bits().hash(hasher);
        self.rng.get_word_pos().hash(hasher);
        self.last_decision.map(|d| d.name()).hash(hasher);
    }

    /// Accumulate `dt` and decide once the interval has elapsed.
    pub fn update(&mut self, world: &mut World, dt: Fixed) -> Option<Decision> {
        self.timer += dt;
        if self.timer < self.config.decision_interval {
            return None;
        }
        self.timer -= self.config.decision_interval;

        let snapshot = ForceSnapshot::capture(world, self.team, &self.config, self.player_hq);
        let rolls = DecisionRolls::draw(&mut self.rng);
        let decision = decide(&snapshot, &self.config, &rolls);

        tracing::info!(
            team = %self.team,
            decision = decision.name(),
            army = snapshot.army.len(),
            threat = %snapshot.threat_level,
            "Commander decision"
        );

        if self.config.auto_assign_workers {
            assign_idle_workers(world, &snapshot);
        }
        self.execute(decision, &snapshot, world);
        self.last_decision = Some(decision);
        Some(decision)
    }

    fn rally_point(&self, snapshot: &ForceSnapshot) -> Vec2Fixed {
        snapshot.base_position() + self.config.rally_offset
    }

    fn execute(&self, decision: Decision, snapshot: &ForceSnapshot, world: &mut World) {
        let army: Vec<EntityId> = snapshot.army.iter().map(|u| u.id).collect();

        match decision {
            Decision::Retreat => {
                let rally = self.rally_point(snapshot);
                for id in army {
                    log_skip(world.move_to(id, rally), "retreat");
                }
            }
            Decision::Defend { intruder } => {
                for id in army {
                    log_skip(world.attack_target(id, intruder), "defend");
                }
            }
            Decision::BuildBarracks => self.build(BuildingKind::Barracks, snapshot, world),
            Decision::BuildTower => self.build(BuildingKind::DefenseTower, snapshot, world),
            Decision::TrainUnits { kind } => {
                let barracks = snapshot
                    .buildings
                    .iter()
                    .find(|b| b.kind == BuildingKind::Barracks && b.is_complete);
                match barracks {
                    Some(barracks) => log_skip(world.train_unit(barracks.id, kind), "train"),
                    None => tracing::debug!(team = %self.team, "No finished barracks to train at"),
                }
                let idle: Vec<EntityId> = snapshot
                    .army
                    .iter()
                    .filter(|u| u.is_idle)
                    .map(|u| u.id)
                    .collect();
                form_up(world, &idle, self.rally_point(snapshot));
            }
            Decision::Attack { target, flank } => {
                let Some(target_position) = snapshot.enemy_position(target) else {
                    return;
                };
                if flank && army.len() > 1 {
                    let heading = (target_position - snapshot.base_position()).normalize();
                    let side = heading.perpendicular().scale(self.config.flank_distance);
                    let (left, right) = army.split_at(army.len() / 2);
                    for (half, point) in [(left, target_position + side), (right, target_position - side)] {
                        for &id in half {
                            log_skip(world.move_to(id, point), "flank");
                            log_skip(world.queue_order(id, Order::Attack(target)), "flank");
                        }
                    }
                } else {
                    for id in army {
                        log_skip(world.attack_target(id, target), "attack");
                    }
                }
            }
            Decision::Patrol { point } => {
                let idle: Vec<EntityId> = snapshot
                    .army
                    .iter()
                    .filter(|u| u.is_idle)
                    .map(|u| u.id)
                    .collect();
                form_up(world, &idle, point);
            }
        }
    }

    fn build(&self, kind: BuildingKind, snapshot: &ForceSnapshot, world: &mut World) {
        let count = snapshot.buildings.len();
        let directions = [(1, 0), (0, 1), (-1, 0), (0, -1)];
        let (dx, dy) = directions[count % directions.len()];
        let ring = Fixed::from_num(1 + count / directions.len());
        let offset = Vec2Fixed::from_ints(dx, dy).scale(self.config.build_spacing * ring);
        let site = snapshot.base_position() + offset;

        match world.place_building(self.team, kind, site) {
            Ok(id) => tracing::info!(team = %self.team, id, kind = kind.name(), "Commander started building"),
            Err(err) => tracing::debug!(team = %self.team, kind = kind.name(), %err, "Cannot build yet"),
        }
    }
}

fn log_skip(result: crate::error::Result<()>, order: &'static str) {
    if let Err(err) = result {
        tracing::warn!(order, %err, "Order skipped");
    }
}

/// Move units into squad formation around `anchor`.
fn form_up(world: &mut World, units: &[EntityId], anchor: Vec2Fixed) {
    for (squad_index, squad) in squads(units).iter().enumerate() {
        for (member, &id) in squad.iter().enumerate() {
            log_skip(world.move_to(id, formation_slot(anchor, squad_index, member)), "form up");
        }
    }
}

/// Send idle, unassigned workers to the nearest node of the scarcer resource.
fn assign_idle_workers(world: &mut World, snapshot: &ForceSnapshot) {
    let pool = world.pool(snapshot.team);
    let preferred = if pool.food <= pool.gold {
        [ResourceKind::Food, ResourceKind::Gold]
    } else {
        [ResourceKind::Gold, ResourceKind::Food]
    };

    for worker in snapshot.workers.iter().filter(|w| w.is_idle) {
        if world.economy().assignment(worker.id).is_some() {
            continue;
        }
        let node = preferred
            .iter()
            .find_map(|&kind| world.economy().find_new_resource(kind, worker.position));
        if let Some(node) = node {
            match world.assign_worker(worker.id, node) {
                Ok(()) => tracing::debug!(team = %snapshot.team, worker = worker.id, node, "Idle worker assigned"),
                Err(err) => tracing::warn!(worker = worker.id, %err, "Could not assign worker"),
            }
        }
    }
}
