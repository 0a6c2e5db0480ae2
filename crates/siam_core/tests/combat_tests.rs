//! Combat tests that run strikes through the world rather than the formulas.

use proptest::prelude::*;
use siam_core::buildings::BuildingKind;
use siam_core::combat::{calculate_damage, calculate_hit_chance, range_modifier};
use siam_core::components::UnitKind;
use siam_core::config::GameConfig;
use siam_core::math::Fixed;
use siam_core::simulation::Simulation;
use siam_core::unit_state::UnitState;
use siam_test_utils::determinism::strategies::arb_unit_kind;
use siam_test_utils::fixtures::{battle, fixed, pos, AI, PLAYER};

fn total_health(sim: &Simulation) -> Fixed {
    sim.world()
        .units()
        .map(|u| u.health.current)
        .fold(Fixed::ZERO, |acc, hp| acc + hp)
}

#[test]
fn test_battle_loses_health_and_buries_the_dead() {
    let mut sim = battle(7, 6);
    let before = total_health(&sim);

    let mut deaths = Vec::new();
    let mut hits = 0;
    for _ in 0..1200 {
        let events = sim.tick();
        hits += events.damage.len();
        deaths.extend(events.deaths);
        assert!(sim.world().units().all(|u| !u.health.is_dead()));
    }

    assert!(hits > 0);
    assert!(total_health(&sim) < before);
    assert!(!deaths.is_empty());
    assert!(deaths.iter().all(|&id| !sim.world().is_alive(id)));
}

#[test]
fn test_damage_events_stay_below_raw_damage() {
    let mut sim = battle(2, 3);
    for _ in 0..600 {
        for hit in sim.tick().damage {
            assert!(hit.amount > Fixed::ZERO);
            assert!(hit.amount <= fixed(12), "armor should soften every strike");
        }
    }
}

#[test]
fn test_survivors_go_idle_after_their_target_dies() {
    let mut sim = Simulation::new(GameConfig::default(), 5);
    let world = sim.world_mut();
    let elephant = world
        .spawn_unit(PLAYER, UnitKind::Elephant, pos(0, 0))
        .expect("elephant");
    let worker = world
        .spawn_unit(AI, UnitKind::Worker, pos(4, 0))
        .expect("worker");
    world.attack_target(elephant, worker).expect("attack");

    let mut killed_at = None;
    for tick in 0..2000 {
        if sim.tick().deaths.contains(&worker) {
            killed_at = Some(tick);
            break;
        }
    }
    assert!(killed_at.is_some());

    sim.tick();
    assert_eq!(
        sim.world().unit(elephant).map(|u| u.state),
        Some(UnitState::Idle)
    );
}

#[test]
fn test_tower_shoots_nearest_enemy_in_range() {
    let mut sim = Simulation::new(GameConfig::default(), 8);
    let world = sim.world_mut();
    let tower = world
        .spawn_building(AI, BuildingKind::DefenseTower, pos(0, 0), true)
        .expect("tower");
    let near = world
        .spawn_unit(PLAYER, UnitKind::Worker, pos(10, 0))
        .expect("near worker");
    let far = world
        .spawn_unit(PLAYER, UnitKind::Worker, pos(0, 60))
        .expect("far worker");
    world
        .spawn_unit(AI, UnitKind::Worker, pos(5, 0))
        .expect("friendly worker");

    let mut tower_hits = Vec::new();
    for _ in 0..1200 {
        let events = sim.tick();
        tower_hits.extend(
            events
                .damage
                .into_iter()
                .filter(|hit| hit.attacker == tower)
                .map(|hit| hit.target),
        );
    }

    assert!(!sim.world().is_alive(near));
    assert!(sim.world().is_alive(far));
    assert!(!tower_hits.is_empty());
    assert!(tower_hits.iter().all(|&target| target == near));
}

#[test]
fn test_unfinished_tower_holds_fire() {
    let mut sim = Simulation::new(GameConfig::default(), 8);
    let world = sim.world_mut();
    world
        .spawn_building(AI, BuildingKind::DefenseTower, pos(0, 0), false)
        .expect("tower site");
    let target = world
        .spawn_unit(PLAYER, UnitKind::Worker, pos(10, 0))
        .expect("worker");

    for _ in 0..200 {
        assert!(sim.tick().damage.is_empty());
    }
    assert!(sim.world().is_alive(target));
}

#[test]
fn test_attacking_a_dead_target_is_rejected() {
    let mut sim = Simulation::new(GameConfig::default(), 1);
    let world = sim.world_mut();
    let a = world
        .spawn_unit(PLAYER, UnitKind::Swordsman, pos(0, 0))
        .expect("a");
    let b = world.spawn_unit(AI, UnitKind::Worker, pos(2, 0)).expect("b");
    assert!(world.take_damage(b, fixed(500)).expect("b exists"));
    assert!(world.attack_target(a, b).is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_template_strikes_stay_in_bounds(
        attacker in arb_unit_kind(),
        defender in arb_unit_kind(),
        distance in 0i32..30,
        in_cover in any::<bool>(),
    ) {
        let config = GameConfig::default();
        let attack = config.unit(attacker).expect("attacker").stats;
        let defence = config.unit(defender).expect("defender").stats;
        let distance = Fixed::from_num(distance);

        let chance = calculate_hit_chance(attack.accuracy, distance, in_cover);
        prop_assert!(chance >= Fixed::ZERO && chance <= Fixed::from_num(100));

        let damage = calculate_damage(
            attack.attack_damage,
            defence.armor,
            range_modifier(distance, attack.attack_range),
        );
        prop_assert!(damage > Fixed::ZERO);
        prop_assert!(damage <= attack.attack_damage);
    }
}
