//! Combat resolution formulas.
//!
//! Stateless functions for damage falloff and hit chance:
//! - Diminishing-returns armor: `100 / (100 + armor)` never reaches zero
//! - Linear accuracy falloff with distance and a flat cover penalty
//! - Range modifier softening strikes delivered at the edge of range
//!
//! Percentages are on a 0-100 scale; multipliers are fractions.

use crate::math::{percent, Fixed};

/// Accuracy lost per world unit of distance, in percentage points.
pub const ACCURACY_FALLOFF_PER_UNIT: i32 = 2;

/// Flat accuracy penalty against a target in cover, in percentage points.
pub const COVER_PENALTY: i32 = 20;

/// Damage multiplier at the very edge of attack range, in percent.
pub const MIN_RANGE_MODIFIER_PERCENT: i32 = 50;

/// Damage after armor and range.
///
/// ```text
/// damage = base_damage * (100 / (100 + armor)) * range_modifier
/// ```
///
/// Negative armor and negative inputs are treated as zero, so the result is
/// never negative.
#[must_use]
pub fn calculate_damage(base_damage: Fixed, armor: Fixed, range_modifier: Fixed) -> Fixed {
    let hundred = Fixed::from_num(100);
    let armor = armor.max(Fixed::ZERO);
    let base_damage = base_damage.max(Fixed::ZERO);
    let range_modifier = range_modifier.max(Fixed::ZERO);

    let mitigation = hundred / (hundred + armor);
    base_damage * mitigation * range_modifier
}

/// Chance to hit in percent, clamped to `[0, 100]`.
///
/// ```text
/// hit_chance = base_accuracy - distance * 2 - (20 if in cover)
/// ```
#[must_use]
pub fn calculate_hit_chance(base_accuracy: Fixed, distance: Fixed, target_in_cover: bool) -> Fixed {
    let falloff = distance.max(Fixed::ZERO) * Fixed::from_num(ACCURACY_FALLOFF_PER_UNIT);
    let cover = if target_in_cover {
        Fixed::from_num(COVER_PENALTY)
    } else {
        Fixed::ZERO
    };

    (base_accuracy - falloff - cover).clamp(Fixed::ZERO, Fixed::from_num(100))
}

/// Damage multiplier for a strike at `distance` with a weapon of `max_range`.
///
/// Falls linearly from 1.0 at point blank to 0.5 at max range and is
/// clamped to that band.
#[must_use]
pub fn range_modifier(distance: Fixed, max_range: Fixed) -> Fixed {
    let floor = percent(MIN_RANGE_MODIFIER_PERCENT);
    if max_range <= Fixed::ZERO {
        return Fixed::ONE;
    }

    let ratio = (distance.max(Fixed::ZERO) / max_range).min(Fixed::ONE);
    (Fixed::ONE - (Fixed::ONE - floor) * ratio).clamp(floor, Fixed::ONE)
}

/// Resolve a hit roll.
///
/// `roll` is a uniform draw from `[0, 1)`; the strike lands when
/// `roll * 100 < hit_chance`.
#[must_use]
pub fn roll_hit(hit_chance: Fixed, roll: Fixed) -> bool {
    roll * Fixed::from_num(100) < hit_chance
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fx(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    #[test]
    fn test_zero_armor_passes_full_damage() {
        let modifier = percent(80);
        assert_eq!(calculate_damage(fx(40), Fixed::ZERO, modifier), fx(40) * modifier);
    }

    #[test]
    fn test_hundred_armor_halves_damage() {
        assert_eq!(calculate_damage(fx(40), fx(100), Fixed::ONE), fx(20));
    }

    #[test]
    fn test_negative_armor_is_ignored() {
        assert_eq!(calculate_damage(fx(40), fx(-50), Fixed::ONE), fx(40));
    }

    #[test]
    fn test_hit_chance_clamps() {
        assert_eq!(calculate_hit_chance(fx(150), Fixed::ZERO, false), fx(100));
        assert_eq!(calculate_hit_chance(fx(30), fx(40), true), Fixed::ZERO);
    }

    #[test]
    fn test_cover_costs_exactly_twenty() {
        let open = calculate_hit_chance(fx(90), fx(5), false);
        let covered = calculate_hit_chance(fx(90), fx(5), true);
        assert_eq!(open - covered, fx(COVER_PENALTY));
    }

    #[test]
    fn test_range_modifier_band() {
        assert_eq!(range_modifier(Fixed::ZERO, fx(10)), Fixed::ONE);
        assert_eq!(range_modifier(fx(10), fx(10)), percent(50));
        assert_eq!(range_modifier(fx(5), fx(10)), percent(75));
        // Past max range never drops below the floor.
        assert_eq!(range_modifier(fx(50), fx(10)), percent(50));
        // Degenerate weapons deal full damage.
        assert_eq!(range_modifier(fx(3), Fixed::ZERO), Fixed::ONE);
    }

    #[test]
    fn test_roll_hit_boundaries() {
        assert!(!roll_hit(Fixed::ZERO, Fixed::ZERO));
        assert!(roll_hit(fx(100), Fixed::ONE - Fixed::DELTA));
        assert!(roll_hit(fx(50), percent(49)));
        assert!(!roll_hit(fx(50), percent(50)));
    }

    proptest! {
        #[test]
        fn prop_damage_never_negative(
            base in -1000i32..1000,
            armor in -500i32..5000,
            modifier in 0i32..=100,
        ) {
            let damage = calculate_damage(fx(base), fx(armor), percent(modifier));
            prop_assert!(damage >= Fixed::ZERO);
        }

        #[test]
        fn prop_damage_strictly_decreases_with_armor(
            base in 1i32..1000,
            armor in 0i32..1000,
            extra in 1i32..1000,
        ) {
            let weaker = calculate_damage(fx(base), fx(armor), Fixed::ONE);
            let stronger = calculate_damage(fx(base), fx(armor + extra), Fixed::ONE);
            prop_assert!(stronger < weaker);
            prop_assert!(stronger > Fixed::ZERO);
        }

        #[test]
        fn prop_hit_chance_in_bounds(
            accuracy in -200i32..300,
            distance in 0i32..500,
            cover in any::<bool>(),
        ) {
            let chance = calculate_hit_chance(fx(accuracy), fx(distance), cover);
            prop_assert!(chance >= Fixed::ZERO);
            prop_assert!(chance <= fx(100));
        }

        #[test]
        fn prop_hit_chance_non_increasing_with_distance(
            accuracy in 0i32..=100,
            distance in 0i32..100,
            further in 1i32..100,
            cover in any::<bool>(),
        ) {
            let near = calculate_hit_chance(fx(accuracy), fx(distance), cover);
            let far = calculate_hit_chance(fx(accuracy), fx(distance + further), cover);
            prop_assert!(far <= near);
        }
    }
}
