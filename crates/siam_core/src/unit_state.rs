//! Per-unit finite state machine.
//!
//! The state is a plain enum and [`UnitState::step`] is the whole
//! transition table: it reads a snapshot of the unit's surroundings and
//! returns the next state plus at most one [`UnitAction`] for the world to
//! apply. Nothing here touches other entities directly.
//!
//! | From   | Condition                       | To     | Action        |
//! |--------|---------------------------------|--------|---------------|
//! | Idle   | -                               | Idle   | -             |
//! | Move   | within arrival tolerance        | Idle   | -             |
//! | Move   | otherwise                       | Move   | move          |
//! | Chase  | target gone                     | Idle   | -             |
//! | Chase  | target within attack range      | Attack | -             |
//! | Chase  | otherwise                       | Chase  | move          |
//! | Attack | target gone                     | Idle   | -             |
//! | Attack | target out of range             | Chase  | -             |
//! | Attack | cooldown elapsed                | Attack | strike        |

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, UnitStats};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// State of a unit's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnitState {
    /// No orders.
    #[default]
    Idle,
    /// Walking to a point.
    Move {
        /// Where the unit is going.
        destination: Vec2Fixed,
    },
    /// Closing in on a target.
    Chase {
        /// Entity being pursued.
        target: EntityId,
    },
    /// Striking a target that is in range.
    Attack {
        /// Entity being attacked.
        target: EntityId,
        /// Seconds until the next strike.
        #[serde(with = "fixed_serde")]
        cooldown: Fixed,
    },
}

/// What the world should do for a unit this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitAction {
    /// Nothing.
    None,
    /// Step toward `destination`, covering at most `max_step` world units.
    MoveTowards {
        /// Point to approach.
        destination: Vec2Fixed,
        /// Distance budget for this tick.
        max_step: Fixed,
    },
    /// Resolve one attack against `target`.
    Strike {
        /// Entity being struck.
        target: EntityId,
        /// Distance to the target at strike time.
        distance: Fixed,
    },
}

/// Everything the transition function needs to know about one unit.
#[derive(Debug, Clone, Copy)]
pub struct StepInput {
    /// Unit position.
    pub position: Vec2Fixed,
    /// Unit stats.
    pub stats: UnitStats,
    /// Position of the current target if it still exists.
    pub target_position: Option<Vec2Fixed>,
    /// Seconds elapsed this tick.
    pub dt: Fixed,
    /// Distance at which a Move order counts as arrived.
    pub arrival_tolerance: Fixed,
}

/// Result of one state machine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// State after this tick.
    pub next: UnitState,
    /// Side effect to apply.
    pub action: UnitAction,
}

impl Step {
    const fn idle() -> Self {
        Self {
            next: UnitState::Idle,
            action: UnitAction::None,
        }
    }

    const fn stay(state: UnitState) -> Self {
        Self {
            next: state,
            action: UnitAction::None,
        }
    }
}

impl UnitState {
    /// The entity this state is pursuing or attacking.
    #[must_use]
    pub const fn target(&self) -> Option<EntityId> {
        match self {
            Self::Chase { target } | Self::Attack { target, .. } => Some(*target),
            Self::Idle | Self::Move { .. } => None,
        }
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Move { .. } => "move",
            Self::Chase { .. } => "chase",
            Self::Attack { .. } => "attack",
        }
    }

    /// Advance the state machine by one tick.
    #[must_use]
    pub fn step(self, input: &StepInput) -> Step {
        let max_step = input.stats.move_speed * input.dt;

        match self {
            Self::Idle => Step::stay(self),

            Self::Move { destination } => {
                if input.position.within(destination, input.arrival_tolerance) {
                    Step::idle()
                } else {
                    Step {
                        next: self,
                        action: UnitAction::MoveTowards {
                            destination,
                            max_step,
                        },
                    }
                }
            }

            Self::Chase { target } => {
                // Destroyed targets are only noticed here; there is no callback.
                let Some(target_position) = input.target_position else {
                    return Step::idle();
                };

                if input.position.within(target_position, input.stats.attack_range) {
                    Step::stay(Self::Attack {
                        target,
                        cooldown: Fixed::ZERO,
                    })
                } else {
                    Step {
                        next: self,
                        action: UnitAction::MoveTowards {
                            destination: target_position,
                            max_step,
                        },
                    }
                }
            }

            Self::Attack { target, cooldown } => {
                let Some(target_position) = input.target_position else {
                    return Step::idle();
                };

                if !input.position.within(target_position, input.stats.attack_range) {
                    return Step::stay(Self::Chase { target });
                }

                if cooldown <= Fixed::ZERO {
                    // Carry the overshoot so the cadence does not drift with dt.
                    Step {
                        next: Self::Attack {
                            target,
                            cooldown: cooldown + input.stats.attack_rate - input.dt,
                        },
                        action: UnitAction::Strike {
                            target,
                            distance: input.position.distance(target_position),
                        },
                    }
                } else {
                    Step::stay(Self::Attack {
                        target,
                        cooldown: cooldown - input.dt,
                    })
                }
            }
        }
    }
}
