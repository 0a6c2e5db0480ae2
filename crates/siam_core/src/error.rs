//! Error types for the game simulation.

use thiserror::Error;

use crate::components::EntityId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all game simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Referenced entity does not exist (or has been destroyed).
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// A harvesting order was given to a unit that is not a worker.
    #[error("Unit {0} is not a worker")]
    NotAWorker(EntityId),

    /// Referenced resource node does not exist.
    #[error("Resource node not found: {0}")]
    ResourceNodeNotFound(EntityId),

    /// Resource node has no stock left.
    #[error("Resource node {0} is depleted")]
    ResourceNodeDepleted(EntityId),

    /// Insufficient resources.
    #[error("Insufficient resources: need {required} {resource}, have {available}")]
    InsufficientResources {
        /// Resource type.
        resource: String,
        /// Amount required.
        required: String,
        /// Amount available.
        available: String,
    },

    /// Training queue is at capacity.
    #[error("Training queue full for building {0}")]
    QueueFull(EntityId),

    /// Building is still under construction.
    #[error("Building {0} is still under construction")]
    BuildingIncomplete(EntityId),

    /// Building cannot train the requested unit kind.
    #[error("Building {building} cannot train {unit}")]
    CannotTrain {
        /// Building asked to train.
        building: EntityId,
        /// Requested unit kind.
        unit: String,
    },

    /// Data file parsing error.
    #[error("Failed to parse config data: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}
