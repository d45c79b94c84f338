use thiserror::Error;

use linkwheel_rotation::RotationError;
use linkwheel_transport::TransportError;

/// Errors that can occur while building or running the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The provided schedule definition is invalid.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// The configured dispatch target is invalid.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// No group with the configured name is visible to the session.
    #[error("Target group not found: {name}")]
    TargetNotFound { name: String },

    /// The transport failed underneath a dispatch step.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The rotation store failed to advance.
    #[error("Rotation error: {0}")]
    Rotation(#[from] RotationError),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
