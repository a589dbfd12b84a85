//! Lifecycle supervisor error types.

use thiserror::Error;

/// Errors raised by a single lifecycle step's start or stop phase.
///
/// Every step runs best-effort: a failing step is logged and
/// the supervisor moves on to the next one rather than aborting the whole
/// sequence, so this type exists for the step implementation's own use,
/// not to gate supervisor progress.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A named lifecycle step failed to start.
    #[error("lifecycle step '{0}' failed to start: {1}")]
    StepStartFailed(String, String),

    /// A named lifecycle step failed to stop cleanly.
    #[error("lifecycle step '{0}' failed to stop: {1}")]
    StepStopFailed(String, String),
}

/// Result alias for lifecycle step operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
