//! Event bus error types.

use thiserror::Error;

/// Errors raised configuring or operating the event bus.
#[derive(Debug, Error)]
pub enum EventBusError {
    /// The configured transport could not be reached; the bus degrades to
    /// local-only delivery rather than failing outright.
    #[error("event transport '{0}' unavailable, falling back to local delivery: {1}")]
    TransportUnavailable(&'static str, String),
}

/// Result alias for event bus operations.
pub type EventBusResult<T> = Result<T, EventBusError>;
