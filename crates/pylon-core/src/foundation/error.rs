//! Shared error types used across every Pylon subsystem.
//!
//! Framework-level errors that are specific to a single subsystem (dependency
//! resolution, configuration, exposure) live in that subsystem's own crate.
//! This module only carries the errors that cross subsystem boundaries:
//! failures reading or writing [`crate::Context`] attributes, and the
//! catch-all error a plugin hook or RPC target can return.

use thiserror::Error;

/// Errors raised when reading or writing attributes on a [`crate::Context`].
#[derive(Debug, Clone, Error)]
pub enum ContextError {
    /// No value has been set under this key.
    ///
    /// Mirrors the original attribute-bag semantics, where reading an unset
    /// attribute raises rather than returning `None`.
    #[error("context attribute not set: {0}")]
    NotSet(String),

    /// A value was set under this key, but not as the requested type.
    #[error("context attribute '{0}' has a different type than requested")]
    WrongType(String),
}

/// Result type for context attribute access.
pub type ContextResult<T> = Result<T, ContextError>;

/// The catch-all error type returned by plugin hooks, RPC targets, and
/// listener callbacks.
///
/// Subsystems that need a typed error (dependency resolution, configuration)
/// define their own `thiserror` enum and convert into this one at the seam
/// where control returns to generic orchestration code, the same way a
/// plugin hook boundary returns a boxed error rather than a fixed enum.
pub type PylonError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for the catch-all error type.
pub type PylonResult<T> = Result<T, PylonError>;
