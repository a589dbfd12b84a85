//! Error types for plugin discovery, dependency resolution, and lifecycle
//! management.

use thiserror::Error;

/// Errors raised while resolving a dependency order across discovered
/// plugins.
#[derive(Debug, Clone, Error)]
pub enum DependencyError {
    /// A plugin declares `depends_on` a name that isn't present in the set
    /// of discovered plugins.
    #[error("required dependency '{dependency}' not present (required by '{required_by}')")]
    MissingDependency {
        /// The missing dependency's name.
        dependency: String,
        /// The plugin that required it.
        required_by: String,
    },

    /// Two plugins depend on each other, directly or transitively.
    #[error("circular dependency ({0} <-> {1})")]
    CircularDependency(String, String),
}

/// Result alias for dependency resolution.
pub type DependencyResult<T> = Result<T, DependencyError>;

/// Errors raised while loading, preparing, or activating a single plugin.
///
/// A `PluginError` arising from one plugin's metadata, requirements, or
/// activation step is never fatal to the host: every such call site logs it
/// and skips just the offending plugin, continuing to load the rest. The
/// one exception is `ActivationFailed("<dependency resolution>", ..)`,
/// which wraps a circular dependency detected while resolving a phase's
/// load order — a cycle gives no principled plugin to drop, so it aborts
/// that whole phase rather than being isolated to one plugin. A missing
/// (as opposed to circular) dependency does not raise this way: the module
/// manager drops just the plugin missing its dependency and retries
/// resolution for the rest.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The plugin bundle has no `metadata.json`.
    #[error("plugin '{0}' has no metadata.json")]
    MissingMetadata(String),

    /// `metadata.json` could not be parsed.
    #[error("plugin '{0}' has invalid metadata.json: {1}")]
    InvalidMetadata(String, #[source] serde_json::Error),

    /// The plugin bundle could not be read from its provider or archive.
    #[error("failed to read plugin '{0}': {1}")]
    Io(String, #[source] std::io::Error),

    /// Requirements installation failed.
    #[error("failed to install requirements for plugin '{0}': {1}")]
    RequirementsFailed(String, String),

    /// The plugin's entry point could not be loaded or initialized.
    #[error("failed to activate plugin '{0}': {1}")]
    ActivationFailed(String, String),

    /// A provider's configured `type` has no constructible backend: the
    /// backend needs an external collaborator (object store / relational DB
    /// client) the caller didn't supply.
    #[error("unsupported provider backend '{0}': {1}")]
    UnsupportedProvider(String, String),
}

/// Result alias for single-plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;
