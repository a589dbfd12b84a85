//! The runtime lifecycle record for a single discovered plugin.
//!
//! Unlike a compile-time plugin descriptor baked into a binary, this one is
//! built fresh every time a plugin is discovered and walks through
//! `prepared` (requirements installed) and `activated` (entry point
//! initialized) as the Module Manager processes it.

use crate::loader::ModuleLoader;
use crate::metadata::ModuleMetadata;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Lifecycle record for one discovered plugin.
pub struct PluginDescriptor {
    /// Plugin name, matching its bundle directory/archive name.
    pub name: String,
    /// Loader over the plugin's bundle contents.
    pub loader: Arc<dyn ModuleLoader>,
    /// Parsed `metadata.json`.
    pub metadata: ModuleMetadata,
    /// Raw `requirements.txt` contents, or empty if the plugin has none.
    pub requirements: String,
    /// Resolved, layered configuration: the plugin's own bundled
    /// `config.yml` defaults, overridden by the host's
    /// `modules.plugin_overrides` entry for this plugin, further overridden
    /// by anything found in the custom config provider's store, with
    /// `${VAR}` environment expansion applied to the merged result.
    pub config: Value,
    /// Filesystem path backing this plugin's bundle, when the loader is
    /// backed by one (archive-backed and remote-fetched loaders may leave
    /// this `None` until extracted to a local cache).
    pub path: Option<PathBuf>,
    /// Local site-base directory requirements were installed into, once
    /// prepared.
    pub requirements_base: Option<PathBuf>,
    /// `PYTHONUSERBASE`-equivalent site path derived from
    /// `requirements_base`, once prepared.
    pub requirements_path: Option<PathBuf>,
    /// Whether requirements have been installed (or found cached) for this
    /// plugin.
    pub prepared: bool,
    /// Whether the plugin's entry point has been successfully initialized.
    pub activated: bool,
}

impl PluginDescriptor {
    /// Creates a new, unprepared descriptor with no configuration layered in
    /// yet (`config` starts `Value::Null`; the Module Manager fills it in
    /// during prepare).
    pub fn new(
        name: impl Into<String>,
        loader: Arc<dyn ModuleLoader>,
        metadata: ModuleMetadata,
        requirements: String,
    ) -> Self {
        Self {
            name: name.into(),
            loader,
            metadata,
            requirements,
            config: Value::Null,
            path: None,
            requirements_base: None,
            requirements_path: None,
            prepared: false,
            activated: false,
        }
    }
}

impl std::fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("prepared", &self.prepared)
            .field("activated", &self.activated)
            .finish()
    }
}

/// A resolved requirements cache key: a plugin name paired with the chained
/// hash of every requirement set installed before it in load order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementsCacheEntry {
    /// Plugin this cache entry belongs to.
    pub plugin_name: String,
    /// Chained sha256 hash identifying this exact install closure.
    pub cache_hash: String,
}
