//! Pluggable backends the Module Manager uses to discover plugin bundles,
//! cache installed requirements, and persist per-plugin configuration.
//!
//! Each concern has exactly one active backend at a time, selected from
//! `modules.<concern>_provider.type` in the host configuration. Every
//! concern also ships a `folder` backend that reads/writes a local
//! directory, matching the default deployment the rest of the stack doesn't
//! have to think about.

pub mod config;
pub mod factory;
pub mod plugins;
pub mod requirements;

pub use config::{ConfigDataStore, ConfigProvider, DbConfigProvider, FolderConfigProvider};
pub use factory::{build_config_provider, build_plugins_provider, build_requirements_provider};
pub use plugins::{FolderPluginsProvider, GitHttpPluginsProvider, PluginsProvider};
pub use requirements::{
    FolderRequirementsProvider, ObjectStoreClient, ObjectStoreRequirementsProvider,
    RequirementsProvider,
};
