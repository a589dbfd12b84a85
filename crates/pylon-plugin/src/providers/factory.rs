//! Builds a provider trait object from a [`ProviderConfig`]'s `type` tag.
//!
//! Mirrors the original host's provider lookup (`pylon/core/tools/
//! module/provider.py` selects a class by `config.provider.type` string);
//! the `folder` backend is always constructible locally, while backends
//! that front an external collaborator out of scope here (an object-store
//! client, a relational DB client) need that client supplied
//! by the host binary instead of conjured here, so their `type` tag is
//! accepted only if the caller already built the concrete backend itself.

use std::path::Path;
use std::sync::Arc;

use pylon_config::ProviderConfig;

use crate::error::PluginError;
use crate::providers::{
    ConfigProvider, FolderConfigProvider, FolderPluginsProvider, FolderRequirementsProvider,
    GitHttpPluginsProvider, PluginsProvider, RequirementsProvider,
};

fn setting_str<'a>(config: &'a ProviderConfig, key: &str) -> Option<&'a str> {
    config.settings.get(key).and_then(serde_json::Value::as_str)
}

/// Builds the plugins provider named by `config.kind`, rooting any local
/// storage the backend needs under `default_root` unless `config.settings`
/// overrides it.
pub fn build_plugins_provider(
    config: &ProviderConfig,
    default_root: &Path,
) -> Result<Arc<dyn PluginsProvider>, PluginError> {
    match config.kind.as_str() {
        "" | "folder" => {
            let root = setting_str(config, "root").map(Path::new).unwrap_or(default_root);
            let provider = FolderPluginsProvider::new(root)
                .map_err(|err| PluginError::Io(root.display().to_string(), err))?;
            Ok(Arc::new(provider))
        }
        "git_http" => {
            let base_url = setting_str(config, "base_url").ok_or_else(|| {
                PluginError::UnsupportedProvider(
                    "git_http".to_string(),
                    "missing required 'base_url' setting".to_string(),
                )
            })?;
            let cache_dir = setting_str(config, "cache_dir")
                .map(Path::new)
                .unwrap_or(default_root);
            let provider = GitHttpPluginsProvider::new(base_url, cache_dir)
                .map_err(|err| PluginError::Io(cache_dir.display().to_string(), err))?;
            Ok(Arc::new(provider))
        }
        other => Err(PluginError::UnsupportedProvider(
            other.to_string(),
            "plugins provider backend is not constructible without a host-supplied client"
                .to_string(),
        )),
    }
}

/// Builds the requirements cache provider named by `config.kind`.
///
/// `object_store` fronts a client that stays external (the object-store
/// SDK); there is no way to construct one from configuration alone, so that
/// kind always fails here — a host wanting it constructs
/// [`crate::providers::ObjectStoreRequirementsProvider`] directly and skips
/// this factory.
pub fn build_requirements_provider(
    config: &ProviderConfig,
    default_root: &Path,
) -> Result<Arc<dyn RequirementsProvider>, PluginError> {
    match config.kind.as_str() {
        "" | "folder" => {
            let root = setting_str(config, "root").map(Path::new).unwrap_or(default_root);
            let provider = FolderRequirementsProvider::new(root)
                .map_err(|err| PluginError::Io(root.display().to_string(), err))?;
            Ok(Arc::new(provider))
        }
        other => Err(PluginError::UnsupportedProvider(
            other.to_string(),
            "requirements provider backend is not constructible without a host-supplied client"
                .to_string(),
        )),
    }
}

/// Builds the per-plugin config provider named by `config.kind`.
///
/// `db` wraps a folder fallback with a relational-DB override layer (spec
/// §4.1); since the DB client itself is out of scope here too, `db` also
/// always fails — a host wanting it constructs
/// [`crate::providers::DbConfigProvider`] directly around its own
/// [`crate::providers::ConfigDataStore`] implementation.
pub fn build_config_provider(
    config: &ProviderConfig,
    default_root: &Path,
) -> Result<Arc<dyn ConfigProvider>, PluginError> {
    match config.kind.as_str() {
        "" | "folder" => {
            let root = setting_str(config, "root").map(Path::new).unwrap_or(default_root);
            let provider = FolderConfigProvider::new(root)
                .map_err(|err| PluginError::Io(root.display().to_string(), err))?;
            Ok(Arc::new(provider))
        }
        other => Err(PluginError::UnsupportedProvider(
            other.to_string(),
            "config provider backend is not constructible without a host-supplied client"
                .to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn folder_kind_builds_under_default_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProviderConfig {
            kind: "folder".to_string(),
            settings: json!({}),
        };
        assert!(build_plugins_provider(&config, dir.path()).is_ok());
        assert!(build_requirements_provider(&config, dir.path()).is_ok());
        assert!(build_config_provider(&config, dir.path()).is_ok());
    }

    #[test]
    fn empty_kind_defaults_to_folder() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProviderConfig::default();
        assert!(build_plugins_provider(&config, dir.path()).is_ok());
    }

    #[test]
    fn unsupported_kind_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProviderConfig {
            kind: "object_store".to_string(),
            settings: json!({}),
        };
        let err = build_requirements_provider(&config, dir.path()).unwrap_err();
        assert!(matches!(err, PluginError::UnsupportedProvider(..)));
    }

    #[test]
    fn git_http_requires_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProviderConfig {
            kind: "git_http".to_string(),
            settings: json!({}),
        };
        let err = build_plugins_provider(&config, dir.path()).unwrap_err();
        assert!(matches!(err, PluginError::UnsupportedProvider(..)));
    }
}
