//! Plugin discovery provider.

use crate::loader::{ArchiveLoader, FilesystemLoader, ModuleLoader};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Discovers plugin bundles and hands out loaders for them.
#[async_trait]
pub trait PluginsProvider: Send + Sync {
    /// Returns whether a plugin with the given name is present.
    fn plugin_exists(&self, name: &str) -> bool;

    /// Lists known plugin names, excluding any already in `exclude`.
    ///
    /// The returned order is sorted, matching the original host's
    /// `os.listdir` + `sort()` discovery order so that dependency
    /// resolution over equally-ranked plugins is deterministic.
    fn list_plugins(&self, exclude: &[String]) -> Vec<String>;

    /// Adds a plugin bundle copied in from `source`, replacing any existing
    /// bundle under the same name.
    async fn add_plugin(&self, name: &str, source: &std::path::Path) -> std::io::Result<()>;

    /// Removes a plugin bundle.
    async fn delete_plugin(&self, name: &str) -> std::io::Result<()>;

    /// Returns a loader over the named plugin's bundle, if it exists.
    fn get_plugin_loader(&self, name: &str) -> Option<Arc<dyn ModuleLoader>>;
}

/// Discovers plugin bundles from subdirectories of a local folder.
pub struct FolderPluginsProvider {
    root: PathBuf,
}

impl FolderPluginsProvider {
    /// Creates a provider rooted at `root`, creating it if necessary.
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn plugin_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait]
impl PluginsProvider for FolderPluginsProvider {
    fn plugin_exists(&self, name: &str) -> bool {
        self.plugin_path(name).exists()
    }

    fn list_plugins(&self, exclude: &[String]) -> Vec<String> {
        let mut plugins: Vec<String> = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.path().is_dir())
                .filter_map(|entry| entry.file_name().into_string().ok())
                .collect(),
            Err(_) => Vec::new(),
        };
        plugins.retain(|name| !exclude.contains(name));
        plugins.sort();
        plugins
    }

    async fn add_plugin(&self, name: &str, source: &std::path::Path) -> std::io::Result<()> {
        let dest = self.plugin_path(name);
        if dest.exists() {
            std::fs::remove_dir_all(&dest)?;
        }
        copy_dir_recursive(source, &dest)
    }

    async fn delete_plugin(&self, name: &str) -> std::io::Result<()> {
        std::fs::remove_dir_all(self.plugin_path(name))
    }

    fn get_plugin_loader(&self, name: &str) -> Option<Arc<dyn ModuleLoader>> {
        if !self.plugin_exists(name) {
            return None;
        }
        Some(Arc::new(FilesystemLoader::new(self.plugin_path(name))))
    }
}

/// Discovers plugin bundles fetched as tarballs/zips over HTTP (e.g. from a
/// git forge's archive endpoint) and caches each one as a local zip, handing
/// out [`ArchiveLoader`]s over the cache rather than re-fetching on every
/// lookup.
///
/// Grounded on `pylon/core/providers/source/{git,http}.py`: both variants
/// ultimately resolve a plugin name to a downloadable archive URL and unpack
/// it; this provider generalizes that to "any HTTP endpoint that serves a
/// zip for a plugin name", leaving the URL template configurable so either
/// backend's resolution scheme fits.
pub struct GitHttpPluginsProvider {
    base_url: String,
    cache_dir: PathBuf,
    client: reqwest::Client,
}

impl GitHttpPluginsProvider {
    /// Creates a provider that downloads `{base_url}/{name}.zip` for each
    /// plugin and caches the result under `cache_dir`.
    pub fn new(base_url: impl Into<String>, cache_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            base_url: base_url.into(),
            cache_dir,
            client: reqwest::Client::new(),
        })
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{name}.zip"))
    }

    async fn fetch(&self, name: &str) -> Result<(), String> {
        let url = format!("{}/{name}.zip", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| err.to_string())?
            .error_for_status()
            .map_err(|err| err.to_string())?;
        let bytes = response.bytes().await.map_err(|err| err.to_string())?;
        std::fs::write(self.cache_path(name), bytes).map_err(|err| err.to_string())
    }
}

#[async_trait]
impl PluginsProvider for GitHttpPluginsProvider {
    fn plugin_exists(&self, name: &str) -> bool {
        self.cache_path(name).is_file()
    }

    fn list_plugins(&self, exclude: &[String]) -> Vec<String> {
        let mut plugins: Vec<String> = match std::fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| entry.file_name().into_string().ok())
                .filter_map(|name| name.strip_suffix(".zip").map(str::to_string))
                .collect(),
            Err(_) => Vec::new(),
        };
        plugins.retain(|name| !exclude.contains(name));
        plugins.sort();
        plugins
    }

    async fn add_plugin(&self, name: &str, _source: &std::path::Path) -> std::io::Result<()> {
        self.fetch(name)
            .await
            .map_err(std::io::Error::other)
    }

    async fn delete_plugin(&self, name: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.cache_path(name))
    }

    fn get_plugin_loader(&self, name: &str) -> Option<Arc<dyn ModuleLoader>> {
        if !self.plugin_exists(name) {
            return None;
        }
        ArchiveLoader::open(self.cache_path(name))
            .ok()
            .map(|loader| Arc::new(loader) as Arc<dyn ModuleLoader>)
    }
}

fn copy_dir_recursive(source: &std::path::Path, dest: &std::path::Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in walkdir::WalkDir::new(source) {
        let entry = entry.map_err(|err| {
            err.into_io_error()
                .unwrap_or_else(|| std::io::Error::other("walkdir traversal failed"))
        })?;
        let relative = entry.path().strip_prefix(source).unwrap();
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn discovers_and_lists_plugins_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FolderPluginsProvider::new(dir.path()).unwrap();

        std::fs::create_dir(dir.path().join("zeta")).unwrap();
        std::fs::create_dir(dir.path().join("alpha")).unwrap();

        assert_eq!(
            provider.list_plugins(&[]),
            vec!["alpha".to_string(), "zeta".to_string()]
        );
        assert!(provider.plugin_exists("alpha"));
        assert!(!provider.plugin_exists("missing"));
    }

    #[tokio::test]
    async fn list_plugins_excludes_already_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FolderPluginsProvider::new(dir.path()).unwrap();
        std::fs::create_dir(dir.path().join("alpha")).unwrap();
        std::fs::create_dir(dir.path().join("beta")).unwrap();

        let listed = provider.list_plugins(&["alpha".to_string()]);
        assert_eq!(listed, vec!["beta".to_string()]);
    }

    #[tokio::test]
    async fn add_plugin_copies_bundle_contents() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FolderPluginsProvider::new(dir.path()).unwrap();

        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("metadata.json"), b"{}").unwrap();

        provider.add_plugin("demo", source.path()).await.unwrap();
        assert!(provider.plugin_exists("demo"));
        let loader = provider.get_plugin_loader("demo").unwrap();
        assert!(loader.has_file("metadata.json"));
    }
}
