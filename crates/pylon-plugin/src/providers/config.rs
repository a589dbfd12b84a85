//! Per-plugin configuration provider.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

/// Reads and writes a single plugin's own configuration document.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Loads a plugin's configuration, or `None` if it has none stored.
    async fn load_config(&self, plugin_name: &str) -> std::io::Result<Option<Value>>;

    /// Persists a plugin's configuration.
    async fn save_config(&self, plugin_name: &str, config: &Value) -> std::io::Result<()>;

    /// Removes a plugin's stored configuration, if any.
    async fn delete_config(&self, plugin_name: &str) -> std::io::Result<()>;
}

/// Stores each plugin's configuration as a JSON file in a local folder.
pub struct FolderConfigProvider {
    root: PathBuf,
}

impl FolderConfigProvider {
    /// Creates a provider rooted at `root`, creating it if necessary.
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn config_path(&self, plugin_name: &str) -> PathBuf {
        self.root.join(format!("{plugin_name}.json"))
    }
}

#[async_trait]
impl ConfigProvider for FolderConfigProvider {
    async fn load_config(&self, plugin_name: &str) -> std::io::Result<Option<Value>> {
        let path = self.config_path(plugin_name);
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let value = serde_json::from_str(&content)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        Ok(Some(value))
    }

    async fn save_config(&self, plugin_name: &str, config: &Value) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(config)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        std::fs::write(self.config_path(plugin_name), content)
    }

    async fn delete_config(&self, plugin_name: &str) -> std::io::Result<()> {
        let path = self.config_path(plugin_name);
        if path.is_file() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Wraps any other [`ConfigProvider`] with a database-backed override layer.
///
/// Reads fall through to the wrapped backend when no row exists in `db`;
/// writes always go to `db`, never to the wrapped backend — matching
/// `pylon/core/providers/internal/db_config.py`'s read-through /
/// write-to-db-only split.
pub struct DbConfigProvider {
    db: std::sync::Arc<dyn ConfigDataStore>,
    fallback: std::sync::Arc<dyn ConfigProvider>,
}

impl DbConfigProvider {
    /// Wraps `fallback`, preferring rows found in `db`.
    pub fn new(db: std::sync::Arc<dyn ConfigDataStore>, fallback: std::sync::Arc<dyn ConfigProvider>) -> Self {
        Self { db, fallback }
    }
}

/// Narrow trait over a relational-DB-backed config row store, injected by
/// the host. Spec §1 keeps the relational DB engine itself out of scope;
/// this is the seam [`DbConfigProvider`] consumes it through.
#[async_trait]
pub trait ConfigDataStore: Send + Sync {
    /// Loads the stored row for `plugin_name`, if one exists.
    async fn load(&self, plugin_name: &str) -> std::io::Result<Option<Value>>;

    /// Upserts the row for `plugin_name`.
    async fn save(&self, plugin_name: &str, config: &Value) -> std::io::Result<()>;

    /// Deletes the row for `plugin_name`, if any.
    async fn delete(&self, plugin_name: &str) -> std::io::Result<()>;
}

#[async_trait]
impl ConfigProvider for DbConfigProvider {
    async fn load_config(&self, plugin_name: &str) -> std::io::Result<Option<Value>> {
        if let Some(value) = self.db.load(plugin_name).await? {
            return Ok(Some(value));
        }
        self.fallback.load_config(plugin_name).await
    }

    async fn save_config(&self, plugin_name: &str, config: &Value) -> std::io::Result<()> {
        self.db.save(plugin_name, config).await
    }

    async fn delete_config(&self, plugin_name: &str) -> std::io::Result<()> {
        self.db.delete(plugin_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn round_trips_config_through_folder() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FolderConfigProvider::new(dir.path()).unwrap();

        assert!(provider.load_config("demo").await.unwrap().is_none());

        let config = json!({"enabled": true, "threshold": 5});
        provider.save_config("demo", &config).await.unwrap();

        let loaded = provider.load_config("demo").await.unwrap().unwrap();
        assert_eq!(loaded, config);
    }
}
