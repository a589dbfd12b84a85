//! Configuration file loader.

use crate::error::{ConfigError, ConfigResult};
use crate::schema::PylonConfig;
use crate::validation::validate_config;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration loader with support for multiple sources.
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Creates a new configuration loader with no search paths.
    pub fn new() -> Self {
        Self {
            search_paths: Vec::new(),
        }
    }

    /// Adds a search path for configuration files.
    pub fn add_search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the current directory to search paths.
    pub fn with_current_dir(self) -> Self {
        if let Ok(cwd) = std::env::current_dir() {
            self.add_search_path(cwd)
        } else {
            self
        }
    }

    /// Adds the user config directory to search paths.
    pub fn with_user_config_dir(self) -> Self {
        if let Some(config_dir) = dirs::config_dir() {
            self.add_search_path(config_dir.join("pylon"))
        } else {
            self
        }
    }

    /// Loads configuration from the first available source, falling back to
    /// defaults if no file is found.
    pub fn load(&self) -> ConfigResult<PylonConfig> {
        if let Some(path) = self.find_config_file() {
            return self.load_from_file(&path);
        }

        info!("no configuration file found, using defaults");
        Ok(PylonConfig::default())
    }

    /// Loads configuration from a specific file.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<PylonConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        let config = self.parse_yaml(&content)?;
        validate_config(&config)?;

        debug!(node = %config.node.name, "configuration loaded");
        Ok(config)
    }

    /// Loads configuration from a YAML string.
    pub fn load_from_str(&self, yaml: &str) -> ConfigResult<PylonConfig> {
        let config = self.parse_yaml(yaml)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Finds the first available configuration file across search paths.
    fn find_config_file(&self) -> Option<PathBuf> {
        const CONFIG_NAMES: &[&str] = &[
            "pylon.yaml",
            "pylon.yml",
            "config.yaml",
            "config.yml",
            ".pylon.yaml",
            ".pylon.yml",
        ];

        for search_path in &self.search_paths {
            for name in CONFIG_NAMES {
                let path = search_path.join(name);
                debug!(path = %path.display(), "checking for config file");
                if path.exists() {
                    info!(path = %path.display(), "found configuration file");
                    return Some(path);
                }
            }
        }

        None
    }

    /// Parses YAML content with environment variable expansion applied
    /// first, then layers `PYLON_`/`CORE_`-prefixed environment overrides
    /// on top of the parsed document.
    fn parse_yaml(&self, content: &str) -> ConfigResult<PylonConfig> {
        let expanded = expand_env_vars(content);
        let config: PylonConfig = serde_yaml::from_str(&expanded).map_err(ConfigError::from)?;
        apply_env_overrides(config)
    }
}

/// Layers `CORE_`/`PYLON_`-prefixed environment variables onto an
/// already-parsed configuration, `PYLON_` taking precedence, with nested
/// fields addressed via a double-underscore path separator (e.g.
/// `PYLON_NODE__PORT=9100` overrides `node.port`).
///
/// This is the host-wide equivalent of `pylon_config::env::get_var`'s
/// prefix cascade, expressed as a whole-document merge via `figment`
/// instead of one lookup per field.
pub fn apply_env_overrides(config: PylonConfig) -> ConfigResult<PylonConfig> {
    use figment::Figment;
    use figment::providers::{Env, Serialized};

    Figment::new()
        .merge(Serialized::defaults(&config))
        .merge(Env::prefixed("CORE_").split("__"))
        .merge(Env::prefixed("PYLON_").split("__"))
        .extract::<PylonConfig>()
        .map_err(ConfigError::from)
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new().with_current_dir().with_user_config_dir()
    }
}

/// Expands `${VAR_NAME}` and `${VAR_NAME:-default}` references against the
/// process environment.
///
/// An unset variable with no default expands to the empty string, matching
/// the original host's `os.path.expandvars`-based substitution. Exposed for
/// reuse by `pylon-plugin`'s per-plugin config layering, which applies the
/// same expansion to a plugin's own `config.yml` after merging it with the
/// host's override layers.
pub fn expand_env_vars(content: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}").unwrap();

    let mut result = String::with_capacity(content.len());
    let mut last_end = 0;
    for cap in re.captures_iter(content) {
        let whole = cap.get(0).unwrap();
        result.push_str(&content[last_end..whole.start()]);

        let var_name = cap.get(1).unwrap().as_str();
        let default_value = cap.get(3).map(|m| m.as_str());
        let value = std::env::var(var_name)
            .ok()
            .or_else(|| default_value.map(String::from))
            .unwrap_or_default();
        result.push_str(&value);

        last_end = whole.end();
    }
    result.push_str(&content[last_end..]);
    result
}

/// Loads configuration with default search paths.
pub fn load_config() -> ConfigResult<PylonConfig> {
    ConfigLoader::default().load()
}

/// Loads configuration from a specific file.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<PylonConfig> {
    ConfigLoader::new().load_from_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_yaml_yields_defaults() {
        let loader = ConfigLoader::new();
        let config = loader.load_from_str("").unwrap();
        assert_eq!(config.node.name, "pylon");
    }

    #[test]
    fn parse_minimal_config() {
        let yaml = r#"
node:
  name: node-a
  port: 9000
"#;
        let loader = ConfigLoader::new();
        let config = loader.load_from_str(yaml).unwrap();
        assert_eq!(config.node.name, "node-a");
        assert_eq!(config.node.port, 9000);
    }

    #[test]
    fn env_var_expansion_substitutes_set_variable() {
        // SAFETY: test runs single-threaded within this process.
        unsafe { std::env::set_var("PYLON_TEST_NODE_NAME", "env-node") };

        let yaml = r#"
node:
  name: ${PYLON_TEST_NODE_NAME}
"#;
        let loader = ConfigLoader::new();
        let config = loader.load_from_str(yaml).unwrap();
        assert_eq!(config.node.name, "env-node");

        // SAFETY: test runs single-threaded within this process.
        unsafe { std::env::remove_var("PYLON_TEST_NODE_NAME") };
    }

    #[test]
    fn env_var_expansion_falls_back_to_default() {
        let yaml = r#"
node:
  name: ${PYLON_TEST_NONEXISTENT:-fallback-node}
"#;
        let loader = ConfigLoader::new();
        let config = loader.load_from_str(yaml).unwrap();
        assert_eq!(config.node.name, "fallback-node");
    }

    #[test]
    fn rejects_missing_file() {
        let loader = ConfigLoader::new();
        let err = loader
            .load_from_file("/nonexistent/path/pylon.yaml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
