//! Configuration loading, expansion, and validation for the Pylon host.
//!
//! Configuration is authored as YAML, with `${VAR}` / `${VAR:-default}`
//! environment-variable expansion applied before parsing. [`ConfigLoader`]
//! finds and loads the file; [`validate_config`] checks the result for
//! internally-consistent values before the host acts on it.

pub mod env;
pub mod error;
pub mod loader;
pub mod schema;
pub mod seed;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, expand_env_vars, load_config, load_config_from_file};
pub use schema::{
    ActivationMode, AmqpConfig, BrokerConfig, ExposureConfig, InstallMode, LogFormat, LogLevel,
    LoggingConfig, ModulesConfig, NodeConfig, ProviderConfig, PylonConfig, RedisConfig, RpcConfig,
    SocketIoConfig, TraefikConfig,
};
pub use seed::load_seeded_config;
pub use validation::validate_config;

/// Loads the host's configuration the way the original host's bootstrap
/// does: a `CONFIG_SEED` environment variable takes priority when set (and
/// a malformed seed is fatal), otherwise falls back to file-based discovery
/// with [`load_config`].
pub fn bootstrap_config() -> ConfigResult<PylonConfig> {
    if let Some(config) = load_seeded_config()? {
        return Ok(config);
    }
    load_config()
}
