//! Bootstrapping settings from a `CONFIG_SEED` environment variable.
//!
//! Grounded on `pylon/core/tools/seed.py::load_settings`: a `CONFIG_SEED`
//! environment variable of the form `<tag>:<data>` selects an "unseed"
//! backend by `tag` and hands it `data` to produce the raw YAML text, which
//! is then expanded and parsed exactly like a config file. The original
//! dispatches to a dynamically-imported `pylon.core.seeds.<tag>` module;
//! the rewrite has no plugin-loaded seed backends (those would themselves
//! be plugins under this crate's own `pylon-plugin` umbrella), so it
//! hard-codes the two backends the corpus configuration actually uses:
//! `file` (data is a path to a YAML document) and `base64` (data is a
//! base64-encoded YAML document, for seeding from a single-line secret
//! store value). An unrecognized tag is a configuration error.

use base64::Engine;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::{apply_env_overrides, expand_env_vars};
use crate::schema::PylonConfig;
use crate::validation::validate_config;

const CONFIG_SEED_VAR: &str = "CONFIG_SEED";

/// Loads settings seeded via the `CONFIG_SEED` environment variable.
///
/// Returns `Ok(None)` when `CONFIG_SEED` is unset (the caller falls back to
/// file-based discovery). Returns `Err` when `CONFIG_SEED` is set but
/// malformed, carries an unknown tag, or the unseeded document fails to
/// parse or validate — seeding is an explicit opt-in, so a set-but-broken
/// seed is always fatal rather than silently falling through:
/// configuration errors are fatal at boot.
pub fn load_seeded_config() -> ConfigResult<Option<PylonConfig>> {
    let Some(seed) = crate::env::get_var(CONFIG_SEED_VAR) else {
        return Ok(None);
    };

    let Some((tag, data)) = seed.split_once(':') else {
        return Err(ConfigError::validation(format!(
            "CONFIG_SEED must be formatted as '<tag>:<data>', got '{seed}'"
        )));
    };

    let raw_yaml = unseed(tag, data)?;
    let expanded = expand_env_vars(&raw_yaml);
    let config: PylonConfig = serde_yaml::from_str(&expanded)?;
    let config = apply_env_overrides(config)?;
    validate_config(&config)?;
    Ok(Some(config))
}

/// Dispatches to the seed backend named by `tag`, producing raw YAML text.
fn unseed(tag: &str, data: &str) -> ConfigResult<String> {
    match tag {
        "file" => std::fs::read_to_string(data).map_err(ConfigError::ReadError),
        "base64" => base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|err| ConfigError::validation(format!("invalid base64 seed data: {err}")))
            .and_then(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|err| ConfigError::validation(format!("seed data is not UTF-8: {err}")))
            }),
        "inline" => Ok(data.to_string()),
        other => Err(ConfigError::validation(format!(
            "unknown CONFIG_SEED tag '{other}', expected one of 'file', 'base64', 'inline'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn unset_seed_yields_none() {
        let _guard = ENV_LOCK.lock().unwrap();
        // SAFETY: serialized by ENV_LOCK.
        unsafe { std::env::remove_var("PYLON_CONFIG_SEED") };
        unsafe { std::env::remove_var("CORE_CONFIG_SEED") };
        assert!(load_seeded_config().unwrap().is_none());
    }

    #[test]
    fn inline_tag_parses_directly() {
        let _guard = ENV_LOCK.lock().unwrap();
        // SAFETY: serialized by ENV_LOCK.
        unsafe { std::env::set_var("PYLON_CONFIG_SEED", "inline:node:\n  name: seeded-node\n") };
        let config = load_seeded_config().unwrap().unwrap();
        assert_eq!(config.node.name, "seeded-node");
        unsafe { std::env::remove_var("PYLON_CONFIG_SEED") };
    }

    #[test]
    fn base64_tag_decodes_then_parses() {
        let _guard = ENV_LOCK.lock().unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode("node:\n  name: b64-node\n");
        // SAFETY: serialized by ENV_LOCK.
        unsafe { std::env::set_var("PYLON_CONFIG_SEED", format!("base64:{encoded}")) };
        let config = load_seeded_config().unwrap().unwrap();
        assert_eq!(config.node.name, "b64-node");
        unsafe { std::env::remove_var("PYLON_CONFIG_SEED") };
    }

    #[test]
    fn missing_colon_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        // SAFETY: serialized by ENV_LOCK.
        unsafe { std::env::set_var("PYLON_CONFIG_SEED", "garbage") };
        assert!(load_seeded_config().is_err());
        unsafe { std::env::remove_var("PYLON_CONFIG_SEED") };
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        // SAFETY: serialized by ENV_LOCK.
        unsafe { std::env::set_var("PYLON_CONFIG_SEED", "vault:secret/data") };
        assert!(load_seeded_config().is_err());
        unsafe { std::env::remove_var("PYLON_CONFIG_SEED") };
    }
}
