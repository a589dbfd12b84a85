//! Configuration validation utilities.

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{NodeConfig, PylonConfig};

const VALID_PROVIDER_KINDS: &[&str] = &["folder", "git_http", "object_store", "db"];

/// Validates the entire configuration.
pub fn validate_config(config: &PylonConfig) -> ConfigResult<()> {
    validate_node_config(&config.node)?;
    validate_modules_config(config)?;
    Ok(())
}

/// Validates node identity and HTTP bind settings.
fn validate_node_config(node: &NodeConfig) -> ConfigResult<()> {
    if node.name.is_empty() {
        return Err(ConfigError::missing_field("node.name"));
    }

    if node.name.contains(' ') {
        return Err(ConfigError::validation("node.name cannot contain spaces"));
    }

    if node.port == 0 {
        return Err(ConfigError::validation("node.port must be greater than 0"));
    }

    if let Some(prefix) = &node.url_prefix {
        if !prefix.starts_with('/') {
            return Err(ConfigError::validation(
                "node.url_prefix must start with '/'",
            ));
        }
    }

    Ok(())
}

/// Validates provider selection and the plugin activation settings derived
/// from it.
fn validate_modules_config(config: &PylonConfig) -> ConfigResult<()> {
    let modules = &config.modules;

    if modules.base_path.is_empty() {
        return Err(ConfigError::missing_field("modules.base_path"));
    }

    for (field, provider) in [
        ("modules.plugins_provider", &modules.plugins_provider),
        (
            "modules.requirements_provider",
            &modules.requirements_provider,
        ),
        ("modules.config_provider", &modules.config_provider),
    ] {
        if !provider.kind.is_empty() && !VALID_PROVIDER_KINDS.contains(&provider.kind.as_str()) {
            return Err(ConfigError::validation(format!(
                "{field}: unknown provider kind '{}', expected one of {:?}",
                provider.kind, VALID_PROVIDER_KINDS
            )));
        }
    }

    if modules.installer_command.is_empty() {
        return Err(ConfigError::missing_field("modules.installer_command"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config() {
        let mut config = PylonConfig::default();
        config.modules.base_path = "/var/lib/pylon/modules".to_string();
        config.modules.installer_command = vec!["pip".to_string(), "install".to_string()];
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_empty_node_name() {
        let mut config = PylonConfig::default();
        config.node.name = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_zero_port() {
        let mut config = PylonConfig::default();
        config.node.port = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn rejects_url_prefix_without_leading_slash() {
        let mut config = PylonConfig::default();
        config.node.url_prefix = Some("api".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_unknown_provider_kind() {
        let mut config = PylonConfig::default();
        config.modules.base_path = "/var/lib/pylon/modules".to_string();
        config.modules.installer_command = vec!["pip".to_string()];
        config.modules.plugins_provider.kind = "ftp".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_missing_installer_command() {
        let mut config = PylonConfig::default();
        config.modules.base_path = "/var/lib/pylon/modules".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }
}
