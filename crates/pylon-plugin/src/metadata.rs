//! The `metadata.json` manifest every plugin bundle carries.

use serde::{Deserialize, Serialize};

/// A plugin bundle's manifest, read from `metadata.json` at its root.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ModuleMetadata {
    /// Plugin name. Must match the bundle's directory/archive name.
    pub name: String,
    /// Plugin version, free-form.
    pub version: String,
    /// Entry point module path within the bundle, e.g. `module`.
    #[serde(rename = "module")]
    pub module: String,
    /// Names of plugins that must be active before this one can activate.
    pub depends_on: Vec<String>,
    /// Names of plugins this one should activate after, if present, but
    /// does not strictly require.
    pub init_after: Vec<String>,
    /// Forces extraction to a local temp directory even when the loader
    /// backing the bundle could serve it in place (e.g. from an archive).
    #[serde(default)]
    pub extract: bool,
    /// Scripts to run once, before the plugin's own `init`.
    pub init_scripts: Vec<String>,
    /// Scripts to run on every activation, including reloads.
    pub init_scripts_runtime: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_manifest() {
        let json = r#"{"name": "demo", "version": "1.0.0", "module": "module"}"#;
        let metadata: ModuleMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.name, "demo");
        assert!(metadata.depends_on.is_empty());
        assert!(!metadata.extract);
    }

    #[test]
    fn deserializes_full_manifest() {
        let json = r#"{
            "name": "demo",
            "version": "1.0.0",
            "module": "module",
            "depends_on": ["auth"],
            "init_after": ["telemetry"],
            "extract": true,
            "init_scripts": ["migrate.sql"],
            "init_scripts_runtime": ["seed.sql"]
        }"#;
        let metadata: ModuleMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.depends_on, vec!["auth".to_string()]);
        assert_eq!(metadata.init_after, vec!["telemetry".to_string()]);
        assert!(metadata.extract);
    }
}
