//! The Module Manager: discovers plugins, resolves their load order,
//! installs their requirements, and drives their activation and
//! deactivation.

use async_trait::async_trait;
use dashmap::DashMap;
use pylon_config::{ActivationMode, InstallMode, expand_env_vars};
use pylon_core::Context;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::descriptor::PluginDescriptor;
use crate::error::{DependencyError, PluginError};
use crate::installer::RequirementsInstaller;
use crate::metadata::ModuleMetadata;
use crate::providers::{ConfigProvider, PluginsProvider, RequirementsProvider};
use crate::resolver::resolve_dependencies;

/// Activates and deactivates a prepared plugin's entry point.
///
/// Concrete implementations decide how a plugin is actually run — in
/// process, as a spawned child, or against a remote worker pool. The
/// Module Manager only needs to know whether activation succeeded.
#[async_trait]
pub trait PluginActivator: Send + Sync {
    /// Initializes the plugin named by `descriptor`, now that its
    /// requirements are prepared and its site path is active.
    async fn activate(
        &self,
        context: &Arc<Context>,
        descriptor: &PluginDescriptor,
    ) -> Result<(), PluginError>;

    /// Tears down a previously-activated plugin.
    async fn deactivate(&self, context: &Arc<Context>, name: &str) -> Result<(), PluginError>;
}

/// Accumulated state threaded through the prepare phase, mirroring the
/// original host's chained cache hash and growing site/constraint path
/// lists.
#[derive(Default)]
struct PrepareState {
    cache_hash_chunks: Vec<String>,
    site_paths: Vec<PathBuf>,
    constraint_paths: Vec<PathBuf>,
}

/// Manages plugin discovery, dependency resolution, requirements
/// installation, and activation/deactivation.
pub struct ModuleManager {
    context: Arc<Context>,
    install_mode: InstallMode,
    activation_mode: ActivationMode,
    skip: HashSet<String>,
    preload: Vec<String>,
    plugin_overrides: HashMap<String, Value>,
    plugins_provider: Arc<dyn PluginsProvider>,
    requirements_provider: Arc<dyn RequirementsProvider>,
    config_provider: Arc<dyn ConfigProvider>,
    installer: Arc<dyn RequirementsInstaller>,
    activator: Arc<dyn PluginActivator>,
    /// Activated plugins, in activation order. A `DashMap` does not
    /// preserve insertion order, so the order is tracked separately in
    /// `activation_order`.
    modules: DashMap<String, Arc<PluginDescriptor>>,
    activation_order: parking_lot::Mutex<Vec<String>>,
}

impl ModuleManager {
    /// Creates a new, empty module manager.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: Arc<Context>,
        install_mode: InstallMode,
        activation_mode: ActivationMode,
        skip: HashSet<String>,
        preload: Vec<String>,
        plugin_overrides: HashMap<String, Value>,
        plugins_provider: Arc<dyn PluginsProvider>,
        requirements_provider: Arc<dyn RequirementsProvider>,
        config_provider: Arc<dyn ConfigProvider>,
        installer: Arc<dyn RequirementsInstaller>,
        activator: Arc<dyn PluginActivator>,
    ) -> Self {
        Self {
            context,
            install_mode,
            activation_mode,
            skip,
            preload,
            plugin_overrides,
            plugins_provider,
            requirements_provider,
            config_provider,
            installer,
            activator,
            modules: DashMap::new(),
            activation_order: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Number of currently-active plugins.
    pub fn plugin_count(&self) -> usize {
        self.modules.len()
    }

    /// Returns whether a plugin is currently active.
    pub fn is_active(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Returns the active descriptor for `name`, if it is currently loaded.
    pub fn descriptor(&self, name: &str) -> Option<Arc<PluginDescriptor>> {
        self.modules.get(name).map(|entry| entry.value().clone())
    }

    /// Discovers every plugin known to the plugins provider that isn't
    /// already active, resolves their load order, installs requirements,
    /// and activates them.
    ///
    /// Runs in two passes sharing a single [`PrepareState`]: `preload`
    /// plugins first, then everything else. A preload plugin may bring
    /// tooling (an interpreter, a build backend) that a target-phase
    /// plugin's requirement install depends on, so the preload phase must
    /// fully prepare and activate before the target phase's requirements
    /// are even resolved.
    pub async fn load_all(&self) -> Result<(), PluginError> {
        let already_loaded: HashSet<String> =
            self.modules.iter().map(|entry| entry.key().clone()).collect();
        let known = self.plugins_provider.list_plugins(
            &already_loaded.iter().cloned().collect::<Vec<_>>(),
        );
        let known: Vec<String> = known
            .into_iter()
            .filter(|name| !self.skip.contains(name))
            .collect();

        let preload_set: HashSet<String> = self.preload.iter().cloned().collect();
        let (preload_names, target_names): (Vec<String>, Vec<String>) = known
            .into_iter()
            .partition(|name| preload_set.contains(name));

        let mut state = PrepareState::default();
        let mut already_loaded = already_loaded;

        if !preload_names.is_empty() {
            info!(count = preload_names.len(), "running preload phase");
            self.load_phase(&preload_names, &already_loaded, &mut state)
                .await?;
            already_loaded.extend(preload_names);
        }

        if !target_names.is_empty() {
            info!(count = target_names.len(), "running target phase");
            self.load_phase(&target_names, &already_loaded, &mut state)
                .await?;
        }

        Ok(())
    }

    /// Resolves dependency order within `names`, prepares, and activates
    /// them, threading `state` across the call so a later phase reuses the
    /// cache-hash chain and site/constraint paths an earlier phase built up.
    async fn load_phase(
        &self,
        names: &[String],
        already_loaded: &HashSet<String>,
        state: &mut PrepareState,
    ) -> Result<(), PluginError> {
        let mut metadata_map = HashMap::new();
        let mut descriptors_by_name = HashMap::new();
        for name in names {
            match self.load_descriptor(name).await {
                Ok(descriptor) => {
                    metadata_map.insert(name.clone(), descriptor.metadata.clone());
                    descriptors_by_name.insert(name.clone(), descriptor);
                }
                Err(err) => {
                    error!(plugin = %name, error = %err, "could not build plugin descriptor");
                }
            }
        }

        let order = self.resolve_phase_order(&mut metadata_map, already_loaded)?;

        let mut ordered_descriptors = Vec::new();
        for name in order {
            if let Some(descriptor) = descriptors_by_name.remove(&name) {
                ordered_descriptors.push(descriptor);
            }
        }

        self.prepare_modules(&mut ordered_descriptors, state).await;
        self.activate_modules(ordered_descriptors).await;
        Ok(())
    }

    /// Resolves a load order over `metadata_map`, dropping only the plugin
    /// at fault (and, transitively, whatever turns out to depend on it)
    /// whenever a required dependency is missing, rather than failing the
    /// whole phase: a dependent with a missing hard dependency never reaches
    /// `prepared`, but unrelated plugins in the same phase still activate. A
    /// circular dependency, by contrast, fails the entire phase immediately
    /// — a cycle gives no principled subset to drop, so no partial order is
    /// returned.
    fn resolve_phase_order(
        &self,
        metadata_map: &mut HashMap<String, ModuleMetadata>,
        already_loaded: &HashSet<String>,
    ) -> Result<Vec<String>, PluginError> {
        loop {
            match resolve_dependencies(metadata_map, already_loaded) {
                Ok(order) => return Ok(order),
                Err(DependencyError::MissingDependency { dependency, required_by }) => {
                    error!(
                        plugin = %required_by,
                        dependency = %dependency,
                        "required dependency not present, skipping this module"
                    );
                    metadata_map.remove(&required_by);
                }
                Err(err @ DependencyError::CircularDependency(..)) => {
                    return Err(PluginError::ActivationFailed(
                        "<dependency resolution>".to_string(),
                        err.to_string(),
                    ));
                }
            }
        }
    }

    /// Deactivates every active plugin in exact reverse activation order.
    pub async fn unload_all(&self) {
        let order: Vec<String> = {
            let mut guard = self.activation_order.lock();
            let order = guard.clone();
            guard.clear();
            order
        };

        for name in order.into_iter().rev() {
            if let Err(err) = self.activator.deactivate(&self.context, &name).await {
                warn!(plugin = %name, error = %err, "plugin deinit failed");
            }
            self.modules.remove(&name);
        }
    }

    /// Deactivates a single plugin, refusing if another active plugin still
    /// declares it as a required dependency.
    pub async fn unload_plugin(&self, name: &str) -> Result<(), PluginError> {
        for entry in self.modules.iter() {
            if entry.key() == name {
                continue;
            }
            if entry.value().metadata.depends_on.iter().any(|dep| dep == name) {
                return Err(PluginError::ActivationFailed(
                    name.to_string(),
                    format!("still required by active plugin '{}'", entry.key()),
                ));
            }
        }

        self.activator.deactivate(&self.context, name).await?;
        self.modules.remove(name);
        self.activation_order.lock().retain(|n| n != name);
        Ok(())
    }

    async fn load_descriptor(&self, name: &str) -> Result<PluginDescriptor, PluginError> {
        let loader = self
            .plugins_provider
            .get_plugin_loader(name)
            .ok_or_else(|| PluginError::MissingMetadata(name.to_string()))?;

        if !loader.has_file("metadata.json") {
            return Err(PluginError::MissingMetadata(name.to_string()));
        }
        let raw = loader
            .get_data("metadata.json")
            .map_err(|err| PluginError::Io(name.to_string(), err))?;
        let metadata: ModuleMetadata = serde_json::from_slice(&raw)
            .map_err(|err| PluginError::InvalidMetadata(name.to_string(), err))?;

        let requirements = if loader.has_file("requirements.txt") {
            String::from_utf8_lossy(
                &loader
                    .get_data("requirements.txt")
                    .map_err(|err| PluginError::Io(name.to_string(), err))?,
            )
            .into_owned()
        } else {
            String::new()
        };

        let mut descriptor = PluginDescriptor::new(name, loader, metadata, requirements);
        descriptor.config = self.layer_config(name, &descriptor.loader).await;
        // Only materialize to disk when the manifest demands it or the
        // bundle carries static assets a loader can't serve in place — a
        // plugin with neither has no reason to leave its archive/directory
        // source, per spec §4.4 step 1.
        if descriptor.metadata.extract || descriptor.loader.has_directory("static") {
            descriptor.path = descriptor.loader.materialize().ok();
        }
        Ok(descriptor)
    }

    /// Builds a plugin's effective configuration by layering, lowest
    /// priority first: the plugin's own bundled `config.yml`, the host's
    /// `modules.plugin_overrides` entry for this plugin, and whatever the
    /// custom config provider has stored for it. `${VAR}` / `${VAR:-default}`
    /// references in the merged document are expanded against the process
    /// environment last, so overrides can themselves reference env vars.
    async fn layer_config(&self, name: &str, loader: &Arc<dyn crate::loader::ModuleLoader>) -> Value {
        let mut merged = if loader.has_file("config.yml") {
            match loader.get_data("config.yml") {
                Ok(raw) => serde_yaml::from_slice::<Value>(&raw).unwrap_or(Value::Null),
                Err(err) => {
                    warn!(plugin = %name, error = %err, "failed reading bundled config.yml");
                    Value::Null
                }
            }
        } else {
            Value::Null
        };

        if let Some(override_value) = self.plugin_overrides.get(name) {
            merge_json(&mut merged, override_value.clone());
        }

        match self.config_provider.load_config(name).await {
            Ok(Some(custom)) => merge_json(&mut merged, custom),
            Ok(None) => {}
            Err(err) => warn!(plugin = %name, error = %err, "failed reading custom plugin config"),
        }

        expand_json_env_vars(merged)
    }

    /// Installs (or reuses cached) requirements for every descriptor,
    /// marking each as `prepared` on success. `state` carries the chained
    /// cache hash and growing site/constraint path lists across calls, so a
    /// preload phase's state can be threaded into the following target
    /// phase exactly as the original host does.
    async fn prepare_modules(&self, descriptors: &mut [PluginDescriptor], state: &mut PrepareState) {
        for descriptor in descriptors.iter_mut() {
            if self.skip.contains(&descriptor.name) {
                warn!(plugin = %descriptor.name, "skipping module prepare");
                continue;
            }

            let requirements_hash = format!("{:x}", Sha256::digest(descriptor.requirements.as_bytes()));
            state.cache_hash_chunks.push(requirements_hash);
            let cache_hash = format!(
                "{:x}",
                Sha256::digest(state.cache_hash_chunks.join("_").as_bytes())
            );

            let requirements_txt = std::env::temp_dir().join(format!(
                "pylon-requirements-{}-{}.txt",
                descriptor.name, cache_hash
            ));
            if let Err(err) = std::fs::write(&requirements_txt, &descriptor.requirements) {
                error!(plugin = %descriptor.name, error = %err, "failed writing requirements file");
                continue;
            }

            let requirements_base = if self
                .requirements_provider
                .requirements_exist(&descriptor.name, &cache_hash)
            {
                match self
                    .requirements_provider
                    .get_requirements(&descriptor.name, &cache_hash)
                    .await
                {
                    Ok(path) => path,
                    Err(err) => {
                        error!(plugin = %descriptor.name, error = %err, "failed to fetch cached requirements");
                        continue;
                    }
                }
            } else {
                let fresh_base = std::env::temp_dir().join(format!(
                    "pylon-site-{}-{}",
                    descriptor.name, cache_hash
                ));
                info!(plugin = %descriptor.name, "installing requirements");
                if let Err(err) = self
                    .installer
                    .install(
                        &requirements_txt,
                        &fresh_base,
                        &state.site_paths,
                        &state.constraint_paths,
                    )
                    .await
                {
                    error!(plugin = %descriptor.name, error = %err, "failed to install requirements");
                    continue;
                }
                if let Err(err) = self
                    .requirements_provider
                    .add_requirements(&descriptor.name, &cache_hash, &fresh_base)
                    .await
                {
                    error!(plugin = %descriptor.name, error = %err, "failed to cache requirements");
                }
                fresh_base
            };

            state.site_paths.push(requirements_base.clone());
            descriptor.requirements_base = Some(requirements_base.clone());
            descriptor.requirements_path = Some(requirements_base);

            match self.install_mode {
                InstallMode::Relaxed => {}
                InstallMode::Constrained => {
                    state.constraint_paths.push(requirements_txt);
                }
                InstallMode::Strict => {
                    if let Ok(frozen) = self
                        .installer
                        .freeze(
                            descriptor.requirements_base.as_ref().unwrap(),
                            &state.site_paths,
                        )
                        .await
                    {
                        let frozen_path = std::env::temp_dir().join(format!(
                            "pylon-frozen-{}-{}.txt",
                            descriptor.name, cache_hash
                        ));
                        if std::fs::write(&frozen_path, frozen).is_ok() {
                            state.constraint_paths.push(frozen_path);
                        }
                    }
                }
            }

            descriptor.prepared = true;
        }
    }

    /// Activates every prepared descriptor in order, skipping any whose
    /// required dependencies are not (yet) active.
    async fn activate_modules(&self, descriptors: Vec<PluginDescriptor>) {
        if matches!(self.activation_mode, ActivationMode::Bulk) {
            info!("using bulk module requirements activation mode");
        }

        for descriptor in descriptors {
            if !descriptor.prepared {
                warn!(plugin = %descriptor.name, "skipping un-prepared module");
                continue;
            }

            let missing: Vec<&String> = descriptor
                .metadata
                .depends_on
                .iter()
                .filter(|dep| !self.modules.contains_key(dep.as_str()))
                .collect();
            if !missing.is_empty() {
                error!(plugin = %descriptor.name, missing = ?missing, "required dependency not active, skipping module");
                continue;
            }

            match self.activator.activate(&self.context, &descriptor).await {
                Ok(()) => {
                    let name = descriptor.name.clone();
                    let mut descriptor = descriptor;
                    descriptor.activated = true;
                    self.modules.insert(name.clone(), Arc::new(descriptor));
                    self.activation_order.lock().push(name);
                }
                Err(err) => {
                    error!(plugin = %descriptor.name, error = %err, "failed to activate module");
                }
            }
        }
    }
}

/// Recursively merges `overlay` onto `base`, in place. Objects are merged
/// key-by-key; any other value (including arrays) in `overlay` replaces the
/// corresponding value in `base` wholesale.
fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                merge_json(base_map.entry(key).or_insert(Value::Null), overlay_value);
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value;
        }
    }
}

/// Applies [`expand_env_vars`] to every string leaf in a JSON/YAML value
/// tree, leaving its shape otherwise untouched.
fn expand_json_env_vars(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(expand_env_vars(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(expand_json_env_vars).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, expand_json_env_vars(value)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{FolderConfigProvider, FolderPluginsProvider, FolderRequirementsProvider};
    use async_trait::async_trait;

    struct NoopInstaller;

    #[async_trait]
    impl RequirementsInstaller for NoopInstaller {
        async fn install(
            &self,
            _requirements_path: &std::path::Path,
            target_site_base: &std::path::Path,
            _additional_site_paths: &[PathBuf],
            _constraint_paths: &[PathBuf],
        ) -> Result<(), PluginError> {
            std::fs::create_dir_all(target_site_base).ok();
            Ok(())
        }

        async fn freeze(
            &self,
            _target_site_base: &std::path::Path,
            _additional_site_paths: &[PathBuf],
        ) -> Result<String, PluginError> {
            Ok(String::new())
        }
    }

    struct RecordingActivator {
        activated: parking_lot::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PluginActivator for RecordingActivator {
        async fn activate(
            &self,
            _context: &Arc<Context>,
            descriptor: &PluginDescriptor,
        ) -> Result<(), PluginError> {
            self.activated.lock().push(descriptor.name.clone());
            Ok(())
        }

        async fn deactivate(&self, _context: &Arc<Context>, name: &str) -> Result<(), PluginError> {
            self.activated.lock().retain(|n| n != name);
            Ok(())
        }
    }

    fn write_plugin(root: &std::path::Path, name: &str, depends_on: &[&str]) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        let deps: Vec<String> = depends_on.iter().map(|s| s.to_string()).collect();
        let metadata = serde_json::json!({
            "name": name,
            "version": "1.0.0",
            "module": "module",
            "depends_on": deps,
        });
        std::fs::write(
            dir.join("metadata.json"),
            serde_json::to_vec(&metadata).unwrap(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn load_all_activates_in_dependency_order() {
        let plugins_dir = tempfile::tempdir().unwrap();
        write_plugin(plugins_dir.path(), "auth", &[]);
        write_plugin(plugins_dir.path(), "billing", &["auth"]);

        let requirements_dir = tempfile::tempdir().unwrap();
        let config_dir = tempfile::tempdir().unwrap();

        let activator = Arc::new(RecordingActivator {
            activated: parking_lot::Mutex::new(Vec::new()),
        });

        let manager = ModuleManager::new(
            Context::new("test-node"),
            InstallMode::Relaxed,
            ActivationMode::Steps,
            HashSet::new(),
            Vec::new(),
            HashMap::new(),
            Arc::new(FolderPluginsProvider::new(plugins_dir.path()).unwrap()),
            Arc::new(FolderRequirementsProvider::new(requirements_dir.path()).unwrap()),
            Arc::new(FolderConfigProvider::new(config_dir.path()).unwrap()),
            Arc::new(NoopInstaller),
            activator.clone(),
        );

        manager.load_all().await.unwrap();

        assert_eq!(manager.plugin_count(), 2);
        let order = activator.activated.lock().clone();
        assert_eq!(order, vec!["auth".to_string(), "billing".to_string()]);
    }

    #[tokio::test]
    async fn missing_dependency_skips_dependent_but_not_others() {
        let plugins_dir = tempfile::tempdir().unwrap();
        write_plugin(plugins_dir.path(), "billing", &["auth"]);
        write_plugin(plugins_dir.path(), "telemetry", &[]);

        let requirements_dir = tempfile::tempdir().unwrap();
        let config_dir = tempfile::tempdir().unwrap();
        let activator = Arc::new(RecordingActivator {
            activated: parking_lot::Mutex::new(Vec::new()),
        });

        let manager = ModuleManager::new(
            Context::new("test-node"),
            InstallMode::Relaxed,
            ActivationMode::Bulk,
            HashSet::new(),
            Vec::new(),
            HashMap::new(),
            Arc::new(FolderPluginsProvider::new(plugins_dir.path()).unwrap()),
            Arc::new(FolderRequirementsProvider::new(requirements_dir.path()).unwrap()),
            Arc::new(FolderConfigProvider::new(config_dir.path()).unwrap()),
            Arc::new(NoopInstaller),
            activator.clone(),
        );

        // "auth" is absent entirely: "billing" must be dropped for its
        // missing hard dependency, but "telemetry" has no relationship to
        // it and must still activate normally in the same phase.
        manager.load_all().await.unwrap();

        assert!(!manager.is_active("billing"));
        assert!(manager.is_active("telemetry"));
    }

    #[tokio::test]
    async fn unload_all_reverses_activation_order() {
        let plugins_dir = tempfile::tempdir().unwrap();
        write_plugin(plugins_dir.path(), "auth", &[]);
        write_plugin(plugins_dir.path(), "billing", &["auth"]);

        let requirements_dir = tempfile::tempdir().unwrap();
        let config_dir = tempfile::tempdir().unwrap();
        let activator = Arc::new(RecordingActivator {
            activated: parking_lot::Mutex::new(Vec::new()),
        });

        let manager = ModuleManager::new(
            Context::new("test-node"),
            InstallMode::Relaxed,
            ActivationMode::Steps,
            HashSet::new(),
            Vec::new(),
            HashMap::new(),
            Arc::new(FolderPluginsProvider::new(plugins_dir.path()).unwrap()),
            Arc::new(FolderRequirementsProvider::new(requirements_dir.path()).unwrap()),
            Arc::new(FolderConfigProvider::new(config_dir.path()).unwrap()),
            Arc::new(NoopInstaller),
            activator.clone(),
        );

        manager.load_all().await.unwrap();
        manager.unload_all().await;
        assert_eq!(manager.plugin_count(), 0);
    }

    #[tokio::test]
    async fn preload_plugins_activate_before_target_plugins() {
        let plugins_dir = tempfile::tempdir().unwrap();
        write_plugin(plugins_dir.path(), "cache", &[]);
        write_plugin(plugins_dir.path(), "worker", &[]);

        let requirements_dir = tempfile::tempdir().unwrap();
        let config_dir = tempfile::tempdir().unwrap();
        let activator = Arc::new(RecordingActivator {
            activated: parking_lot::Mutex::new(Vec::new()),
        });

        let manager = ModuleManager::new(
            Context::new("test-node"),
            InstallMode::Relaxed,
            ActivationMode::Steps,
            HashSet::new(),
            vec!["cache".to_string()],
            HashMap::new(),
            Arc::new(FolderPluginsProvider::new(plugins_dir.path()).unwrap()),
            Arc::new(FolderRequirementsProvider::new(requirements_dir.path()).unwrap()),
            Arc::new(FolderConfigProvider::new(config_dir.path()).unwrap()),
            Arc::new(NoopInstaller),
            activator.clone(),
        );

        manager.load_all().await.unwrap();

        let order = activator.activated.lock().clone();
        assert_eq!(order, vec!["cache".to_string(), "worker".to_string()]);
    }

    #[tokio::test]
    async fn config_layers_bundle_defaults_override_and_custom_store() {
        let plugins_dir = tempfile::tempdir().unwrap();
        write_plugin(plugins_dir.path(), "reporting", &[]);
        std::fs::write(
            plugins_dir.path().join("reporting").join("config.yml"),
            "level: info\nnested:\n  a: 1\n",
        )
        .unwrap();

        let requirements_dir = tempfile::tempdir().unwrap();
        let config_dir = tempfile::tempdir().unwrap();
        let config_provider = FolderConfigProvider::new(config_dir.path()).unwrap();
        config_provider
            .save_config("reporting", &serde_json::json!({"nested": {"b": 2}}))
            .await
            .unwrap();

        let activator = Arc::new(RecordingActivator {
            activated: parking_lot::Mutex::new(Vec::new()),
        });

        let mut overrides = HashMap::new();
        overrides.insert("reporting".to_string(), serde_json::json!({"level": "debug"}));

        let manager = ModuleManager::new(
            Context::new("test-node"),
            InstallMode::Relaxed,
            ActivationMode::Steps,
            HashSet::new(),
            Vec::new(),
            overrides,
            Arc::new(FolderPluginsProvider::new(plugins_dir.path()).unwrap()),
            Arc::new(FolderRequirementsProvider::new(requirements_dir.path()).unwrap()),
            Arc::new(config_provider),
            Arc::new(NoopInstaller),
            activator.clone(),
        );

        manager.load_all().await.unwrap();

        let descriptor = manager.descriptor("reporting").unwrap();
        assert_eq!(descriptor.config["level"], serde_json::json!("debug"));
        assert_eq!(descriptor.config["nested"]["a"], serde_json::json!(1));
        assert_eq!(descriptor.config["nested"]["b"], serde_json::json!(2));
    }

    #[tokio::test]
    async fn skipped_plugin_is_never_discovered() {
        let plugins_dir = tempfile::tempdir().unwrap();
        write_plugin(plugins_dir.path(), "legacy", &[]);
        write_plugin(plugins_dir.path(), "current", &[]);

        let requirements_dir = tempfile::tempdir().unwrap();
        let config_dir = tempfile::tempdir().unwrap();
        let activator = Arc::new(RecordingActivator {
            activated: parking_lot::Mutex::new(Vec::new()),
        });

        let mut skip = HashSet::new();
        skip.insert("legacy".to_string());

        let manager = ModuleManager::new(
            Context::new("test-node"),
            InstallMode::Relaxed,
            ActivationMode::Steps,
            skip,
            Vec::new(),
            HashMap::new(),
            Arc::new(FolderPluginsProvider::new(plugins_dir.path()).unwrap()),
            Arc::new(FolderRequirementsProvider::new(requirements_dir.path()).unwrap()),
            Arc::new(FolderConfigProvider::new(config_dir.path()).unwrap()),
            Arc::new(NoopInstaller),
            activator.clone(),
        );

        manager.load_all().await.unwrap();

        assert!(!manager.is_active("legacy"));
        assert!(manager.is_active("current"));
    }
}
