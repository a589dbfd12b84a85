//! The lifecycle supervisor: wires every other Pylon crate into one running
//! node and drives its startup and shutdown sequences.
//!
//! Startup and shutdown proceed in a fixed order: logging,
//! [`pylon_core::Context`], configuration, the module manager, event bus,
//! RPC manager, slot manager, module activation, reverse-proxy registration,
//! and exposure — each step best-effort, so a failure in one is logged and
//! the remaining steps still run.

pub mod error;
pub mod logging;
pub mod reaper;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pylon_config::PylonConfig;
use pylon_core::Context;
use pylon_events::{EventBus, EventTransport};
use pylon_exposure::{ExposureFabric, LocalRequestHandler, LocalSioHandler, ReverseProxyRegistrar};
use pylon_plugin::providers::{build_config_provider, build_plugins_provider, build_requirements_provider};
use pylon_plugin::{CommandRequirementsInstaller, ModuleManager, PluginActivator, ProcessPluginActivator};
use pylon_rpc::{NoopSessionScope, RpcManager, RpcTransport, SessionScope};
use pylon_slots::SlotManager;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use error::{RuntimeError, RuntimeResult};
pub use logging::init as init_logging;

/// Interval the zombie reaper wakes on, matching
/// `pylon/core/tools/signal.py::ZombieReaper`'s default poll period.
const REAPER_INTERVAL: Duration = Duration::from_secs(5);

/// A fully wired, not-yet-started Pylon node.
///
/// Every subsystem handle is public so the host binary can reach past the
/// supervisor when it needs to — e.g. to hand the HTTP server a clone of
/// `exposure` for its catch-all forwarding routes, or `rpc_manager` so
/// plugin-adjacent code registers its own functions.
pub struct Supervisor {
    pub context: Arc<Context>,
    pub config: PylonConfig,
    pub module_manager: Arc<ModuleManager>,
    pub event_bus: Arc<EventBus>,
    pub rpc_manager: Arc<RpcManager>,
    pub slot_manager: Arc<SlotManager>,
    pub exposure: Arc<ExposureFabric>,
    pub registrar: Arc<ReverseProxyRegistrar>,
    reaper_handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Supervisor {
    /// Builds every subsystem from `config`, in leaf-first dependency order
    /// (Context → Registry → Providers → Plugin Loader → Event Bus → RPC →
    /// Slot Manager → Module Manager → Exposure → Reverse-proxy registrar),
    /// using `activator` to drive plugin activation and `session_scope` to
    /// bracket RPC dispatch.
    ///
    /// Does not call [`Supervisor::start`] — construction and startup are
    /// kept separate so a caller can inspect or override a subsystem handle
    /// (e.g. swap in a non-folder provider) between the two.
    pub fn bootstrap(
        config: PylonConfig,
        activator: Arc<dyn PluginActivator>,
        session_scope: Arc<dyn SessionScope>,
    ) -> RuntimeResult<Arc<Self>> {
        let mut context = Context::new(config.node.name.clone());
        {
            let context_mut = Arc::get_mut(&mut context)
                .expect("context has no other owners immediately after construction");
            context_mut.url_prefix = config.node.url_prefix.clone();
            context_mut.debug = config.node.debug;
        }

        let base_path = PathBuf::from(&config.modules.base_path);

        let plugins_provider = build_plugins_provider(
            &config.modules.plugins_provider,
            &base_path.join("plugins"),
        )
        .map_err(|err| RuntimeError::StepStartFailed("plugins provider".to_string(), err.to_string()))?;

        let requirements_provider = build_requirements_provider(
            &config.modules.requirements_provider,
            &base_path.join("requirements"),
        )
        .map_err(|err| RuntimeError::StepStartFailed("requirements provider".to_string(), err.to_string()))?;

        let config_provider = build_config_provider(
            &config.modules.config_provider,
            &base_path.join("config"),
        )
        .map_err(|err| RuntimeError::StepStartFailed("config provider".to_string(), err.to_string()))?;

        let installer = Arc::new(CommandRequirementsInstaller::new(
            config.modules.installer_command.clone(),
            config.modules.installer_freeze_command.clone(),
            base_path.join("scratch"),
        ));

        let module_manager = Arc::new(ModuleManager::new(
            Arc::clone(&context),
            config.modules.install_mode,
            config.modules.activation_mode,
            config.modules.skip.iter().cloned().collect(),
            config.modules.preload.clone(),
            config.modules.plugin_overrides.clone(),
            plugins_provider,
            requirements_provider,
            config_provider,
            installer,
            activator,
        ));

        let event_bus = Arc::new(EventBus::new(EventTransport::select(&config.events)));

        let rpc_manager = RpcManager::new(
            RpcTransport::select(&config.rpc),
            Duration::from_secs(config.rpc.default_timeout_secs.max(1)),
            session_scope,
        );

        let slot_manager = SlotManager::new(
            Arc::clone(&context),
            Arc::clone(&rpc_manager),
            Arc::clone(&event_bus),
        );

        let exposure = ExposureFabric::new(
            Arc::clone(&context),
            Arc::clone(&rpc_manager),
            Arc::clone(&event_bus),
            config.exposure.clone(),
        );

        let registrar = Arc::new(ReverseProxyRegistrar::new(
            Arc::clone(&context),
            config.traefik.clone(),
        ));

        Ok(Arc::new(Self {
            context,
            config,
            module_manager,
            event_bus,
            rpc_manager,
            slot_manager,
            exposure,
            registrar,
            reaper_handle: parking_lot::Mutex::new(None),
        }))
    }

    /// Convenience constructor using the out-of-process
    /// [`ProcessPluginActivator`] and a no-op session scope, for hosts with
    /// no database configured.
    pub fn bootstrap_default(config: PylonConfig) -> RuntimeResult<Arc<Self>> {
        let activator = ProcessPluginActivator::new(
            Duration::from_secs(30),
            Duration::from_secs(10),
        );
        Self::bootstrap(config, activator, Arc::new(NoopSessionScope))
    }

    /// Runs the startup sequence: spawns the zombie reaper,
    /// loads and activates every discovered plugin, registers with the
    /// reverse proxy, then exposes and/or starts handling for the peer
    /// fabric. Every step is best-effort; a failure is logged and the
    /// sequence continues.
    pub async fn start(
        self: &Arc<Self>,
        local_handler: Arc<dyn LocalRequestHandler>,
        local_sio_handler: Arc<dyn LocalSioHandler>,
    ) {
        info!(node = %self.context.node_name, id = %self.context.id, "starting pylon node");

        {
            let context = Arc::clone(&self.context);
            let handle = tokio::spawn(async move { reaper::run(context, REAPER_INTERVAL).await });
            *self.reaper_handle.lock() = Some(handle);
        }

        if let Err(err) = self.module_manager.load_all().await {
            warn!(error = %err, "module manager load_all failed");
        }

        if let Err(err) = self.registrar.register().await {
            warn!(error = %err, "reverse-proxy registration failed");
        }

        if self.config.exposure.expose {
            self.exposure.expose(local_handler, local_sio_handler).await;
        }
        if self.config.exposure.handle_enabled {
            self.exposure.handle();
        }

        info!("pylon node startup complete");
    }

    /// Blocks until a termination signal arrives or
    /// [`pylon_core::Context::request_shutdown`] is called by other means
    /// (e.g. a hot-reload gate), then runs [`Supervisor::shutdown`].
    pub async fn run_until_shutdown(self: &Arc<Self>) {
        self.wait_for_shutdown_signal().await;
        self.shutdown().await;
    }

    async fn wait_for_shutdown_signal(&self) {
        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler, falling back to Ctrl+C only");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
            tokio::select! {
                _ = self.context.stop_event.cancelled() => {}
                _ = tokio::signal::ctrl_c() => info!("received Ctrl+C, shutting down"),
                _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            }
        }
        #[cfg(not(unix))]
        {
            tokio::select! {
                _ = self.context.stop_event.cancelled() => {}
                _ = tokio::signal::ctrl_c() => info!("received Ctrl+C, shutting down"),
            }
        }
        self.context.request_shutdown();
    }

    /// Runs the shutdown sequence: unexpose → proxy unregister
    /// → module deinit → reaper stop. Every step is best-effort and runs
    /// regardless of whether an earlier step failed.
    pub async fn shutdown(&self) {
        info!("shutting down pylon node");
        self.context.request_shutdown();

        self.exposure.unexpose().await;

        if let Err(err) = self.registrar.unregister().await {
            warn!(error = %err, "reverse-proxy de-registration failed");
        }

        self.module_manager.unload_all().await;

        if let Some(handle) = self.reaper_handle.lock().take() {
            let _ = handle.await;
        }

        info!("pylon node shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pylon_plugin::PluginDescriptor;
    use serde_json::Value;
    use std::path::Path;

    struct NoopActivator;

    #[async_trait]
    impl PluginActivator for NoopActivator {
        async fn activate(
            &self,
            _context: &Arc<Context>,
            _descriptor: &PluginDescriptor,
        ) -> Result<(), pylon_plugin::PluginError> {
            Ok(())
        }
        async fn deactivate(&self, _context: &Arc<Context>, _name: &str) -> Result<(), pylon_plugin::PluginError> {
            Ok(())
        }
    }

    struct NoopHandler;

    #[async_trait]
    impl LocalRequestHandler for NoopHandler {
        async fn handle(
            &self,
            _request: pylon_exposure::ForwardedRequest,
        ) -> pylon_exposure::ForwardedResponse {
            pylon_exposure::ForwardedResponse::text(404, "not found")
        }
    }

    struct NoopSio;

    #[async_trait]
    impl LocalSioHandler for NoopSio {
        async fn handle(&self, _event: String, _namespace: String, _args: Value) {}
    }

    fn test_config(base_path: &Path) -> PylonConfig {
        let mut config = PylonConfig::default();
        config.modules.base_path = base_path.display().to_string();
        config.modules.installer_command = vec!["true".to_string()];
        config.modules.installer_freeze_command = vec!["true".to_string()];
        config
    }

    #[tokio::test]
    async fn bootstrap_wires_every_subsystem() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor =
            Supervisor::bootstrap(test_config(dir.path()), Arc::new(NoopActivator), Arc::new(NoopSessionScope))
                .unwrap();

        assert_eq!(supervisor.module_manager.plugin_count(), 0);
        assert!(!supervisor.context.is_stopping());
    }

    #[tokio::test]
    async fn start_then_shutdown_completes_without_plugins() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor =
            Supervisor::bootstrap(test_config(dir.path()), Arc::new(NoopActivator), Arc::new(NoopSessionScope))
                .unwrap();

        supervisor.start(Arc::new(NoopHandler), Arc::new(NoopSio)).await;
        supervisor.shutdown().await;

        assert!(supervisor.context.is_stopping());
    }
}
