//! The out-of-process [`PluginActivator`]: the concrete activation/
//! deactivation strategy the host binary wires into [`crate::ModuleManager`].
//!
//! Spec §9 REDESIGN FLAGS names two ways to replace the original's "import
//! arbitrary third-party code into this address space" model; this is the
//! preferred one. Each plugin's entry point is spawned as a child process
//! with piped stdio, and `init()`/`deinit()` become a newline-delimited JSON
//! request/response exchanged over that pipe rather than a direct call into
//! loaded code — the same shape as the requirements installer's existing
//! "spawn an external command and read its outcome" pattern, extended to a
//! a long-lived process instead of a one-shot one. The broker-backed
//! [`pylon_rpc::RpcManager`]/[`pylon_events::EventBus`] a plugin needs for
//! its own routes/slots/events stay out of this handshake entirely — the
//! actual message bus is an external collaborator, so a worker that
//! wants cluster-wide RPC or event registration reaches the same broker the
//! host does directly, rather than proxying through this process's pipes.
use async_trait::async_trait;
use pylon_core::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tracing::{info, warn};

use crate::descriptor::PluginDescriptor;
use crate::error::PluginError;
use crate::manager::PluginActivator;

/// One line of the newline-delimited JSON protocol spoken over a worker's
/// stdin/stdout.
#[derive(Debug, Serialize)]
struct WorkerRequest<'a> {
    command: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<&'a Value>,
}

#[derive(Debug, Deserialize)]
struct WorkerResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

struct RunningWorker {
    child: Child,
    stdin: ChildStdin,
}

/// Spawns each plugin's entry point as a long-lived child process and
/// drives its `init`/`deinit` lifecycle over a line-JSON protocol on its
/// stdio pipes.
///
/// Grounded on `pylon/core/tools/module/manager.py`'s `init`/`deinit` pair
/// (called directly against an in-process object there) and on
/// `CommandRequirementsInstaller`'s existing `tokio::process::Command`
/// spawn pattern in this crate, reframed as a persistent worker instead of
/// a one-shot install command.
pub struct ProcessPluginActivator {
    init_timeout: Duration,
    deinit_timeout: Duration,
    /// Grace period between sending `deinit` and force-killing a worker
    /// that hasn't exited on its own.
    shutdown_grace: Duration,
    workers: parking_lot::Mutex<HashMap<String, RunningWorker>>,
}

impl ProcessPluginActivator {
    /// Creates an activator bounding each handshake by `init_timeout` /
    /// `deinit_timeout`, with a fixed 5-second post-`deinit` kill grace
    /// period.
    pub fn new(init_timeout: Duration, deinit_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            init_timeout,
            deinit_timeout,
            shutdown_grace: Duration::from_secs(5),
            workers: parking_lot::Mutex::new(HashMap::new()),
        })
    }

    /// Resolves the executable this plugin's manifest names, relative to
    /// its materialized bundle path when one exists, falling back to
    /// resolving it on `PATH` (e.g. a preload plugin that is itself a
    /// system tool rather than a bundled binary).
    fn resolve_executable(descriptor: &PluginDescriptor) -> std::path::PathBuf {
        match &descriptor.path {
            Some(path) => {
                let candidate = path.join(&descriptor.metadata.module);
                if candidate.exists() {
                    candidate
                } else {
                    std::path::PathBuf::from(&descriptor.metadata.module)
                }
            }
            None => std::path::PathBuf::from(&descriptor.metadata.module),
        }
    }

    /// Writes `request` as a single JSON line to `stdin`, then reads and
    /// parses a single JSON line of response, bounded by `timeout`.
    async fn exchange(
        stdin: &mut ChildStdin,
        stdout: &mut BufReader<tokio::process::ChildStdout>,
        request: &WorkerRequest<'_>,
        timeout: Duration,
    ) -> Result<WorkerResponse, String> {
        let mut line = serde_json::to_string(request).map_err(|err| err.to_string())?;
        line.push('\n');

        tokio::time::timeout(timeout, async {
            stdin.write_all(line.as_bytes()).await.map_err(|err| err.to_string())?;
            stdin.flush().await.map_err(|err| err.to_string())?;

            let mut response_line = String::new();
            let bytes_read = stdout
                .read_line(&mut response_line)
                .await
                .map_err(|err| err.to_string())?;
            if bytes_read == 0 {
                return Err("worker closed stdout before responding".to_string());
            }
            serde_json::from_str::<WorkerResponse>(response_line.trim_end())
                .map_err(|err| format!("invalid worker response: {err}"))
        })
        .await
        .map_err(|_| format!("worker did not respond within {timeout:?}"))?
    }
}

#[async_trait]
impl PluginActivator for ProcessPluginActivator {
    async fn activate(
        &self,
        _context: &Arc<Context>,
        descriptor: &PluginDescriptor,
    ) -> Result<(), PluginError> {
        let executable = Self::resolve_executable(descriptor);
        let mut command = tokio::process::Command::new(&executable);
        command
            .env("PYLON_PLUGIN_NAME", &descriptor.name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        if let Some(site_path) = &descriptor.requirements_path {
            command.env("PYLON_PLUGIN_SITE", site_path);
        }
        if let Some(bundle_path) = &descriptor.path {
            command.current_dir(bundle_path);
        }

        let mut child = command.spawn().map_err(|err| {
            PluginError::ActivationFailed(
                descriptor.name.clone(),
                format!("failed to spawn '{}': {err}", executable.display()),
            )
        })?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            PluginError::ActivationFailed(descriptor.name.clone(), "worker has no stdin".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            PluginError::ActivationFailed(descriptor.name.clone(), "worker has no stdout".to_string())
        })?;
        let mut reader = BufReader::new(stdout);

        let request = WorkerRequest {
            command: "init",
            config: Some(&descriptor.config),
        };
        let result = Self::exchange(&mut stdin, &mut reader, &request, self.init_timeout).await;

        match result {
            Ok(response) if response.ok => {
                self.workers
                    .lock()
                    .insert(descriptor.name.clone(), RunningWorker { child, stdin });
                info!(plugin = %descriptor.name, "plugin worker activated");
                Ok(())
            }
            Ok(response) => {
                let _ = child.start_kill();
                Err(PluginError::ActivationFailed(
                    descriptor.name.clone(),
                    response.error.unwrap_or_else(|| "init reported failure".to_string()),
                ))
            }
            Err(message) => {
                let _ = child.start_kill();
                Err(PluginError::ActivationFailed(descriptor.name.clone(), message))
            }
        }
    }

    async fn deactivate(&self, _context: &Arc<Context>, name: &str) -> Result<(), PluginError> {
        let worker = self.workers.lock().remove(name);
        let Some(RunningWorker { mut child, mut stdin }) = worker else {
            return Ok(());
        };

        let request = WorkerRequest {
            command: "deinit",
            config: None,
        };
        let mut line = serde_json::to_string(&request).unwrap_or_default();
        line.push('\n');
        if let Err(err) =
            tokio::time::timeout(self.deinit_timeout, async { stdin.write_all(line.as_bytes()).await })
                .await
        {
            warn!(plugin = %name, error = %err, "deinit request timed out, terminating worker anyway");
        }
        drop(stdin);

        match tokio::time::timeout(self.shutdown_grace, child.wait()).await {
            Ok(Ok(status)) => {
                info!(plugin = %name, ?status, "plugin worker exited");
            }
            Ok(Err(err)) => {
                warn!(plugin = %name, error = %err, "failed waiting on plugin worker");
            }
            Err(_) => {
                warn!(plugin = %name, "plugin worker did not exit within grace period, killing");
                let _ = child.start_kill();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ModuleMetadata;

    fn descriptor(name: &str, module: &str) -> PluginDescriptor {
        let loader = Arc::new(crate::loader::FilesystemLoader::new(std::env::temp_dir()));
        let metadata = ModuleMetadata {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            module: module.to_string(),
            ..Default::default()
        };
        PluginDescriptor::new(name, loader, metadata, String::new())
    }

    #[tokio::test]
    async fn activation_fails_when_executable_is_missing() {
        let activator = ProcessPluginActivator::new(Duration::from_millis(100), Duration::from_millis(100));
        let context = Context::new("test-node");

        let err = activator
            .activate(&context, &descriptor("ghost", "/nonexistent/executable/pylon-plugin-test"))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::ActivationFailed(_, _)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn activation_fails_when_the_worker_echoes_instead_of_acking() {
        let activator = ProcessPluginActivator::new(Duration::from_millis(50), Duration::from_millis(50));
        let context = Context::new("test-node");

        // "cat" never acks with `{"ok":true}` — it either stays silent
        // until the timeout fires or echoes the request back as garbage,
        // so activation is rejected either way.
        let err = activator.activate(&context, &descriptor("echoer", "cat")).await;
        assert!(err.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn activation_succeeds_against_a_worker_that_acks_init() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script_path = dir.path().join("worker.sh");
        {
            let mut file = std::fs::File::create(&script_path).unwrap();
            // Reads one line (the `init` request), ignores it, acks, then
            // blocks on a second read so the process survives until
            // `deactivate` closes its stdin.
            writeln!(file, "#!/bin/sh\nread _req\necho '{{\"ok\":true}}'\nread _wait").unwrap();
        }
        std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let activator = ProcessPluginActivator::new(Duration::from_secs(2), Duration::from_secs(2));
        let context = Context::new("test-node");
        let desc = descriptor("shellworker", script_path.to_str().unwrap());

        activator.activate(&context, &desc).await.unwrap();
        assert!(activator.workers.lock().contains_key("shellworker"));
        activator.deactivate(&context, "shellworker").await.unwrap();
        assert!(!activator.workers.lock().contains_key("shellworker"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn deactivate_without_a_tracked_worker_is_a_noop() {
        let activator = ProcessPluginActivator::new(Duration::from_millis(20), Duration::from_millis(20));
        let context = Context::new("test-node");
        activator.deactivate(&context, "never-activated").await.unwrap();
    }

    #[allow(dead_code)]
    fn assert_send_sync<T: Send + Sync>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send_sync::<ProcessPluginActivator>();
    }
}
