//! Pluggable requirements installation.
//!
//! The original host always shelled out to `pip install --user`. Pylon
//! plugins are not assumed to be Python, so the actual install command is
//! injected through [`RequirementsInstaller`] — the default
//! [`CommandRequirementsInstaller`] runs whatever command line the host is
//! configured with (`modules.installer_command`), substituting placeholders
//! for the requirements file and target site directory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::error::PluginError;

/// Installs and freezes a plugin's declared requirements into an isolated
/// site directory.
#[async_trait]
pub trait RequirementsInstaller: Send + Sync {
    /// Installs `requirements_path` into `target_site_base`, making
    /// `additional_site_paths` visible to the installer (so it can resolve
    /// dependencies already installed for earlier plugins) and constraining
    /// versions via `constraint_paths`.
    async fn install(
        &self,
        requirements_path: &Path,
        target_site_base: &Path,
        additional_site_paths: &[PathBuf],
        constraint_paths: &[PathBuf],
    ) -> Result<(), PluginError>;

    /// Returns the frozen (fully-resolved) requirement set installed under
    /// `target_site_base`, used by the `strict` install mode to constrain
    /// every plugin installed after this one.
    async fn freeze(
        &self,
        target_site_base: &Path,
        additional_site_paths: &[PathBuf],
    ) -> Result<String, PluginError>;
}

/// Runs a configurable external command to install requirements.
///
/// `install_command` and `freeze_command` are the argv template; the
/// literal tokens `{requirements}` and `{site_base}` are substituted with
/// the requirements file path and target site directory respectively.
pub struct CommandRequirementsInstaller {
    install_command: Vec<String>,
    freeze_command: Vec<String>,
    cache_dir: PathBuf,
}

impl CommandRequirementsInstaller {
    /// Creates an installer from the host's configured command templates.
    pub fn new(
        install_command: Vec<String>,
        freeze_command: Vec<String>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            install_command,
            freeze_command,
            cache_dir: cache_dir.into(),
        }
    }
}

#[async_trait]
impl RequirementsInstaller for CommandRequirementsInstaller {
    async fn install(
        &self,
        requirements_path: &Path,
        target_site_base: &Path,
        additional_site_paths: &[PathBuf],
        constraint_paths: &[PathBuf],
    ) -> Result<(), PluginError> {
        let _ = std::fs::create_dir_all(&self.cache_dir);

        let mut args: Vec<String> = self
            .install_command
            .iter()
            .map(|token| substitute(token, requirements_path, target_site_base))
            .collect();
        for constraint in constraint_paths {
            args.push("-c".to_string());
            args.push(constraint.display().to_string());
        }

        let (program, rest) = args
            .split_first()
            .ok_or_else(|| PluginError::RequirementsFailed(
                target_site_base.display().to_string(),
                "empty install command".to_string(),
            ))?;

        let mut command = Command::new(program);
        command
            .args(rest)
            .env("PYTHONUSERBASE", target_site_base)
            .env(
                "PYTHONPATH",
                join_paths(additional_site_paths),
            )
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = command.output().await.map_err(|err| {
            PluginError::RequirementsFailed(target_site_base.display().to_string(), err.to_string())
        })?;

        if !output.status.success() {
            return Err(PluginError::RequirementsFailed(
                target_site_base.display().to_string(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        Ok(())
    }

    async fn freeze(
        &self,
        target_site_base: &Path,
        additional_site_paths: &[PathBuf],
    ) -> Result<String, PluginError> {
        let args: Vec<String> = self
            .freeze_command
            .iter()
            .map(|token| substitute(token, Path::new(""), target_site_base))
            .collect();
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| PluginError::RequirementsFailed(
                target_site_base.display().to_string(),
                "empty freeze command".to_string(),
            ))?;

        let output = Command::new(program)
            .args(rest)
            .env("PYTHONUSERBASE", target_site_base)
            .env("PYTHONPATH", join_paths(additional_site_paths))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|err| {
                PluginError::RequirementsFailed(
                    target_site_base.display().to_string(),
                    err.to_string(),
                )
            })?;

        if !output.status.success() {
            return Err(PluginError::RequirementsFailed(
                target_site_base.display().to_string(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn substitute(token: &str, requirements_path: &Path, site_base: &Path) -> String {
    token
        .replace("{requirements}", &requirements_path.display().to_string())
        .replace("{site_base}", &site_base.display().to_string())
}

fn join_paths(paths: &[PathBuf]) -> String {
    std::env::join_paths(paths)
        .map(|os| os.to_string_lossy().into_owned())
        .unwrap_or_default()
}
