use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// File name looked up in the deployment root.
pub const CONFIG_FILE: &str = "redeploy.json";

/// Root configuration structure for redeploy.json
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    /// Supervisor process name; defaults to the deployment directory name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub supervisor: SupervisorConfig,

    #[serde(default)]
    pub sync: SyncConfig,
}

/// How to reach the process supervisor CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SupervisorConfig {
    #[serde(default = "default_supervisor_program")]
    pub program: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            program: default_supervisor_program(),
        }
    }
}

/// How to run the fast-forward pull.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(default = "default_git_program")]
    pub program: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            program: default_git_program(),
            remote: None,
            branch: None,
        }
    }
}

fn default_supervisor_program() -> String {
    "pm2".to_string()
}

fn default_git_program() -> String {
    "git".to_string()
}

/// Path to redeploy.json inside a deployment root.
pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Load redeploy.json from the deployment root.
/// A missing file yields built-in defaults; an unreadable or invalid one is an error.
pub fn load(root: &Path) -> Result<DeployConfig> {
    let path = config_path(root);

    if !path.exists() {
        return Ok(DeployConfig::default());
    }

    let content = fs::read_to_string(&path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    let config: DeployConfig = serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?;

    config.validate()?;
    Ok(config)
}

impl DeployConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(Error::config_invalid_value(
                    "name",
                    Some(name.clone()),
                    "must not be empty",
                ));
            }
        }

        if self.supervisor.program.trim().is_empty() {
            return Err(Error::config_invalid_value(
                "supervisor.program",
                None,
                "must not be empty",
            ));
        }

        if self.sync.program.trim().is_empty() {
            return Err(Error::config_invalid_value(
                "sync.program",
                None,
                "must not be empty",
            ));
        }

        if self.sync.branch.is_some() && self.sync.remote.is_none() {
            return Err(Error::config_invalid_value(
                "sync.branch",
                self.sync.branch.clone(),
                "requires sync.remote to be set",
            ));
        }

        Ok(())
    }

    /// Supervisor program with `~` expanded.
    pub fn supervisor_program(&self) -> String {
        shellexpand::tilde(&self.supervisor.program).into_owned()
    }

    /// Git program with `~` expanded.
    pub fn git_program(&self) -> String {
        shellexpand::tilde(&self.sync.program).into_owned()
    }
}
