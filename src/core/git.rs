use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::config::DeployConfig;
use crate::error::{Error, Result, SyncFailedDetails};
use crate::utils::command;

/// Untranslated git messages, so divergence detection works on any locale.
const PULL_ENV: &[(&str, &str)] = &[("LC_ALL", "C")];

/// Advances a checkout to its upstream state.
pub trait SourceSync {
    /// Fast-forward the checkout. Divergent history is an error, never merged.
    fn fast_forward_pull(&self) -> Result<()>;

    /// Current commit, if it can be read.
    fn head_revision(&self) -> Option<String> {
        None
    }
}

/// Fast-forward-only sync through the git CLI.
#[derive(Debug, Clone)]
pub struct GitSync {
    program: String,
    path: PathBuf,
    remote: Option<String>,
    branch: Option<String>,
}

impl GitSync {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            program: "git".to_string(),
            path: path.into(),
            remote: None,
            branch: None,
        }
    }

    pub fn from_config(path: impl Into<PathBuf>, config: &DeployConfig) -> Self {
        Self {
            program: config.git_program(),
            path: path.into(),
            remote: config.sync.remote.clone(),
            branch: config.sync.branch.clone(),
        }
    }

    fn pull_args(&self) -> Vec<&str> {
        let mut args = vec!["pull", "--ff-only"];
        if let Some(remote) = &self.remote {
            args.push(remote);
            if let Some(branch) = &self.branch {
                args.push(branch);
            }
        }
        args
    }
}

impl SourceSync for GitSync {
    fn fast_forward_pull(&self) -> Result<()> {
        let args = self.pull_args();
        let output = command::capture(
            &self.program,
            &args,
            Some(&self.path),
            PULL_ENV,
            "git pull --ff-only",
        )
        .map_err(|err| {
            Error::sync_failed(SyncFailedDetails {
                path: self.path.display().to_string(),
                command: command::display_command(&self.program, &args),
                exit_code: None,
                stderr: err.details["error"].as_str().unwrap_or(&err.message).to_string(),
            })
        })?;

        if output.status.success() {
            return Ok(());
        }

        let details = SyncFailedDetails {
            path: self.path.display().to_string(),
            command: command::display_command(&self.program, &args),
            exit_code: output.status.code(),
            stderr: command::error_text(&output),
        };

        if is_divergence(&details.stderr) {
            Err(Error::sync_not_fast_forward(details))
        } else {
            Err(Error::sync_failed(details))
        }
    }

    fn head_revision(&self) -> Option<String> {
        command::run_in_optional(&self.path, &self.program, &["rev-parse", "HEAD"])
    }
}

/// Whether git output says the pull was refused because history diverged.
pub fn is_divergence(output: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?i)not possible to fast-forward|diverg|non-fast-forward")
                .expect("divergence pattern is valid")
        })
        .is_match(output)
}
