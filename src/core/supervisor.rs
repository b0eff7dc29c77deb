//! Process supervisor client.
//!
//! The supervisor is an external program that keeps named processes alive.
//! `Pm2Supervisor` talks to any CLI with pm2's `describe`/`stop`/`restart` verbs.

use crate::error::{Error, Result, SupervisorCommandFailedDetails};
use crate::utils::command;

/// Lifecycle operations on a supervised process.
pub trait Supervisor {
    /// Name shown in diagnostics (e.g. the CLI program).
    fn label(&self) -> &str;

    /// Whether the supervisor currently knows a process by this name.
    fn exists(&self, name: &str) -> bool;

    fn stop(&self, name: &str) -> Result<()>;

    fn restart(&self, name: &str) -> Result<()>;
}

/// Supervisor backed by a pm2-compatible CLI.
#[derive(Debug, Clone)]
pub struct Pm2Supervisor {
    program: String,
}

impl Pm2Supervisor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn lifecycle(&self, action: &str, name: &str) -> Result<()> {
        let args = [action, name];
        let context = format!("{} {}", self.program, action);
        let output = command::capture(&self.program, &args, None, &[], &context)?;

        if output.status.success() {
            return Ok(());
        }

        Err(Error::supervisor_command_failed(
            SupervisorCommandFailedDetails {
                action: action.to_string(),
                name: name.to_string(),
                command: command::display_command(&self.program, &args),
                exit_code: output.status.code(),
                stderr: command::error_text(&output),
            },
        ))
    }
}

impl Default for Pm2Supervisor {
    fn default() -> Self {
        Self::new("pm2")
    }
}

impl Supervisor for Pm2Supervisor {
    fn label(&self) -> &str {
        &self.program
    }

    fn exists(&self, name: &str) -> bool {
        let context = format!("{} describe", self.program);
        match command::capture(&self.program, &["describe", name], None, &[], &context) {
            Ok(output) => output.status.success(),
            Err(err) => {
                log_status!("supervisor", "{}: {}", err.message, err.details);
                false
            }
        }
    }

    fn stop(&self, name: &str) -> Result<()> {
        self.lifecycle("stop", name)
    }

    fn restart(&self, name: &str) -> Result<()> {
        self.lifecycle("restart", name)
    }
}
