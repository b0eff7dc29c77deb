//! Failure guard for the stop/sync/restart window.
//!
//! `RecoveryGuard` is armed right before the service is stopped. If it is
//! dropped while still armed (early `?` return or a panic unwinding through
//! the deploy), it asks the supervisor to restart the target. It fires at most
//! once and never propagates an error from the recovery restart.

use serde::Serialize;

use crate::supervisor::Supervisor;

/// What happened when the guard fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecoveryOutcome {
    Restarted,
    Failed { error: String },
}

pub struct RecoveryGuard<'a> {
    supervisor: &'a dyn Supervisor,
    name: &'a str,
    armed: bool,
}

impl<'a> RecoveryGuard<'a> {
    pub fn arm(supervisor: &'a dyn Supervisor, name: &'a str) -> Self {
        log_status!("guard", "Armed: {} will be restarted if the update fails", name);
        Self {
            supervisor,
            name,
            armed: true,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Close the risk window without running recovery.
    pub fn disarm(mut self) {
        self.armed = false;
    }

    /// Run the recovery restart now. Returns `None` if the guard already fired
    /// or was disarmed.
    pub fn fire(&mut self) -> Option<RecoveryOutcome> {
        if !self.armed {
            return None;
        }
        self.armed = false;

        log_status!("guard", "Update failed, restarting {}", self.name);
        let outcome = match self.supervisor.restart(self.name) {
            Ok(()) => RecoveryOutcome::Restarted,
            Err(err) => {
                log_status!("guard", "Recovery restart of {} failed: {}", self.name, err);
                RecoveryOutcome::Failed {
                    error: err.to_string(),
                }
            }
        };
        Some(outcome)
    }
}

impl Drop for RecoveryGuard<'_> {
    fn drop(&mut self) {
        self.fire();
    }
}
