//! Deploy orchestration: stop, fast-forward, restart.
//!
//! The registration check is a pure precondition and runs unguarded. From the
//! stop step until a successful restart a `RecoveryGuard` is armed, so any
//! failure in that window leaves the service running on the previous code.

use chrono::Utc;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::git::SourceSync;
use crate::guard::{RecoveryGuard, RecoveryOutcome};
use crate::interrupt::InterruptFlag;
use crate::supervisor::Supervisor;
use crate::target::DeployTarget;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployReport {
    pub target: String,
    pub root: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_revision: Option<String>,
    pub updated: bool,
    pub started_at: String,
    pub finished_at: String,
}

/// Run one deploy of `target`.
pub fn run(
    target: &DeployTarget,
    supervisor: &dyn Supervisor,
    sync: &dyn SourceSync,
    interrupt: &InterruptFlag,
) -> Result<DeployReport> {
    let started_at = Utc::now().to_rfc3339();

    log_status!("deploy", "Checking {} for '{}'", supervisor.label(), target.name);
    if !supervisor.exists(&target.name) {
        return Err(Error::target_not_registered(&target.name, supervisor.label()));
    }
    interrupt.check("registration check")?;

    let previous_revision = sync.head_revision();

    let mut guard = RecoveryGuard::arm(supervisor, &target.name);
    if let Err(err) = update(target, supervisor, sync, interrupt) {
        let outcome = guard.fire();
        return Err(annotate_recovery(err, &target.name, outcome));
    }
    guard.disarm();

    let current_revision = sync.head_revision();
    let updated = previous_revision != current_revision;
    log_status!(
        "deploy",
        "'{}' restarted on {}",
        target.name,
        current_revision.as_deref().unwrap_or("unknown revision")
    );

    Ok(DeployReport {
        target: target.name.clone(),
        root: target.root.display().to_string(),
        previous_revision,
        current_revision,
        updated,
        started_at,
        finished_at: Utc::now().to_rfc3339(),
    })
}

fn update(
    target: &DeployTarget,
    supervisor: &dyn Supervisor,
    sync: &dyn SourceSync,
    interrupt: &InterruptFlag,
) -> Result<()> {
    log_status!("deploy", "Stopping '{}'", target.name);
    supervisor.stop(&target.name)?;
    interrupt.check("stop")?;

    log_status!("deploy", "Fast-forwarding {}", target.root.display());
    sync.fast_forward_pull()?;
    interrupt.check("sync")?;

    log_status!("deploy", "Restarting '{}'", target.name);
    supervisor.restart(&target.name)
}

fn annotate_recovery(mut err: Error, name: &str, outcome: Option<RecoveryOutcome>) -> Error {
    let Some(outcome) = outcome else {
        return err;
    };

    let hint = match &outcome {
        RecoveryOutcome::Restarted => {
            format!("'{}' was restarted on the previous code", name)
        }
        RecoveryOutcome::Failed { error } => format!(
            "Recovery restart of '{}' failed ({}); the service may be down",
            name, error
        ),
    };

    if let (Some(details), Ok(recovery)) =
        (err.details.as_object_mut(), serde_json::to_value(&outcome))
    {
        details.insert("recovery".to_string(), recovery);
    }

    err.with_hint(hint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SupervisorCommandFailedDetails;
    use crate::ErrorCode;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct Calls {
        log: RefCell<Vec<&'static str>>,
    }

    impl Calls {
        fn push(&self, call: &'static str) {
            self.log.borrow_mut().push(call);
        }

        fn snapshot(&self) -> Vec<&'static str> {
            self.log.borrow().clone()
        }

        fn count(&self, call: &str) -> usize {
            self.log.borrow().iter().filter(|c| **c == call).count()
        }
    }

    struct FakeSupervisor<'a> {
        calls: &'a Calls,
        registered: bool,
        fail_stop: bool,
        failing_restarts: Cell<u32>,
    }

    impl<'a> FakeSupervisor<'a> {
        fn registered(calls: &'a Calls) -> Self {
            Self {
                calls,
                registered: true,
                fail_stop: false,
                failing_restarts: Cell::new(0),
            }
        }

        fn failure(action: &str) -> Error {
            Error::supervisor_command_failed(SupervisorCommandFailedDetails {
                action: action.to_string(),
                name: "api".to_string(),
                command: format!("pm2 {} api", action),
                exit_code: Some(1),
                stderr: "process errored".to_string(),
            })
        }
    }

    impl Supervisor for FakeSupervisor<'_> {
        fn label(&self) -> &str {
            "pm2"
        }

        fn exists(&self, _name: &str) -> bool {
            self.calls.push("exists");
            self.registered
        }

        fn stop(&self, _name: &str) -> Result<()> {
            self.calls.push("stop");
            if self.fail_stop {
                Err(Self::failure("stop"))
            } else {
                Ok(())
            }
        }

        fn restart(&self, _name: &str) -> Result<()> {
            self.calls.push("restart");
            let remaining = self.failing_restarts.get();
            if remaining > 0 {
                self.failing_restarts.set(remaining - 1);
                Err(Self::failure("restart"))
            } else {
                Ok(())
            }
        }
    }

    struct FakeSync<'a> {
        calls: &'a Calls,
        failure: Option<ErrorCode>,
        interrupt_during_pull: Option<InterruptFlag>,
        pulled: Cell<bool>,
    }

    impl<'a> FakeSync<'a> {
        fn ok(calls: &'a Calls) -> Self {
            Self {
                calls,
                failure: None,
                interrupt_during_pull: None,
                pulled: Cell::new(false),
            }
        }

        fn failing(calls: &'a Calls, code: ErrorCode) -> Self {
            Self {
                failure: Some(code),
                ..Self::ok(calls)
            }
        }
    }

    impl SourceSync for FakeSync<'_> {
        fn fast_forward_pull(&self) -> Result<()> {
            self.calls.push("pull");
            if let Some(flag) = &self.interrupt_during_pull {
                flag.raise();
            }
            match self.failure {
                Some(code) => Err(Error::new(code, "pull refused", serde_json::json!({}))),
                None => {
                    self.pulled.set(true);
                    Ok(())
                }
            }
        }

        fn head_revision(&self) -> Option<String> {
            Some(if self.pulled.get() { "bbb" } else { "aaa" }.to_string())
        }
    }

    fn target() -> DeployTarget {
        DeployTarget::new("api", "/srv/api")
    }

    #[test]
    fn unregistered_target_touches_nothing() {
        let calls = Calls::default();
        let supervisor = FakeSupervisor {
            registered: false,
            ..FakeSupervisor::registered(&calls)
        };
        let sync = FakeSync::ok(&calls);

        let err = run(&target(), &supervisor, &sync, &InterruptFlag::new()).unwrap_err();

        assert_eq!(err.code, ErrorCode::DeployTargetNotRegistered);
        assert_eq!(calls.snapshot(), vec!["exists"]);
        assert!(err.details.get("recovery").is_none());
    }

    #[test]
    fn successful_deploy_never_recovers() {
        let calls = Calls::default();
        let supervisor = FakeSupervisor::registered(&calls);
        let sync = FakeSync::ok(&calls);

        let report = run(&target(), &supervisor, &sync, &InterruptFlag::new()).unwrap();

        assert_eq!(calls.snapshot(), vec!["exists", "stop", "pull", "restart"]);
        assert_eq!(report.target, "api");
        assert_eq!(report.previous_revision.as_deref(), Some("aaa"));
        assert_eq!(report.current_revision.as_deref(), Some("bbb"));
        assert!(report.updated);
    }

    #[test]
    fn divergent_sync_restarts_once() {
        let calls = Calls::default();
        let supervisor = FakeSupervisor::registered(&calls);
        let sync = FakeSync::failing(&calls, ErrorCode::SyncNotFastForward);

        let err = run(&target(), &supervisor, &sync, &InterruptFlag::new()).unwrap_err();

        assert_eq!(err.code, ErrorCode::SyncNotFastForward);
        assert_eq!(calls.snapshot(), vec!["exists", "stop", "pull", "restart"]);
        assert_eq!(calls.count("restart"), 1);
        assert_eq!(err.details["recovery"]["status"], "restarted");
        assert!(err
            .hints
            .iter()
            .any(|h| h.message.contains("restarted on the previous code")));
    }

    #[test]
    fn failed_stop_skips_sync_and_restarts_once() {
        let calls = Calls::default();
        let supervisor = FakeSupervisor {
            fail_stop: true,
            ..FakeSupervisor::registered(&calls)
        };
        let sync = FakeSync::ok(&calls);

        let err = run(&target(), &supervisor, &sync, &InterruptFlag::new()).unwrap_err();

        assert_eq!(err.code, ErrorCode::SupervisorCommandFailed);
        assert_eq!(err.details["action"], "stop");
        assert_eq!(calls.snapshot(), vec!["exists", "stop", "restart"]);
    }

    #[test]
    fn network_sync_failure_restarts_once() {
        let calls = Calls::default();
        let supervisor = FakeSupervisor::registered(&calls);
        let sync = FakeSync::failing(&calls, ErrorCode::SyncFailed);

        let err = run(&target(), &supervisor, &sync, &InterruptFlag::new()).unwrap_err();

        assert_eq!(err.code, ErrorCode::SyncFailed);
        assert_eq!(calls.count("restart"), 1);
    }

    #[test]
    fn failed_restart_is_retried_once_by_guard() {
        let calls = Calls::default();
        let supervisor = FakeSupervisor {
            failing_restarts: Cell::new(1),
            ..FakeSupervisor::registered(&calls)
        };
        let sync = FakeSync::ok(&calls);

        let err = run(&target(), &supervisor, &sync, &InterruptFlag::new()).unwrap_err();

        assert_eq!(err.code, ErrorCode::SupervisorCommandFailed);
        assert_eq!(err.details["action"], "restart");
        assert_eq!(
            calls.snapshot(),
            vec!["exists", "stop", "pull", "restart", "restart"]
        );
        assert_eq!(err.details["recovery"]["status"], "restarted");
    }

    #[test]
    fn failed_recovery_keeps_original_error() {
        let calls = Calls::default();
        let supervisor = FakeSupervisor {
            failing_restarts: Cell::new(5),
            ..FakeSupervisor::registered(&calls)
        };
        let sync = FakeSync::failing(&calls, ErrorCode::SyncNotFastForward);

        let err = run(&target(), &supervisor, &sync, &InterruptFlag::new()).unwrap_err();

        assert_eq!(err.code, ErrorCode::SyncNotFastForward);
        assert_eq!(calls.count("restart"), 1);
        assert_eq!(err.details["recovery"]["status"], "failed");
        assert!(err.hints.iter().any(|h| h.message.contains("may be down")));
    }

    #[test]
    fn interrupt_during_sync_recovers() {
        let calls = Calls::default();
        let flag = InterruptFlag::new();
        let supervisor = FakeSupervisor::registered(&calls);
        let sync = FakeSync {
            interrupt_during_pull: Some(flag.clone()),
            ..FakeSync::ok(&calls)
        };

        let err = run(&target(), &supervisor, &sync, &flag).unwrap_err();

        assert_eq!(err.code, ErrorCode::DeployInterrupted);
        assert_eq!(err.details["step"], "sync");
        assert_eq!(calls.snapshot(), vec!["exists", "stop", "pull", "restart"]);
    }

    #[test]
    fn interrupt_before_stop_arms_nothing() {
        let calls = Calls::default();
        let flag = InterruptFlag::new();
        flag.raise();
        let supervisor = FakeSupervisor::registered(&calls);
        let sync = FakeSync::ok(&calls);

        let err = run(&target(), &supervisor, &sync, &flag).unwrap_err();

        assert_eq!(err.code, ErrorCode::DeployInterrupted);
        assert_eq!(calls.snapshot(), vec!["exists"]);
    }
}
