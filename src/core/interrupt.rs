//! Ctrl+C / SIGTERM tracking.
//!
//! The handler only records the signal. Child processes in the same process
//! group receive it too and fail on their own; the orchestrator also checks
//! the flag between steps so an interrupted deploy goes down the normal
//! failure path and the recovery guard restores the service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
}

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a process-wide Ctrl+C/SIGTERM handler that raises this flag.
    pub fn install(&self) -> Result<()> {
        let raised = Arc::clone(&self.raised);
        ctrlc::set_handler(move || {
            raised.store(true, Ordering::SeqCst);
        })
        .map_err(|e| Error::internal_unexpected(format!("install signal handler: {}", e)))
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Fail with `deploy.interrupted` if a signal arrived.
    pub fn check(&self, step: &str) -> Result<()> {
        if self.is_raised() {
            Err(Error::deploy_interrupted(step))
        } else {
            Ok(())
        }
    }
}
