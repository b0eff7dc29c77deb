use serde::Serialize;

use crate::git::SourceSync;
use crate::supervisor::Supervisor;
use crate::target::DeployTarget;

/// Read-only view of a deployment: nothing is stopped, pulled or restarted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub target: String,
    pub root: String,
    pub supervisor: String,
    pub registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

pub fn inspect(
    target: &DeployTarget,
    supervisor: &dyn Supervisor,
    sync: &dyn SourceSync,
) -> StatusReport {
    StatusReport {
        target: target.name.clone(),
        root: target.root.display().to_string(),
        supervisor: supervisor.label().to_string(),
        registered: supervisor.exists(&target.name),
        revision: sync.head_revision(),
    }
}
