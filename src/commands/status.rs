use clap::Args;
use serde_json::Value;

use redeploy::git::GitSync;
use redeploy::status;
use redeploy::supervisor::Pm2Supervisor;

use super::{CmdResult, GlobalArgs};

#[derive(Args, Default, Debug)]
pub struct StatusArgs {}

pub fn run(_args: StatusArgs, global: &GlobalArgs) -> CmdResult<Value> {
    let (target, config) = super::resolve(global)?;

    let supervisor = Pm2Supervisor::new(config.supervisor_program());
    let sync = GitSync::from_config(&target.root, &config);

    let report = status::inspect(&target, &supervisor, &sync);
    let json = serde_json::to_value(report)
        .map_err(|e| redeploy::Error::internal_json(e.to_string(), None))?;
    Ok((json, 0))
}
