use clap::Args;
use serde_json::Value;

use redeploy::deploy;
use redeploy::git::GitSync;
use redeploy::interrupt::InterruptFlag;
use redeploy::supervisor::Pm2Supervisor;

use super::{CmdResult, GlobalArgs};

#[derive(Args, Default, Debug)]
pub struct DeployArgs {
    /// Accept --json for compatibility (output is JSON by default)
    #[arg(long, hide = true)]
    pub json: bool,
}

pub fn run(_args: DeployArgs, global: &GlobalArgs) -> CmdResult<Value> {
    let (target, config) = super::resolve(global)?;

    let interrupt = InterruptFlag::new();
    interrupt.install()?;

    let supervisor = Pm2Supervisor::new(config.supervisor_program());
    let sync = GitSync::from_config(&target.root, &config);

    crate::tty::status(&format!("redeploy: updating '{}'...", target.name));
    let report = deploy::run(&target, &supervisor, &sync, &interrupt)?;

    let json = serde_json::to_value(report)
        .map_err(|e| redeploy::Error::internal_json(e.to_string(), None))?;
    Ok((json, 0))
}
