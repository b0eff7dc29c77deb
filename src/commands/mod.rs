use clap::Args;
use std::path::PathBuf;

use redeploy::config::{self, DeployConfig};
use redeploy::target::{self, DeployTarget};

pub type CmdResult<T> = redeploy::Result<(T, i32)>;

/// Options shared by every command.
#[derive(Args, Default, Debug)]
pub(crate) struct GlobalArgs {
    /// Deployment root (defaults to the current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Supervisor process name (defaults to the deployment directory name)
    #[arg(long, global = true, value_name = "NAME")]
    pub name: Option<String>,
}

/// Resolve the deployment root, its redeploy.json, and the target.
///
/// Name precedence: `--name`, then `name` in redeploy.json, then the directory name.
pub(crate) fn resolve(global: &GlobalArgs) -> redeploy::Result<(DeployTarget, DeployConfig)> {
    let root = match &global.dir {
        Some(dir) => dir.clone(),
        None => target::working_dir()?,
    };

    let config = config::load(&root)?;
    let name = global.name.as_deref().or(config.name.as_deref());
    let target = DeployTarget::resolve(&root, name)?;

    Ok((target, config))
}

pub mod deploy;
pub mod status;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (redeploy::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Deploy(args) => dispatch!(args, global, deploy),
        crate::Commands::Status(args) => dispatch!(args, global, status),
    }
}
