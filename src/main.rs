use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;
mod tty;

use commands::{deploy, status};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "redeploy")]
#[command(version = VERSION)]
#[command(
    about = "Stop a supervised service, fast-forward its checkout, and restart it",
    long_about = "Run from the deployment's own root. The supervisor process name defaults to \
                  that directory's name. Any failure after the service is stopped restarts it \
                  on the previous code and exits non-zero."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stop, fast-forward and restart the target (default)
    Deploy(deploy::DeployArgs),
    /// Show the resolved target, supervisor registration and current revision
    Status(status::StatusArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let command = cli
        .command
        .unwrap_or(Commands::Deploy(deploy::DeployArgs::default()));

    let (json_result, exit_code) = commands::run_json(command, &cli.global);
    output::print_json_result(json_result);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
