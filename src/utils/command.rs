//! Command execution primitives with consistent error handling.

use std::path::Path;
use std::process::{Command, Output};

use crate::error::{Error, Result};

/// Run a command and capture its output, whatever its exit status.
///
/// Only a spawn failure (missing program, bad working directory) is an error;
/// callers decide what a non-zero exit means. `envs` are set on the child only.
pub fn capture(
    program: &str,
    args: &[&str],
    dir: Option<&Path>,
    envs: &[(&str, &str)],
    context: &str,
) -> Result<Output> {
    let mut command = Command::new(program);
    command.args(args);
    command.envs(envs.iter().copied());
    if let Some(dir) = dir {
        command.current_dir(dir);
    }

    command.output().map_err(|e| {
        Error::internal_io(
            format!("Failed to run {}: {}", context, e),
            Some(context.to_string()),
        )
    })
}

/// Run a command in a directory, returning None on failure instead of error.
///
/// Useful when command failure is expected/acceptable (e.g., reading HEAD in a fresh repo).
pub fn run_in_optional(dir: &Path, program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() {
        None
    } else {
        Some(stdout)
    }
}

/// Extract error text from command output.
///
/// Prefers stderr, falls back to stdout if stderr is empty.
pub fn error_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        stderr.trim().to_string()
    } else {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }
}

/// Render a program and its arguments for error details.
pub fn display_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_returns_output_for_failing_command() {
        let output = capture("false", &[], None, &[], "false test").unwrap();
        assert!(!output.status.success());
    }

    #[test]
    fn capture_sets_child_environment() {
        let output = capture(
            "sh",
            &["-c", "printf %s \"$LC_ALL\""],
            None,
            &[("LC_ALL", "C")],
            "env test",
        )
        .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), "C");
    }

    #[test]
    fn capture_fails_with_invalid_command() {
        let result = capture("nonexistent_command_xyz", &[], None, &[], "test");
        let err = result.unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::InternalIoError);
    }

    #[test]
    fn run_in_optional_returns_none_on_failure() {
        let result = run_in_optional(Path::new("/tmp"), "false", &[]);
        assert!(result.is_none());
    }

    #[test]
    fn run_in_optional_trims_stdout() {
        let result = run_in_optional(Path::new("/tmp"), "echo", &["hello"]);
        assert_eq!(result.as_deref(), Some("hello"));
    }

    #[test]
    fn error_text_prefers_stderr() {
        let output = Output {
            status: std::process::ExitStatus::default(),
            stdout: b"stdout content".to_vec(),
            stderr: b"stderr content".to_vec(),
        };
        assert_eq!(error_text(&output), "stderr content");
    }

    #[test]
    fn error_text_falls_back_to_stdout() {
        let output = Output {
            status: std::process::ExitStatus::default(),
            stdout: b"stdout content".to_vec(),
            stderr: b"".to_vec(),
        };
        assert_eq!(error_text(&output), "stdout content");
    }

    #[test]
    fn display_command_joins_program_and_args() {
        assert_eq!(display_command("pm2", &["stop", "api"]), "pm2 stop api");
    }
}
