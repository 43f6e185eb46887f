//! Launch step: command-line parsing and process creation.

use std::process::Stdio;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::warn;

use crate::error::SupervisorError;
use crate::unit::{Unit, UnitId};

/// Executable plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

/// Splits a startup command on whitespace. No quoting rules apply.
pub(crate) fn parse_command_line(unit: UnitId, line: &str) -> Result<CommandLine, SupervisorError> {
    let mut parts = line.split_whitespace().map(str::to_owned);
    let program = parts.next().ok_or(SupervisorError::InvalidCommand { unit })?;
    Ok(CommandLine {
        program,
        args: parts.collect(),
    })
}

/// A freshly created process with all three pipes taken.
pub(crate) struct Launched {
    pub child: Child,
    pub pid: Option<u32>,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Creates the unit's process in its working directory with piped standard streams.
///
/// - empty command line → `InvalidCommand`
/// - OS refuses to spawn (missing binary, bad directory, pipe creation) → `LaunchFailed`
/// - a pipe missing after spawn → `StreamSetupFailed`; the child is killed
pub(crate) fn launch(unit: &dyn Unit) -> Result<Launched, SupervisorError> {
    let id = unit.id();
    let cmd = parse_command_line(id, &unit.command_line())?;

    let mut child = Command::new(&cmd.program)
        .args(&cmd.args)
        .current_dir(unit.working_dir())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| SupervisorError::LaunchFailed {
            unit: id,
            program: cmd.program.clone(),
            source,
        })?;

    let pid = child.id();
    match (child.stdin.take(), child.stdout.take(), child.stderr.take()) {
        (Some(stdin), Some(stdout), Some(stderr)) => Ok(Launched {
            child,
            pid,
            stdin,
            stdout,
            stderr,
        }),
        (stdin, stdout, _) => {
            let stream = if stdin.is_none() {
                "stdin"
            } else if stdout.is_none() {
                "stdout"
            } else {
                "stderr"
            };
            // Dropped children are reaped by the runtime.
            if let Err(err) = child.start_kill() {
                warn!(unit = %id, pid = ?pid, error = %err, "failed to kill half-launched process");
            }
            Err(SupervisorError::StreamSetupFailed { unit: id, stream })
        }
    }
}
