//! Launcher subprocess execution
//!
//! Spawns the launcher once, waits at most `timeout`, and kills it if the
//! wait expires.
//!
//! The launcher leads its own process group, so a timeout kills the
//! sandboxed probe along with it. A child that moves to another group, or
//! one running as root under an elevation wrapper, is out of reach of the
//! group kill; only the direct child is then guaranteed to die.

use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{CommandSpec, LaunchOutcome, RunStatus};
use crate::core::{HarnessError, Result};

/// Run the launcher command and collect its status and output
pub async fn run_launcher(cmd: &CommandSpec, timeout: Duration) -> Result<LaunchOutcome> {
    debug!("Running launcher: {:?}", cmd.to_vec());

    let mut command = Command::new(&cmd.program);
    command
        .args(&cmd.args)
        .envs(cmd.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);

    let child = command.spawn().map_err(|source| HarnessError::Spawn {
        program: cmd.program.clone(),
        source,
    })?;
    let pid = child.id();

    // Dropping the pending wait drops the child, which kills it
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(waited) => waited.map_err(|source| HarnessError::Spawn {
            program: cmd.program.clone(),
            source,
        })?,
        Err(_) => {
            warn!(
                "Launcher {} (pid {:?}) still running after {}s, killing it",
                cmd.program,
                pid,
                timeout.as_secs()
            );
            if let Some(pid) = pid {
                kill_group(pid);
            }
            return Err(HarnessError::Timeout {
                secs: timeout.as_secs(),
            });
        }
    };

    let status = match (output.status.code(), output.status.signal()) {
        (Some(code), _) => RunStatus::Exited(code),
        (None, Some(sig)) => RunStatus::Signaled(sig),
        (None, None) => RunStatus::Exited(-1),
    };

    Ok(LaunchOutcome {
        pid,
        status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// SIGKILL the process group led by `pid`
fn kill_group(pid: u32) {
    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        warn!("Could not kill process group {}: {}", raw, e);
    }
}
