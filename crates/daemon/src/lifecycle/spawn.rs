// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Launching daemon processes, attached or detached from the caller.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use crate::env;
use crate::error::{Error, Result};

/// File name of the daemon binary.
pub const DAEMON_BINARY_NAME: &str = "trkd";

/// Subcommand that runs the daemon in the foreground.
pub const RUN_SUBCOMMAND: &str = "run";
/// Internal subcommand that detaches and launches the daemon (Unix).
pub const DETACH_SUBCOMMAND: &str = "detach";

/// A freshly launched daemon.
pub(crate) struct Spawned {
    pub pid: u32,
    /// Present when the daemon is our direct child.
    pub child: Option<Child>,
}

/// Locates the daemon binary: `TRK_DAEMON_BINARY`, then next to the current
/// executable, then `PATH`.
pub fn find_daemon_binary() -> PathBuf {
    if let Some(path) = env::daemon_binary() {
        return path;
    }

    let file_name = format!("{}{}", DAEMON_BINARY_NAME, std::env::consts::EXE_SUFFIX);
    if let Ok(exe) = std::env::current_exe() {
        let sibling = exe.with_file_name(&file_name);
        if sibling.exists() {
            return sibling;
        }
    }

    PathBuf::from(file_name)
}

/// Command line that runs the daemon for `workspace`.
fn run_command(binary: &Path, workspace: &Path) -> Command {
    let mut cmd = Command::new(binary);
    cmd.arg(RUN_SUBCOMMAND)
        .arg("--workspace")
        .arg(workspace)
        .current_dir(workspace)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    cmd
}

fn spawn_error(binary: &Path, e: std::io::Error) -> Error {
    Error::Process(format!(
        "failed to start {} ({}): {}",
        DAEMON_BINARY_NAME,
        binary.display(),
        e
    ))
}

pub(crate) fn spawn_daemon(binary: &Path, workspace: &Path, detach: bool) -> Result<Spawned> {
    if detach {
        let pid = spawn_detached(binary, workspace)?;
        return Ok(Spawned { pid, child: None });
    }

    let child = run_command(binary, workspace)
        .spawn()
        .map_err(|e| spawn_error(binary, e))?;
    Ok(Spawned {
        pid: child.id(),
        child: Some(child),
    })
}

/// Runs the detach helper and returns the PID it reports.
///
/// The helper is waited for here, so it never lingers as a zombie.
#[cfg(unix)]
fn spawn_detached(binary: &Path, workspace: &Path) -> Result<u32> {
    let output = Command::new(binary)
        .arg(DETACH_SUBCOMMAND)
        .arg("--workspace")
        .arg(workspace)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| spawn_error(binary, e))?;

    if !output.status.success() {
        return Err(Error::Process(format!(
            "detach helper exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout.trim().parse::<u32>().map_err(|_| {
        Error::Process(format!(
            "detach helper printed no PID: {:?}",
            stdout.trim()
        ))
    })
}

/// Body of the detach helper: leave the caller's session, launch the daemon
/// and return its PID. The helper exits right after, orphaning the daemon.
#[cfg(unix)]
pub fn detach_and_spawn(binary: &Path, workspace: &Path) -> Result<u32> {
    nix::unistd::setsid().map_err(|e| Error::Process(format!("setsid failed: {}", e)))?;
    let child = run_command(binary, workspace)
        .spawn()
        .map_err(|e| spawn_error(binary, e))?;
    Ok(child.id())
}

#[cfg(windows)]
fn spawn_detached(binary: &Path, workspace: &Path) -> Result<u32> {
    use std::os::windows::process::CommandExt;

    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;

    let child = run_command(binary, workspace)
        .creation_flags(DETACHED_PROCESS | CREATE_NO_WINDOW | CREATE_NEW_PROCESS_GROUP)
        .spawn()
        .map_err(|e| spawn_error(binary, e))?;
    Ok(child.id())
}

#[cfg(not(any(unix, windows)))]
fn spawn_detached(binary: &Path, workspace: &Path) -> Result<u32> {
    let child = run_command(binary, workspace)
        .spawn()
        .map_err(|e| spawn_error(binary, e))?;
    Ok(child.id())
}
