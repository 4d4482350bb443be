// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! OS process queries used by the lifecycle manager.

use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// How often [`ProcessRegistry::wait`] re-checks liveness.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Finds, probes and signals processes.
pub trait ProcessRegistry {
    /// PIDs whose command line carries `tag`, excluding the current process.
    fn list_by_tag(&self, tag: &str) -> Vec<u32>;

    /// Asks a process to exit; `force` kills it outright.
    ///
    /// Returns whether the request was delivered.
    fn terminate(&self, pid: u32, force: bool) -> bool;

    fn is_alive(&self, pid: u32) -> bool;

    /// Waits for a process to exit. Returns `true` if it did.
    fn wait(&self, pid: u32, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.is_alive(pid) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(WAIT_POLL_INTERVAL);
        }
    }
}

/// Returns true if `cmdline` runs the command described by `tag`.
///
/// A tag is `<program> <args...>`. The program matches on its file name
/// (with or without `.exe`, optionally quoted) so absolute paths in the
/// process table still match; the arguments must follow it verbatim and end
/// at a token boundary.
pub fn matches_tag(cmdline: &str, tag: &str) -> bool {
    let Some((program, args)) = tag.split_once(' ') else {
        return false;
    };

    let mut search_from = 0;
    while let Some(offset) = cmdline[search_from..].find(args) {
        let start = search_from + offset;
        let end = start + args.len();
        search_from = start + args.chars().next().map_or(1, char::len_utf8);

        let at_boundary = cmdline[end..]
            .chars()
            .next()
            .map_or(true, |c| c.is_whitespace() || c == '"');
        if !at_boundary {
            continue;
        }

        let before = cmdline[..start].trim_end();
        if before.len() == cmdline[..start].len() {
            // No separator between program and arguments.
            continue;
        }
        let last = before
            .rsplit(|c: char| c.is_whitespace() || c == '/' || c == '\\')
            .next()
            .unwrap_or("")
            .trim_matches('"');
        let name = last.strip_suffix(".exe").unwrap_or(last);
        if name == program {
            return true;
        }
    }
    false
}

/// Parses `<pid> <command line>` rows, skipping the current process.
pub(crate) fn parse_process_table(table: &str, tag: &str) -> Vec<u32> {
    let own = std::process::id();
    table
        .lines()
        .filter_map(|line| {
            let (pid, args) = line.trim().split_once(char::is_whitespace)?;
            let pid = pid.parse::<u32>().ok()?;
            (pid != own && matches_tag(args.trim(), tag)).then_some(pid)
        })
        .collect()
}

/// The real process table of this machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRegistry;

#[cfg(unix)]
impl ProcessRegistry for SystemRegistry {
    fn list_by_tag(&self, tag: &str) -> Vec<u32> {
        let output = match Command::new("ps")
            .args(["-eo", "pid=,args="])
            .stdin(Stdio::null())
            .output()
        {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                tracing::debug!("ps exited with {}", output.status);
                return Vec::new();
            }
            Err(e) => {
                tracing::debug!("cannot run ps: {}", e);
                return Vec::new();
            }
        };
        parse_process_table(&String::from_utf8_lossy(&output.stdout), tag)
    }

    fn terminate(&self, pid: u32, force: bool) -> bool {
        use nix::sys::signal::{kill, Signal};

        let Some(pid) = nix_pid(pid) else {
            return false;
        };
        let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
        match kill(pid, signal) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("cannot send {} to {}: {}", signal, pid, e);
                false
            }
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        let Some(nix_pid) = nix_pid(pid) else {
            return false;
        };
        nix::sys::signal::kill(nix_pid, None).is_ok() && !is_defunct(pid)
    }
}

/// Converts to a nix PID, refusing 0 and values that would address a group.
#[cfg(unix)]
fn nix_pid(pid: u32) -> Option<nix::unistd::Pid> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Some(nix::unistd::Pid::from_raw(raw)),
        _ => None,
    }
}

/// Exited but unreaped processes still answer `kill(pid, 0)`.
#[cfg(target_os = "linux")]
fn is_defunct(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{}/stat", pid))
        .ok()
        .and_then(|stat| {
            let (_, rest) = stat.rsplit_once(')')?;
            rest.trim_start().chars().next()
        })
        .is_some_and(|state| state == 'Z')
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_defunct(_pid: u32) -> bool {
    false
}

#[cfg(windows)]
impl ProcessRegistry for SystemRegistry {
    fn list_by_tag(&self, tag: &str) -> Vec<u32> {
        let program = tag.split(' ').next().unwrap_or(tag);
        let query = format!(
            "Get-CimInstance Win32_Process -Filter \"Name='{}.exe'\" | \
             ForEach-Object {{ \"$($_.ProcessId) $($_.CommandLine)\" }}",
            program
        );
        let output = match Command::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command", &query])
            .stdin(Stdio::null())
            .output()
        {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                tracing::debug!("process query exited with {}", output.status);
                return Vec::new();
            }
            Err(e) => {
                tracing::debug!("cannot run powershell: {}", e);
                return Vec::new();
            }
        };
        parse_process_table(&String::from_utf8_lossy(&output.stdout), tag)
    }

    fn terminate(&self, pid: u32, force: bool) -> bool {
        let pid = pid.to_string();
        let mut args = vec!["/PID", pid.as_str()];
        if force {
            args.push("/F");
        }
        Command::new("taskkill")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn is_alive(&self, pid: u32) -> bool {
        let filter = format!("PID eq {}", pid);
        Command::new("tasklist")
            .args(["/FI", &filter, "/NH", "/FO", "CSV"])
            .stdin(Stdio::null())
            .output()
            .map(|o| {
                String::from_utf8_lossy(&o.stdout).contains(&format!("\"{}\"", pid))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
