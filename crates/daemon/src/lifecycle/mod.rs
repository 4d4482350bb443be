// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: spawn, detect, stop.
//!
//! At most one daemon runs per workspace. Starting one first stops the
//! daemon recorded in the PID file and any stray daemon still running for
//! the same workspace, then spawns a fresh process.

mod registry;
mod spawn;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use trk_core::DaemonConfig;
use trk_ipc::IpcClient;

use crate::env;
use crate::error::{Error, Result};

pub use registry::{matches_tag, ProcessRegistry, SystemRegistry};
#[cfg(unix)]
pub use spawn::detach_and_spawn;
pub use spawn::{find_daemon_binary, DAEMON_BINARY_NAME, DETACH_SUBCOMMAND, RUN_SUBCOMMAND};

/// Grace period between a polite stop and a forced kill.
const STOP_TIMEOUT: Duration = Duration::from_secs(3);
/// Time allowed for a killed process to disappear.
const KILL_TIMEOUT: Duration = Duration::from_secs(1);
/// How long a fresh daemon gets to answer `health`.
const READY_TIMEOUT: Duration = Duration::from_secs(5);
const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Per-probe IPC timeout while waiting for readiness or stopping.
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Command-line signature identifying the daemon for `workspace`.
pub fn daemon_signature(workspace: &Path) -> String {
    format!(
        "{} {} --workspace {}",
        DAEMON_BINARY_NAME,
        RUN_SUBCOMMAND,
        workspace.display()
    )
}

/// Resolves a workspace to the absolute form daemons are started with.
pub fn canonical_workspace(workspace: &Path) -> PathBuf {
    fs::canonicalize(workspace).unwrap_or_else(|_| workspace.to_path_buf())
}

/// Reads the PID file; missing, empty or garbled files yield `None`.
pub fn read_pid_file(pid_path: &Path) -> Option<u32> {
    fs::read_to_string(pid_path)
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|&pid| pid > 0)
}

/// Starts, stops and probes daemons through a [`ProcessRegistry`].
pub struct Lifecycle<R: ProcessRegistry = SystemRegistry> {
    registry: R,
    binary: PathBuf,
    stop_timeout: Duration,
    ready_timeout: Duration,
    auto_start: Option<bool>,
}

impl Lifecycle<SystemRegistry> {
    pub fn new() -> Self {
        Self::with_registry(SystemRegistry)
    }
}

impl Default for Lifecycle<SystemRegistry> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ProcessRegistry> Lifecycle<R> {
    pub fn with_registry(registry: R) -> Self {
        Lifecycle {
            registry,
            binary: find_daemon_binary(),
            stop_timeout: STOP_TIMEOUT,
            ready_timeout: READY_TIMEOUT,
            auto_start: None,
        }
    }

    /// Overrides the daemon binary.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Overrides the `TRK_AUTO_START_DAEMON` kill switch.
    pub fn with_auto_start(mut self, allowed: bool) -> Self {
        self.auto_start = Some(allowed);
        self
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Replaces any daemon for `workspace` with a freshly spawned one.
    ///
    /// Returns the new daemon's PID.
    pub fn start(&self, workspace: &Path, detach: bool) -> Result<u32> {
        if !self.auto_start.unwrap_or_else(env::auto_start_daemon) {
            return Err(Error::AutoStartDisabled);
        }

        let workspace = canonical_workspace(workspace);
        let config = DaemonConfig::load(&workspace);
        fs::create_dir_all(config.issues_dir())?;

        self.stop_recorded(&config);
        let swept = self.sweep_zombies(&workspace);
        if swept > 0 {
            tracing::info!("stopped {} stray daemon(s) for {}", swept, workspace.display());
        }

        let mut spawned = spawn::spawn_daemon(&self.binary, &workspace, detach)?;
        let pid = spawned.pid;
        fs::write(config.get_pid_path(), pid.to_string())?;
        tracing::info!("spawned daemon {} for {}", pid, workspace.display());

        let client = IpcClient::for_config(&config).with_timeout(PROBE_TIMEOUT);
        let deadline = Instant::now() + self.ready_timeout;
        loop {
            if client.health().is_ok() {
                tracing::debug!("daemon {} is ready", pid);
                return Ok(pid);
            }

            let exited = match spawned.child.as_mut() {
                Some(child) => matches!(child.try_wait(), Ok(Some(_))),
                None => !self.registry.is_alive(pid),
            };
            if exited {
                let _ = fs::remove_file(config.get_pid_path());
                return Err(Error::Process(format!(
                    "daemon exited during startup; see {}",
                    config.get_log_path().display()
                )));
            }

            if Instant::now() >= deadline {
                tracing::warn!(
                    "daemon {} did not answer within {}s; continuing",
                    pid,
                    self.ready_timeout.as_secs()
                );
                return Ok(pid);
            }
            std::thread::sleep(READY_POLL_INTERVAL);
        }
    }

    /// Stops the workspace's recorded daemon. Returns whether one was running.
    pub fn stop(&self, workspace: &Path) -> Result<bool> {
        let workspace = canonical_workspace(workspace);
        let config = DaemonConfig::load(&workspace);
        Ok(self.stop_recorded(&config))
    }

    pub fn is_running(&self, workspace: &Path) -> bool {
        self.daemon_pid(workspace).is_some()
    }

    /// PID of the workspace's daemon if the recorded process is alive.
    pub fn daemon_pid(&self, workspace: &Path) -> Option<u32> {
        let config = DaemonConfig::load(&canonical_workspace(workspace));
        read_pid_file(&config.get_pid_path()).filter(|&pid| self.registry.is_alive(pid))
    }

    /// Returns the running daemon's PID, starting one if the workspace allows it.
    ///
    /// `Ok(None)` means the workspace config turned auto-start off.
    pub fn ensure(&self, workspace: &Path) -> Result<Option<u32>> {
        if let Some(pid) = self.daemon_pid(workspace) {
            return Ok(Some(pid));
        }
        let config = DaemonConfig::load(&canonical_workspace(workspace));
        if !config.auto_start_daemon {
            tracing::debug!("auto-start disabled in {}", config.issues_dir().display());
            return Ok(None);
        }
        self.start(workspace, true).map(Some)
    }

    /// Stops the daemon named in the PID file and removes the file.
    fn stop_recorded(&self, config: &DaemonConfig) -> bool {
        let pid_path = config.get_pid_path();
        let Some(pid) = read_pid_file(&pid_path) else {
            let _ = fs::remove_file(&pid_path);
            return false;
        };

        let stopped = if !self.registry.is_alive(pid) {
            tracing::debug!("removing stale PID file for {}", pid);
            false
        } else {
            let asked = IpcClient::for_config(config)
                .with_timeout(PROBE_TIMEOUT)
                .stop()
                .is_ok();
            if asked && self.registry.wait(pid, self.stop_timeout) {
                tracing::info!("daemon {} stopped", pid);
            } else {
                self.terminate(pid);
            }
            true
        };

        let _ = fs::remove_file(&pid_path);
        stopped
    }

    /// Terminates every other daemon carrying this workspace's signature.
    pub fn sweep_zombies(&self, workspace: &Path) -> usize {
        let own = std::process::id();
        self.registry
            .list_by_tag(&daemon_signature(workspace))
            .into_iter()
            .filter(|&pid| pid != own)
            .filter(|&pid| self.terminate(pid))
            .count()
    }

    /// SIGTERM, bounded wait, then SIGKILL. Returns whether the process is gone.
    fn terminate(&self, pid: u32) -> bool {
        if self.registry.terminate(pid, false) && self.registry.wait(pid, self.stop_timeout) {
            tracing::info!("process {} terminated", pid);
            return true;
        }

        tracing::warn!(
            "process {} still running after {}s; killing",
            pid,
            self.stop_timeout.as_secs()
        );
        self.registry.terminate(pid, true);
        let gone = self.registry.wait(pid, KILL_TIMEOUT);
        if !gone {
            tracing::warn!("process {} survived a forced kill", pid);
        }
        gone
    }
}

/// Replaces any daemon for `workspace` with a new one. See [`Lifecycle::start`].
pub fn start_daemon(workspace: &Path, detach: bool) -> Result<u32> {
    Lifecycle::new().start(workspace, detach)
}

/// Stops the workspace's daemon. Returns whether one was running.
pub fn stop_daemon(workspace: &Path) -> Result<bool> {
    Lifecycle::new().stop(workspace)
}

pub fn is_daemon_running(workspace: &Path) -> bool {
    Lifecycle::new().is_running(workspace)
}

pub fn daemon_pid(workspace: &Path) -> Option<u32> {
    Lifecycle::new().daemon_pid(workspace)
}

/// Returns the running daemon's PID, starting one if allowed.
pub fn ensure_daemon(workspace: &Path) -> Result<Option<u32>> {
    Lifecycle::new().ensure(workspace)
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
