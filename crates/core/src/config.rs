// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workspace daemon configuration.
//!
//! Configuration is stored in `<workspace>/.issues/config.json`. Every daemon
//! file (PID, socket, log, store, export) is derived from it. A missing or
//! unreadable file is never an error: callers get defaults.

use std::fmt;
use std::fs;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Directory holding all tracker state within a workspace.
pub const ISSUES_DIR_NAME: &str = ".issues";
const CONFIG_FILE_NAME: &str = "config.json";
const PID_FILE_NAME: &str = "daemon.pid";
const SOCKET_FILE_NAME: &str = "daemon.sock";
const LOG_FILE_NAME: &str = "daemon.log";
const LOCK_FILE_NAME: &str = "daemon.lock";
const DB_FILE_NAME: &str = "issues.db";
const EXPORT_FILE_NAME: &str = "issues.jsonl";
const GITIGNORE_FILE_NAME: &str = ".gitignore";

/// Runtime files that must never be committed alongside the export.
const GITIGNORE_CONTENT: &str = "# Local store (synced via issues.jsonl)\nissues.db\nissues.db-*\n\n# Daemon runtime state\ndaemon.log\ndaemon.pid\ndaemon.sock\ndaemon.lock\n";

/// Default seconds between periodic sync passes.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 5;
const DEFAULT_ISSUE_PREFIX: &str = "issue";

/// Longest socket path we bind directly; `sun_path` is 104 bytes on macOS.
const MAX_SOCKET_PATH_LEN: usize = 100;

/// How the daemon decides when to sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonMode {
    /// Sync on a fixed interval.
    #[default]
    Poll,
    /// Sync on the interval and whenever the store file changes.
    Events,
}

impl DaemonMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DaemonMode::Poll => "poll",
            DaemonMode::Events => "events",
        }
    }
}

impl fmt::Display for DaemonMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Daemon configuration for one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Workspace root (the directory containing `.issues/`). Never stored.
    #[serde(skip)]
    pub workspace_path: PathBuf,
    /// SQLite store; relative paths resolve against the workspace.
    pub database_path: PathBuf,
    /// JSONL snapshot; relative paths resolve against the workspace.
    pub export_path: PathBuf,
    pub sync_enabled: bool,
    pub sync_interval_seconds: NonZeroU64,
    pub git_integration: bool,
    pub daemon_mode: DaemonMode,
    pub issue_prefix: String,
    pub auto_start_daemon: bool,
}

/// On-disk shape: every field optional so partial files fill from defaults.
///
/// A stored `workspace_path` is ignored; the directory the file was loaded
/// from wins, so a config committed in one clone stays valid in another.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    export_path: Option<PathBuf>,
    sync_enabled: Option<bool>,
    sync_interval_seconds: Option<NonZeroU64>,
    git_integration: Option<bool>,
    daemon_mode: Option<DaemonMode>,
    issue_prefix: Option<String>,
    auto_start_daemon: Option<bool>,
}

impl DaemonConfig {
    /// Creates the default configuration for a workspace.
    pub fn default_for(workspace: &Path) -> Self {
        let issues_dir = Path::new(ISSUES_DIR_NAME);
        DaemonConfig {
            workspace_path: workspace.to_path_buf(),
            database_path: issues_dir.join(DB_FILE_NAME),
            export_path: issues_dir.join(EXPORT_FILE_NAME),
            sync_enabled: true,
            sync_interval_seconds: NonZeroU64::new(DEFAULT_SYNC_INTERVAL_SECS)
                .unwrap_or(NonZeroU64::MIN),
            git_integration: true,
            daemon_mode: DaemonMode::Poll,
            issue_prefix: DEFAULT_ISSUE_PREFIX.to_string(),
            auto_start_daemon: true,
        }
    }

    /// Path of the config file for a workspace.
    pub fn config_path(workspace: &Path) -> PathBuf {
        workspace.join(ISSUES_DIR_NAME).join(CONFIG_FILE_NAME)
    }

    /// Loads the workspace config, falling back to defaults on any failure.
    pub fn load(workspace: &Path) -> Self {
        let path = Self::config_path(workspace);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("cannot read {}: {}; using defaults", path.display(), e);
                }
                return Self::default_for(workspace);
            }
        };

        match serde_json::from_str::<ConfigFile>(&content) {
            Ok(file) => Self::default_for(workspace).merged(file),
            Err(e) => {
                tracing::warn!("invalid config {}: {}; using defaults", path.display(), e);
                Self::default_for(workspace)
            }
        }
    }

    fn merged(self, file: ConfigFile) -> Self {
        DaemonConfig {
            workspace_path: self.workspace_path,
            database_path: file.database_path.unwrap_or(self.database_path),
            export_path: file.export_path.unwrap_or(self.export_path),
            sync_enabled: file.sync_enabled.unwrap_or(self.sync_enabled),
            sync_interval_seconds: file
                .sync_interval_seconds
                .unwrap_or(self.sync_interval_seconds),
            git_integration: file.git_integration.unwrap_or(self.git_integration),
            daemon_mode: file.daemon_mode.unwrap_or(self.daemon_mode),
            issue_prefix: file.issue_prefix.unwrap_or(self.issue_prefix),
            auto_start_daemon: file.auto_start_daemon.unwrap_or(self.auto_start_daemon),
        }
    }

    /// Writes the config as JSON, creating `.issues/` if needed.
    ///
    /// Paths inside the workspace are stored relative to it, since the file
    /// is committed and shared between clones.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path(&self.workspace_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let stored = DaemonConfig {
            database_path: self.relativize(&self.database_path),
            export_path: self.relativize(&self.export_path),
            ..self.clone()
        };
        let json = serde_json::to_string_pretty(&stored)?;
        fs::write(&path, format!("{json}\n"))?;
        Ok(())
    }

    /// Writes a default config unless one already exists.
    ///
    /// With `force`, any existing config is replaced by defaults.
    pub fn init(workspace: &Path, force: bool) -> Result<Self> {
        if !force && Self::config_path(workspace).exists() {
            return Ok(Self::load(workspace));
        }
        let config = Self::default_for(workspace);
        config.save()?;
        config.ensure_gitignore()?;
        Ok(config)
    }

    /// Writes `.issues/.gitignore` for runtime files if it is missing.
    pub fn ensure_gitignore(&self) -> Result<()> {
        let path = self.issues_dir().join(GITIGNORE_FILE_NAME);
        if path.exists() {
            return Ok(());
        }
        fs::create_dir_all(self.issues_dir())?;
        fs::write(&path, GITIGNORE_CONTENT)?;
        Ok(())
    }

    /// Directory holding all tracker state for this workspace.
    pub fn issues_dir(&self) -> PathBuf {
        self.workspace_path.join(ISSUES_DIR_NAME)
    }

    pub fn get_pid_path(&self) -> PathBuf {
        self.issues_dir().join(PID_FILE_NAME)
    }

    pub fn get_lock_path(&self) -> PathBuf {
        self.issues_dir().join(LOCK_FILE_NAME)
    }

    pub fn get_log_path(&self) -> PathBuf {
        self.issues_dir().join(LOG_FILE_NAME)
    }

    /// Socket path for the daemon's IPC endpoint.
    ///
    /// Workspaces nested too deeply for `sun_path` get a hashed path in the
    /// runtime directory instead.
    pub fn get_socket_path(&self) -> PathBuf {
        let direct = self.issues_dir().join(SOCKET_FILE_NAME);
        if direct.as_os_str().len() <= MAX_SOCKET_PATH_LEN {
            return direct;
        }
        let base = dirs::runtime_dir().unwrap_or_else(std::env::temp_dir);
        base.join(format!("trkd-{}.sock", self.workspace_hash()))
    }

    pub fn get_database_path(&self) -> PathBuf {
        self.resolve(&self.database_path)
    }

    pub fn get_export_path(&self) -> PathBuf {
        self.resolve(&self.export_path)
    }

    /// Stable short hash of the workspace path (16 hex chars).
    pub fn workspace_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.workspace_path.to_string_lossy().as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..8])
    }

    fn relativize(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.workspace_path) {
            Ok(relative) if path.is_absolute() => relative.to_path_buf(),
            _ => path.to_path_buf(),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_path.join(path)
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
