// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use chrono::Utc;
use trk_core::{DaemonConfig, Database, IssueRecord};
use trkd::Lifecycle;

pub use predicates::prelude::*;
pub use serde_json::{json, Value};
pub use tempfile::TempDir;

pub fn trkd() -> Command {
    let mut cmd = cargo_bin_cmd!("trkd");
    cmd.env_remove("TRK_AUTO_START_DAEMON");
    cmd.env_remove("TRK_DAEMON_BINARY");
    cmd
}

/// Lifecycle manager that spawns the freshly built binary.
pub fn lifecycle() -> Lifecycle {
    Lifecycle::new()
        .with_binary(env!("CARGO_BIN_EXE_trkd"))
        .with_auto_start(true)
}

/// A scratch workspace that stops its daemon when dropped.
pub struct Workspace {
    dir: TempDir,
    path: PathBuf,
}

impl Workspace {
    /// Workspace with git integration off and the given sync cadence.
    pub fn new(sync_interval_seconds: u64) -> Self {
        let dir = TempDir::new().unwrap();
        let path = std::fs::canonicalize(dir.path()).unwrap();
        let mut config = DaemonConfig::default_for(&path);
        config.git_integration = false;
        config.sync_interval_seconds = NonZeroU64::new(sync_interval_seconds).unwrap();
        config.save().unwrap();
        Workspace { dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> DaemonConfig {
        DaemonConfig::load(&self.path)
    }

    /// `trkd <args>` run against this workspace.
    pub fn trkd(&self) -> Command {
        let mut cmd = trkd();
        cmd.arg("--workspace").arg(&self.path);
        cmd
    }

    /// Runs `trkd <args>` and parses its JSON output.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self.trkd().args(args).output().unwrap();
        serde_json::from_slice(&output.stdout).unwrap()
    }

    pub fn seed(&self, ids: &[&str]) {
        let mut db = Database::open(&self.config().get_database_path()).unwrap();
        for id in ids {
            db.upsert_issue(&IssueRecord::new(*id, format!("title {id}"), Utc::now()))
                .unwrap();
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = lifecycle().stop(&self.path);
    }
}

/// Polls `check` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}
