// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciles the issue store with its git-tracked JSONL snapshot.
//!
//! One pass exports every issue, then commits, pulls and pushes. Each step
//! runs even if an earlier one failed; the outcome of each is reported in
//! [`SyncStats`] rather than aborting the pass.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use trk_core::{jsonl, DaemonConfig, IssueRecord};
use trk_ipc::SyncStats;

use crate::error::Result;

/// Push failures that only mean there is nowhere to push to.
const NO_UPSTREAM_MARKERS: [&str; 2] = ["no upstream branch", "no configured push destination"];

/// Export line reused while the issue is unchanged.
struct CachedLine {
    record: IssueRecord,
    line: String,
}

/// Export + git driver for one workspace.
pub struct SyncEngine {
    workspace: PathBuf,
    export_path: PathBuf,
    git_integration: bool,
    cache: HashMap<String, CachedLine>,
}

impl SyncEngine {
    pub fn new(config: &DaemonConfig) -> Self {
        SyncEngine {
            workspace: config.workspace_path.clone(),
            export_path: config.get_export_path(),
            git_integration: config.git_integration,
            cache: HashMap::new(),
        }
    }

    pub fn export_path(&self) -> &Path {
        &self.export_path
    }

    /// Rewrites the export file from `issues`.
    ///
    /// Returns `(exported, skipped)`: issues re-encoded versus issues whose
    /// line from the previous export was reused verbatim.
    pub fn export_to_jsonl(&mut self, issues: &[IssueRecord]) -> Result<(usize, usize)> {
        let mut exported = 0;
        let mut skipped = 0;
        let mut lines = Vec::with_capacity(issues.len());
        let mut next = HashMap::with_capacity(issues.len());

        let mut ordered: Vec<&IssueRecord> = issues.iter().collect();
        ordered.sort_by(|a, b| a.id.cmp(&b.id));

        for issue in ordered {
            let line = match self.cache.remove(&issue.id) {
                Some(cached) if cached.record == *issue => {
                    skipped += 1;
                    cached.line
                }
                _ => {
                    exported += 1;
                    serde_json::to_string(issue).map_err(trk_core::Error::from)?
                }
            };
            lines.push(line.clone());
            next.insert(
                issue.id.clone(),
                CachedLine {
                    record: issue.clone(),
                    line,
                },
            );
        }

        jsonl::write_lines(&self.export_path, &lines)?;
        self.cache = next;

        tracing::debug!(
            "exported {} issues to {} ({} unchanged)",
            exported,
            self.export_path.display(),
            skipped
        );
        Ok((exported, skipped))
    }

    /// Reads records back from the export file, skipping malformed lines.
    pub fn import_from_jsonl(&self) -> Result<Vec<IssueRecord>> {
        Ok(jsonl::read_lenient(&self.export_path)?)
    }

    fn git(&self, args: &[&str]) -> std::io::Result<Output> {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.workspace)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null());
        setup_git_env(&mut cmd);
        cmd.output()
    }

    /// Runs a git command, reporting whether it exited successfully.
    fn git_ok(&self, args: &[&str]) -> bool {
        match self.git(args) {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                tracing::debug!(
                    "git {} failed: {}",
                    args.join(" "),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            Err(e) => {
                tracing::warn!("failed to run git {}: {}", args.join(" "), e);
                false
            }
        }
    }

    fn is_git_repo(&self) -> bool {
        self.git_ok(&["rev-parse", "--is-inside-work-tree"])
    }

    /// Stages everything and commits if anything is staged.
    ///
    /// `git add -A` covers the whole enclosing repository, so a workspace
    /// nested inside a larger repo commits that repo's pending changes too.
    ///
    /// Returns `true` when a commit was made or there was nothing to commit.
    pub fn git_commit(&self, message: &str) -> bool {
        if !self.git_integration {
            return false;
        }
        if !self.is_git_repo() {
            tracing::debug!("{} is not a git repository", self.workspace.display());
            return false;
        }
        if !self.git_ok(&["add", "-A"]) {
            return false;
        }

        match self.git(&["diff", "--cached", "--quiet"]) {
            Ok(output) if output.status.success() => return true,
            Ok(output) if output.status.code() == Some(1) => {}
            Ok(output) => {
                tracing::warn!(
                    "git diff --cached failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                return false;
            }
            Err(e) => {
                tracing::warn!("failed to run git diff: {}", e);
                return false;
            }
        }

        let committed = self.git_ok(&["commit", "--no-verify", "-m", message]);
        if committed {
            tracing::info!("committed issue snapshot");
        }
        committed
    }

    /// Pulls with rebase, backing out of a conflicted rebase.
    pub fn git_pull(&self) -> bool {
        if !self.git_integration {
            return false;
        }
        if self.git_ok(&["pull", "--rebase", "--autostash"]) {
            return true;
        }
        if self.workspace_git_dir_has("rebase-merge") || self.workspace_git_dir_has("rebase-apply")
        {
            tracing::warn!("git pull left a rebase in progress; aborting it");
            let _ = self.git_ok(&["rebase", "--abort"]);
        }
        false
    }

    fn workspace_git_dir_has(&self, name: &str) -> bool {
        match self.git(&["rev-parse", "--git-path", name]) {
            Ok(output) if output.status.success() => {
                let rel = String::from_utf8_lossy(&output.stdout).trim().to_string();
                self.workspace.join(rel).exists()
            }
            _ => false,
        }
    }

    /// Pushes; having no upstream to push to counts as success.
    pub fn git_push(&self) -> bool {
        if !self.git_integration {
            return false;
        }
        match self.git(&["push"]) {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
                if NO_UPSTREAM_MARKERS.iter().any(|m| stderr.contains(m)) {
                    tracing::debug!("no upstream configured; nothing to push");
                    true
                } else {
                    tracing::warn!("git push failed: {}", stderr.trim());
                    false
                }
            }
            Err(e) => {
                tracing::warn!("failed to run git push: {}", e);
                false
            }
        }
    }

    /// One best-effort pass: export, commit, pull, push.
    pub fn sync(&mut self, issues: &[IssueRecord]) -> SyncStats {
        let mut stats = SyncStats::default();

        match self.export_to_jsonl(issues) {
            Ok((exported, skipped)) => {
                stats.exported = exported;
                stats.skipped = skipped;
            }
            Err(e) => tracing::warn!("export to {} failed: {}", self.export_path.display(), e),
        }

        stats.committed = self.git_commit(&format!("trkd: sync {} issue(s)", issues.len()));
        stats.pulled = self.git_pull();
        stats.pushed = self.git_push();
        stats
    }
}

/// Fills in a commit identity when the environment has none, so commits
/// succeed on machines without a configured git user.
fn setup_git_env(cmd: &mut Command) {
    for (var, value) in [
        ("GIT_AUTHOR_NAME", "trkd"),
        ("GIT_AUTHOR_EMAIL", "trkd@localhost"),
        ("GIT_COMMITTER_NAME", "trkd"),
        ("GIT_COMMITTER_EMAIL", "trkd@localhost"),
    ] {
        if std::env::var(var).map(|v| v.is_empty()).unwrap_or(true) {
            cmd.env(var, value);
        }
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
