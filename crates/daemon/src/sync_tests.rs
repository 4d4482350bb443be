// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use std::fs;
use std::process::Command;

use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;
use trk_core::{DaemonConfig, IssueRecord};

use super::*;

fn issue(id: &str, title: &str) -> IssueRecord {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    IssueRecord::new(id, title, now)
}

fn engine(dir: &TempDir, git: bool) -> SyncEngine {
    let mut config = DaemonConfig::default_for(dir.path());
    config.git_integration = git;
    SyncEngine::new(&config)
}

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git_init(dir: &TempDir) {
    let status = Command::new("git")
        .current_dir(dir.path())
        .args(["init", "--quiet"])
        .status()
        .unwrap();
    assert!(status.success());
}

#[test]
fn unchanged_issues_are_skipped_on_second_export() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir, false);
    let issues = vec![issue("issue-1", "one"), issue("issue-2", "two")];

    assert_eq!(engine.export_to_jsonl(&issues).unwrap(), (2, 0));
    assert_eq!(engine.export_to_jsonl(&issues).unwrap(), (0, 2));
}

#[test]
fn only_changed_issue_is_reencoded() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir, false);
    let mut issues = vec![issue("issue-1", "one"), issue("issue-2", "two")];
    engine.export_to_jsonl(&issues).unwrap();

    issues[1].title = "two, edited".into();
    issues[1].updated_at += Duration::seconds(30);

    assert_eq!(engine.export_to_jsonl(&issues).unwrap(), (1, 1));
    let content = fs::read_to_string(engine.export_path()).unwrap();
    assert!(content.contains("two, edited"));
}

#[test]
fn export_writes_one_line_per_issue_ordered_by_id() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir, false);
    let issues = vec![issue("issue-2", "two"), issue("issue-1", "one")];
    engine.export_to_jsonl(&issues).unwrap();

    let content = fs::read_to_string(engine.export_path()).unwrap();
    assert!(content.ends_with('\n'));
    let ids: Vec<String> = content
        .lines()
        .map(|l| serde_json::from_str::<IssueRecord>(l).unwrap().id)
        .collect();
    assert_eq!(ids, vec!["issue-1", "issue-2"]);
}

#[test]
fn removed_issues_disappear_from_export() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir, false);
    engine
        .export_to_jsonl(&[issue("issue-1", "one"), issue("issue-2", "two")])
        .unwrap();

    assert_eq!(engine.export_to_jsonl(&[issue("issue-2", "two")]).unwrap(), (0, 1));
    let imported = engine.import_from_jsonl().unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].id, "issue-2");
}

#[test]
fn import_skips_malformed_lines() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir, false);
    let good = serde_json::to_string(&issue("issue-1", "one")).unwrap();
    fs::create_dir_all(engine.export_path().parent().unwrap()).unwrap();
    fs::write(engine.export_path(), format!("{good}\n{{not json\n\n{good}\n")).unwrap();

    let imported = engine.import_from_jsonl().unwrap();
    assert_eq!(imported.len(), 2);
}

#[test]
fn import_of_missing_export_is_empty() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir, false);
    assert!(engine.import_from_jsonl().unwrap().is_empty());
}

#[test]
fn git_steps_report_false_when_integration_disabled() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir, false);

    assert!(!engine.git_commit("msg"));
    assert!(!engine.git_pull());
    assert!(!engine.git_push());
}

#[test]
fn commit_outside_repository_fails() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir, true);
    assert!(!engine.git_commit("msg"));
}

#[test]
fn commit_succeeds_with_and_without_changes() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    git_init(&dir);
    let mut engine = engine(&dir, true);
    engine.export_to_jsonl(&[issue("issue-1", "one")]).unwrap();

    assert!(engine.git_commit("first"));
    // Nothing staged the second time.
    assert!(engine.git_commit("second"));

    let log = Command::new("git")
        .current_dir(dir.path())
        .args(["log", "--oneline"])
        .output()
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&log.stdout).lines().count(), 1);
}

#[test]
fn push_without_remote_counts_as_success() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    git_init(&dir);
    let mut engine = engine(&dir, true);
    engine.export_to_jsonl(&[issue("issue-1", "one")]).unwrap();
    assert!(engine.git_commit("first"));

    assert!(engine.git_push());
    assert!(!engine.git_pull());
}

#[test]
fn sync_reports_export_counts_when_git_is_off() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir, false);
    let issues = vec![issue("issue-1", "one")];

    let first = engine.sync(&issues);
    let second = engine.sync(&issues);

    assert_eq!((first.exported, first.skipped), (1, 0));
    assert_eq!((second.exported, second.skipped), (0, 1));
    assert!(!second.committed && !second.pulled && !second.pushed);
}

#[test]
fn sync_continues_after_export_failure() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    git_init(&dir);
    fs::write(dir.path().join("notes.txt"), "pending\n").unwrap();
    let config = DaemonConfig::default_for(dir.path());
    // A directory where the export file should be makes the write fail.
    fs::create_dir_all(config.get_export_path()).unwrap();
    let mut engine = SyncEngine::new(&config);

    let stats = engine.sync(&[issue("issue-1", "one")]);

    assert_eq!(stats.exported, 0);
    assert!(stats.committed);
    assert!(!stats.pulled);
    assert!(stats.pushed);
    let log = Command::new("git")
        .current_dir(dir.path())
        .args(["log", "--oneline"])
        .output()
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&log.stdout).lines().count(), 1);
}
