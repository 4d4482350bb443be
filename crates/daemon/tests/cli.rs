// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

mod common;
use common::*;

#[test]
fn init_writes_config_and_gitignore() {
    let temp = TempDir::new().unwrap();

    trkd()
        .arg("init")
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("config.json"));

    assert!(temp.path().join(".issues/config.json").exists());
    assert!(temp.path().join(".issues/.gitignore").exists());
}

#[test]
fn init_force_restores_defaults() {
    let ws = Workspace::new(7);

    ws.trkd().arg("init").assert().success();
    assert_eq!(ws.config().sync_interval_seconds.get(), 7);

    ws.trkd().args(["init", "--force"]).assert().success();
    assert_eq!(ws.config().sync_interval_seconds.get(), 5);
}

#[test]
fn kill_switch_refuses_start() {
    let ws = Workspace::new(5);

    ws.trkd()
        .arg("start")
        .env("TRK_AUTO_START_DAEMON", "0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("auto-start is disabled"));

    assert!(!ws.config().get_pid_path().exists());
}

#[test]
fn status_without_daemon_reports_not_running() {
    let ws = Workspace::new(5);

    let status = ws.json(&["status"]);
    assert_eq!(status["running"], json!(false));
}

#[test]
fn stop_without_daemon_reports_nothing_stopped() {
    let ws = Workspace::new(5);
    assert_eq!(ws.json(&["stop"]), json!({"stopped": false}));
}

#[test]
fn health_without_daemon_fails() {
    let ws = Workspace::new(5);

    ws.trkd()
        .arg("health")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot connect"));
}

#[test]
fn start_status_sync_stop_round_trip() {
    let ws = Workspace::new(60);
    ws.seed(&["issue-1"]);

    let started = ws.json(&["start"]);
    assert_eq!(started["status"], json!("started"));
    let pid = started["pid"].as_u64().unwrap();

    let status = ws.json(&["status"]);
    assert_eq!(status["running"], json!(true));
    assert_eq!(status["pid"].as_u64(), Some(pid));
    assert_eq!(status["sync_interval"], json!(60));

    let health = ws.json(&["health"]);
    assert_eq!(health["healthy"], json!(true));

    let sync = ws.json(&["sync"]);
    assert_eq!(sync["status"], json!("success"));
    assert_eq!(sync["stats"]["exported"], json!(1));

    assert_eq!(ws.json(&["stop"]), json!({"stopped": true}));
    assert_eq!(ws.json(&["status"])["running"], json!(false));
}

#[test]
fn help_lists_subcommands() {
    trkd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("detach").not());
}
