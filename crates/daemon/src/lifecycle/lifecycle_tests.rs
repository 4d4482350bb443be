// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use std::cell::RefCell;
use std::collections::HashMap;

use tempfile::TempDir;
use yare::parameterized;

use super::*;

/// In-memory process table.
#[derive(Default)]
struct FakeRegistry {
    /// pid -> (command line, ignores graceful termination)
    processes: RefCell<HashMap<u32, (String, bool)>>,
    signals: RefCell<Vec<(u32, bool)>>,
}

impl FakeRegistry {
    fn with(self, pid: u32, cmdline: impl Into<String>, stubborn: bool) -> Self {
        self.processes
            .borrow_mut()
            .insert(pid, (cmdline.into(), stubborn));
        self
    }

    fn signals(&self) -> Vec<(u32, bool)> {
        self.signals.borrow().clone()
    }
}

impl ProcessRegistry for FakeRegistry {
    fn list_by_tag(&self, tag: &str) -> Vec<u32> {
        let mut pids: Vec<u32> = self
            .processes
            .borrow()
            .iter()
            .filter(|(_, (cmdline, _))| matches_tag(cmdline, tag))
            .map(|(pid, _)| *pid)
            .collect();
        pids.sort_unstable();
        pids
    }

    fn terminate(&self, pid: u32, force: bool) -> bool {
        self.signals.borrow_mut().push((pid, force));
        let mut processes = self.processes.borrow_mut();
        match processes.get(&pid) {
            Some((_, stubborn)) => {
                if force || !stubborn {
                    processes.remove(&pid);
                }
                true
            }
            None => false,
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.processes.borrow().contains_key(&pid)
    }
}

fn lifecycle(registry: FakeRegistry) -> Lifecycle<FakeRegistry> {
    Lifecycle::with_registry(registry)
        .with_stop_timeout(Duration::from_millis(100))
        .with_ready_timeout(Duration::from_millis(200))
}

fn workspace() -> (TempDir, PathBuf, DaemonConfig) {
    let dir = TempDir::new().unwrap();
    let ws = canonical_workspace(dir.path());
    let config = DaemonConfig::default_for(&ws);
    fs::create_dir_all(config.issues_dir()).unwrap();
    (dir, ws, config)
}

#[test]
fn signature_names_binary_subcommand_and_workspace() {
    assert_eq!(
        daemon_signature(Path::new("/srv/proj")),
        "trkd run --workspace /srv/proj"
    );
}

#[parameterized(
    plain = { "123", Some(123) },
    trailing_newline = { "4567\n", Some(4567) },
    padded = { "  89  ", Some(89) },
    zero = { "0", None },
    negative = { "-5", None },
    garbage = { "abc", None },
    empty = { "", None },
)]
fn pid_file_parsing(content: &str, expected: Option<u32>) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("daemon.pid");
    fs::write(&path, content).unwrap();
    assert_eq!(read_pid_file(&path), expected);
}

#[test]
fn no_pid_file_means_not_running() {
    let (_dir, ws, _config) = workspace();
    let lifecycle = lifecycle(FakeRegistry::default());

    assert!(!lifecycle.is_running(&ws));
    assert_eq!(lifecycle.daemon_pid(&ws), None);
}

#[test]
fn dead_recorded_pid_means_not_running() {
    let (_dir, ws, config) = workspace();
    fs::write(config.get_pid_path(), "4242").unwrap();
    let lifecycle = lifecycle(FakeRegistry::default());

    assert!(!lifecycle.is_running(&ws));
    assert!(!lifecycle.stop(&ws).unwrap());
    assert!(!config.get_pid_path().exists());
}

#[test]
fn live_recorded_pid_is_reported() {
    let (_dir, ws, config) = workspace();
    fs::write(config.get_pid_path(), "4242").unwrap();
    let lifecycle = lifecycle(FakeRegistry::default().with(4242, "trkd run", false));

    assert_eq!(lifecycle.daemon_pid(&ws), Some(4242));
}

#[test]
fn stop_escalates_to_force_for_stubborn_daemon() {
    let (_dir, ws, config) = workspace();
    fs::write(config.get_pid_path(), "4242").unwrap();
    let lifecycle = lifecycle(FakeRegistry::default().with(4242, "trkd run", true));

    assert!(lifecycle.stop(&ws).unwrap());

    assert_eq!(lifecycle.registry().signals(), vec![(4242, false), (4242, true)]);
    assert!(!lifecycle.registry().is_alive(4242));
    assert!(!config.get_pid_path().exists());
}

#[test]
fn stop_is_graceful_when_daemon_cooperates() {
    let (_dir, ws, config) = workspace();
    fs::write(config.get_pid_path(), "4242").unwrap();
    let lifecycle = lifecycle(FakeRegistry::default().with(4242, "trkd run", false));

    assert!(lifecycle.stop(&ws).unwrap());
    assert_eq!(lifecycle.registry().signals(), vec![(4242, false)]);
}

#[test]
fn sweep_terminates_only_this_workspaces_daemons() {
    let (_dir, ws, _config) = workspace();
    let mine = daemon_signature(&ws);
    let theirs = format!("/usr/bin/trkd run --workspace {}-other", ws.display());
    let registry = FakeRegistry::default()
        .with(10, format!("/usr/bin/{mine}"), false)
        .with(11, theirs, false)
        .with(12, mine.clone(), true)
        .with(13, format!("vim {}", ws.display()), false);
    let lifecycle = lifecycle(registry);

    assert_eq!(lifecycle.sweep_zombies(&ws), 2);

    assert_eq!(
        lifecycle.registry().signals(),
        vec![(10, false), (12, false), (12, true)]
    );
    assert!(lifecycle.registry().is_alive(11));
    assert!(lifecycle.registry().is_alive(13));
}

#[test]
fn sweep_never_targets_current_process() {
    let (_dir, ws, _config) = workspace();
    let own = std::process::id();
    let registry = FakeRegistry::default().with(own, daemon_signature(&ws), false);
    let lifecycle = lifecycle(registry);

    assert_eq!(lifecycle.sweep_zombies(&ws), 0);
    assert!(lifecycle.registry().signals().is_empty());
}

#[test]
fn kill_switch_refuses_start_without_touching_pid_file() {
    let (_dir, ws, config) = workspace();
    fs::write(config.get_pid_path(), "4242").unwrap();
    let lifecycle = lifecycle(FakeRegistry::default().with(4242, "trkd run", false))
        .with_auto_start(false);

    let err = lifecycle.start(&ws, true).unwrap_err();

    assert!(matches!(err, Error::AutoStartDisabled));
    assert_eq!(fs::read_to_string(config.get_pid_path()).unwrap(), "4242");
    assert!(lifecycle.registry().signals().is_empty());
}

#[parameterized(
    attached = { false },
    detached = { true },
)]
fn missing_binary_is_a_process_error(detach: bool) {
    let (dir, ws, config) = workspace();
    let lifecycle = lifecycle(FakeRegistry::default())
        .with_auto_start(true)
        .with_binary(dir.path().join("no-such-trkd"));

    let err = lifecycle.start(&ws, detach).unwrap_err();

    assert!(matches!(err, Error::Process(_)), "{err}");
    assert!(!config.get_pid_path().exists());
}

#[test]
fn ensure_respects_workspace_auto_start_flag() {
    let (_dir, ws, mut config) = workspace();
    config.auto_start_daemon = false;
    config.save().unwrap();
    let lifecycle = lifecycle(FakeRegistry::default()).with_auto_start(true);

    assert_eq!(lifecycle.ensure(&ws).unwrap(), None);
    assert!(lifecycle.registry().signals().is_empty());
}

#[test]
fn ensure_returns_running_daemon() {
    let (_dir, ws, config) = workspace();
    fs::write(config.get_pid_path(), "4242").unwrap();
    let lifecycle = lifecycle(FakeRegistry::default().with(4242, "trkd run", false));

    assert_eq!(lifecycle.ensure(&ws).unwrap(), Some(4242));
}
