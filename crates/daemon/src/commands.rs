// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `trkd` subcommands.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use trk_core::DaemonConfig;
use trk_ipc::IpcClient;

use crate::cli::Command;
use crate::error::Result;
use crate::lifecycle::{self, canonical_workspace};
use crate::logging;
use crate::service::DaemonService;

/// Runs one subcommand against `workspace` (current directory if `None`).
pub fn run(workspace: Option<PathBuf>, command: Command) -> Result<()> {
    let workspace = match workspace {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let workspace = canonical_workspace(&workspace);

    match command {
        Command::Run => {
            let config = DaemonConfig::load(&workspace);
            logging::setup_daemon_logging(&config.get_log_path());
            run_daemon(config)
        }
        Command::Detach => detach(&workspace),
        Command::Start { foreground: true } => {
            logging::setup_foreground_logging();
            run_daemon(DaemonConfig::load(&workspace))
        }
        Command::Start { foreground: false } => {
            logging::setup_client_logging();
            let pid = lifecycle::start_daemon(&workspace, true)?;
            print_json(&json!({"status": "started", "pid": pid}))
        }
        Command::Stop => {
            logging::setup_client_logging();
            let stopped = lifecycle::stop_daemon(&workspace)?;
            print_json(&json!({"stopped": stopped}))
        }
        Command::Status => {
            logging::setup_client_logging();
            if lifecycle::is_daemon_running(&workspace) {
                request(&workspace, "status")
            } else {
                print_json(&json!({
                    "running": false,
                    "workspace": workspace.display().to_string(),
                }))
            }
        }
        Command::Health => {
            logging::setup_client_logging();
            request(&workspace, "health")
        }
        Command::Sync => {
            logging::setup_client_logging();
            request(&workspace, "sync")
        }
        Command::Init { force } => {
            logging::setup_client_logging();
            DaemonConfig::init(&workspace, force)?;
            print_json(&json!({
                "config": DaemonConfig::config_path(&workspace).display().to_string(),
            }))
        }
    }
}

/// Runs the daemon on a fresh tokio runtime until it shuts down.
fn run_daemon(config: DaemonConfig) -> Result<()> {
    tracing::info!(
        "trkd {} starting for {}",
        env!("CARGO_PKG_VERSION"),
        config.workspace_path.display()
    );
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(DaemonService::new(config).run());
    if let Err(e) = &result {
        tracing::error!("daemon exited with error: {}", e);
    }
    result
}

#[cfg(unix)]
fn detach(workspace: &Path) -> Result<()> {
    let binary = std::env::current_exe()?;
    let pid = lifecycle::detach_and_spawn(&binary, workspace)?;
    println!("{}", pid);
    Ok(())
}

#[cfg(not(unix))]
fn detach(_workspace: &Path) -> Result<()> {
    Err(crate::error::Error::Process(
        "detach is only used on Unix platforms".to_string(),
    ))
}

/// Sends `{"method": <method>}` and prints the reply.
///
/// A reply carrying an `error` key fails the command after printing it.
fn request(workspace: &Path, method: &str) -> Result<()> {
    let client = IpcClient::for_config(&DaemonConfig::load(workspace));
    let reply = client.call_raw(&json!({ "method": method }))?;
    print_json(&reply)?;
    match reply.get("error").and_then(Value::as_str) {
        Some(message) => Err(trk_ipc::Error::Remote(message.to_string()).into()),
        None => Ok(()),
    }
}

fn print_json(value: &Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(trk_core::Error::from)?;
    println!("{}", text);
    Ok(())
}
