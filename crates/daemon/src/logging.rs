// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing subscriber setup.

use std::fs;
use std::path::Path;

use tracing_subscriber::EnvFilter;

use crate::env;

fn filter(default: &str) -> EnvFilter {
    filter_from(env::log_filter().as_deref(), default)
}

/// Builds a filter from `directives`, using `default` when absent or invalid.
fn filter_from(directives: Option<&str>, default: &str) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(default))
}

/// Route logs to the daemon's append-only log file, falling back to stderr.
pub fn setup_daemon_logging(log_path: &Path) {
    if let Some(parent) = log_path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    if let Ok(file) = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter("info"))
            .with_writer(file)
            .with_ansi(false)
            .try_init();
    } else {
        setup_stderr_logging("info");
    }
}

/// Route logs to stderr for short-lived client commands.
pub fn setup_client_logging() {
    setup_stderr_logging("warn");
}

/// Route daemon logs to stderr when running attached to a terminal.
pub fn setup_foreground_logging() {
    setup_stderr_logging("info");
}

fn setup_stderr_logging(default: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(default))
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
