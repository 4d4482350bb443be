// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon.

use std::path::PathBuf;

/// Generated environment variable name constants.
pub mod names {
    include!(concat!(env!("OUT_DIR"), "/env_names.rs"));
}

/// Returns `false` only if `TRK_AUTO_START_DAEMON` is set to a false value.
pub fn auto_start_daemon() -> bool {
    match std::env::var(names::TRK_AUTO_START_DAEMON) {
        Ok(value) => !is_false_value(&value),
        Err(_) => true,
    }
}

/// Returns the value of `TRK_DAEMON_BINARY` if set.
pub fn daemon_binary() -> Option<PathBuf> {
    std::env::var(names::TRK_DAEMON_BINARY)
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

/// Returns the `RUST_LOG` filter directives if set.
pub fn log_filter() -> Option<String> {
    std::env::var(names::RUST_LOG).ok().filter(|s| !s.is_empty())
}

fn is_false_value(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
