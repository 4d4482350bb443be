// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! trkd: the per-workspace issue tracker daemon.
//!
//! The daemon keeps one background process per workspace. It owns the
//! issue store, answers control requests over a local socket, and
//! periodically exports the store to a git-tracked JSONL snapshot.

pub mod cli;
mod commands;
pub mod env;
pub mod error;
pub mod lifecycle;
pub mod logging;
mod server;
pub mod service;
pub mod sync;

pub use cli::{Cli, Command};
pub use commands::run;
pub use error::{Error, Result};
pub use lifecycle::{
    daemon_pid, ensure_daemon, is_daemon_running, start_daemon, stop_daemon, Lifecycle,
    ProcessRegistry, SystemRegistry,
};
pub use service::{DaemonHandle, DaemonService, DaemonState};
pub use sync::SyncEngine;
