// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the daemon and its lifecycle manager.

use thiserror::Error;

/// All possible errors that can occur in the daemon and its lifecycle manager.
#[derive(Debug, Error)]
pub enum Error {
    #[error("daemon auto-start is disabled\n  hint: unset TRK_AUTO_START_DAEMON to allow starting a daemon")]
    AutoStartDisabled,

    #[error("process error: {0}")]
    Process(String),

    #[error("ipc error: {0}")]
    Ipc(#[from] trk_ipc::Error),

    #[error("sync error: {0}")]
    Sync(String),

    #[error(transparent)]
    Core(#[from] trk_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for daemon operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
