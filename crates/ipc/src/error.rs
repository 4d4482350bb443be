// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for IPC clients.

use thiserror::Error;

/// Errors raised while talking to a daemon.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot connect to daemon at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The daemon answered with an `error` key; the message is verbatim.
    #[error("{0}")]
    Remote(String),

    #[error("unexpected response from daemon: {0}")]
    UnexpectedResponse(String),
}

/// A specialized Result type for IPC operations.
pub type Result<T> = std::result::Result<T, Error>;
