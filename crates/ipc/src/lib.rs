// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane protocol between the trk daemon and its clients.
//!
//! Each connection carries exactly one request and one response. Both are
//! single JSON objects with length-prefixed framing. A request names its
//! method in a `method` key; a response signals failure with an `error` key.

mod client;
mod endpoint;
pub mod error;
pub mod framing;

use serde::{Deserialize, Serialize};

pub use client::IpcClient;
pub use endpoint::{Endpoint, Stream};
pub use error::{Error, Result};
pub use trk_core::DaemonMode;

/// Request sent from a client to the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
    /// Liveness and identity.
    Health,
    /// Runtime state and sync settings.
    Status,
    /// Run one sync cycle now.
    Sync,
    /// Graceful shutdown.
    Stop,
}

/// Why a request could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Malformed request: {0}")]
    Malformed(String),
}

impl Request {
    /// Returns the wire name of the method.
    pub fn method(&self) -> &'static str {
        match self {
            Request::Health => "health",
            Request::Status => "status",
            Request::Sync => "sync",
            Request::Stop => "stop",
        }
    }

    /// Decodes a request frame.
    ///
    /// A well-formed object naming an unsupported method yields
    /// [`RequestError::UnknownMethod`] so the caller can answer it.
    pub fn decode(bytes: &[u8]) -> std::result::Result<Request, RequestError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| RequestError::Malformed(e.to_string()))?;

        let method = match value.get("method") {
            Some(serde_json::Value::String(method)) => method.clone(),
            Some(_) => return Err(RequestError::Malformed("method must be a string".into())),
            None if value.is_object() => {
                return Err(RequestError::Malformed("missing method".into()))
            }
            None => {
                return Err(RequestError::Malformed(
                    "request must be a JSON object".into(),
                ))
            }
        };

        serde_json::from_value(value).map_err(|_| RequestError::UnknownMethod(method))
    }
}

/// Counts and outcomes of one sync cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Issues re-encoded because their content changed.
    pub exported: usize,
    /// Issues whose previous line was reused unchanged.
    pub skipped: usize,
    pub committed: bool,
    pub pulled: bool,
    pub pushed: bool,
    /// Records merged back into the store from a pulled export.
    #[serde(default)]
    pub imported: usize,
}

/// Response to `health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthInfo {
    pub healthy: bool,
    pub uptime_seconds: u64,
    pub workspace: String,
    pub pid: u32,
    pub version: String,
}

/// Response to `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub running: bool,
    pub workspace: String,
    pub pid: u32,
    pub uptime_seconds: u64,
    pub sync_enabled: bool,
    /// Seconds between periodic syncs.
    pub sync_interval: u64,
    pub daemon_mode: DaemonMode,
    /// Unix seconds of the last completed sync cycle.
    #[serde(default)]
    pub last_sync: Option<u64>,
}

/// Response to `sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SyncReply {
    Success { stats: SyncStats },
    Error { error: String },
}

/// Response to `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StopReply {
    Stopping,
}

/// Generic failure response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

/// Response sent from the daemon to a client.
///
/// Serialized without a wrapper; variant order matters for decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Health(HealthInfo),
    Status(StatusInfo),
    Sync(SyncReply),
    Stopping(StopReply),
    Error(ErrorReply),
}

impl Response {
    /// Creates a generic failure response.
    pub fn failure(message: impl Into<String>) -> Self {
        Response::Error(ErrorReply {
            error: message.into(),
        })
    }

    /// Returns the `error` message if this response signals failure.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Response::Error(ErrorReply { error }) | Response::Sync(SyncReply::Error { error }) => {
                Some(error)
            }
            _ => None,
        }
    }
}

impl From<RequestError> for Response {
    fn from(err: RequestError) -> Self {
        Response::failure(err.to_string())
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
