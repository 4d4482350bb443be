// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! trk-core: Shared library for the trk workspace daemon
//!
//! This crate provides the workspace configuration, the plain issue record
//! exported to JSONL, and the read side of the SQLite issue store used by
//! both the daemon and its clients.

pub mod config;
pub mod db;
pub mod error;
pub mod issue;
pub mod jsonl;

pub use config::{DaemonConfig, DaemonMode, ISSUES_DIR_NAME};
pub use db::Database;
pub use error::{Error, Result};
pub use issue::IssueRecord;
