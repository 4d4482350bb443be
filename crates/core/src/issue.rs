// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Plain issue records as exported to the JSONL snapshot.
//!
//! The daemon never interprets issue workflow; it only moves these records
//! between the SQL store and the git-tracked export file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One issue as a flat, serializable record.
///
/// Field order matches the export line layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(rename = "type")]
    pub issue_type: String,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub epic_id: Option<String>,
    /// Labels, sorted.
    #[serde(default)]
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl IssueRecord {
    /// Creates an open task record with the given id and title.
    pub fn new(id: impl Into<String>, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        IssueRecord {
            id: id.into(),
            title: title.into(),
            description: None,
            status: "open".to_string(),
            priority: 2,
            issue_type: "task".to_string(),
            assignee: None,
            epic_id: None,
            labels: Vec::new(),
            created_at: now,
            updated_at: now,
            closed_at: None,
            project_id: None,
        }
    }
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;
