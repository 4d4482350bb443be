// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::TimeZone;

fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

#[test]
fn serializes_issue_type_as_type() {
    let record = IssueRecord::new("issue-1", "First", fixed_time());
    let json = serde_json::to_value(&record).unwrap();

    assert_eq!(json["type"], "task");
    assert!(json.get("issue_type").is_none());
}

#[test]
fn export_line_carries_every_field() {
    let record = IssueRecord::new("issue-1", "First", fixed_time());
    let json = serde_json::to_value(&record).unwrap();
    let obj = json.as_object().unwrap();

    for key in [
        "id",
        "title",
        "description",
        "status",
        "priority",
        "type",
        "assignee",
        "epic_id",
        "labels",
        "created_at",
        "updated_at",
        "closed_at",
        "project_id",
    ] {
        assert!(obj.contains_key(key), "missing {key}");
    }
}

#[test]
fn deserializes_sparse_line_with_defaults() {
    let line = r#"{"id":"issue-9","title":"t","status":"open","type":"bug","created_at":"2026-03-01T12:00:00Z","updated_at":"2026-03-01T12:00:00Z"}"#;
    let record: IssueRecord = serde_json::from_str(line).unwrap();

    assert_eq!(record.issue_type, "bug");
    assert!(record.labels.is_empty());
    assert_eq!(record.priority, 0);
    assert!(record.closed_at.is_none());
}

