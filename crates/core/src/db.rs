// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed issue store, as seen by the daemon.
//!
//! The daemon only needs to read every issue as a plain record and, after a
//! git pull, merge newer records from the export back in. Issue CRUD lives
//! elsewhere; the schema here is the subset the export touches.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::issue::IssueRecord;

/// SQL schema for the exported subset of the issue store.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS issues (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'open',
    priority INTEGER NOT NULL DEFAULT 2,
    type TEXT NOT NULL DEFAULT 'task',
    assignee TEXT,
    epic_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    closed_at TEXT,
    project_id TEXT
);

CREATE TABLE IF NOT EXISTS labels (
    issue_id TEXT NOT NULL,
    label TEXT NOT NULL,
    PRIMARY KEY (issue_id, label),
    FOREIGN KEY (issue_id) REFERENCES issues(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_issues_updated ON issues(updated_at);
CREATE INDEX IF NOT EXISTS idx_labels_issue ON labels(issue_id);
"#;

/// Parse an RFC3339 timestamp column.
fn parse_timestamp(value: &str, field: &'static str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::InvalidTimestamp {
            field,
            value: value.to_string(),
        })
}

/// Raw row as stored, before timestamp parsing.
struct IssueRow {
    id: String,
    title: String,
    description: Option<String>,
    status: String,
    priority: i64,
    issue_type: String,
    assignee: Option<String>,
    epic_id: Option<String>,
    created_at: String,
    updated_at: String,
    closed_at: Option<String>,
    project_id: Option<String>,
}

impl IssueRow {
    fn into_record(self, labels: Vec<String>) -> Result<IssueRecord> {
        Ok(IssueRecord {
            created_at: parse_timestamp(&self.created_at, "created_at")?,
            updated_at: parse_timestamp(&self.updated_at, "updated_at")?,
            closed_at: self
                .closed_at
                .as_deref()
                .map(|s| parse_timestamp(s, "closed_at"))
                .transpose()?,
            id: self.id,
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            issue_type: self.issue_type,
            assignee: self.assignee,
            epic_id: self.epic_id,
            labels,
            project_id: self.project_id,
        })
    }
}

/// SQLite connection to a workspace's issue store.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the store at the given path, creating the schema if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(Database { conn })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Database { conn })
    }

    /// List every issue as a plain record, ordered by id.
    pub fn list_issues(&self) -> Result<Vec<IssueRecord>> {
        let mut labels = self.all_labels()?;

        let mut stmt = self.conn.prepare(
            "SELECT id, title, description, status, priority, type, assignee, epic_id,
                    created_at, updated_at, closed_at, project_id
             FROM issues ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(IssueRow {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                status: row.get(3)?,
                priority: row.get(4)?,
                issue_type: row.get(5)?,
                assignee: row.get(6)?,
                epic_id: row.get(7)?,
                created_at: row.get(8)?,
                updated_at: row.get(9)?,
                closed_at: row.get(10)?,
                project_id: row.get(11)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            let row = row?;
            let issue_labels = labels.remove(&row.id).unwrap_or_default();
            records.push(row.into_record(issue_labels)?);
        }
        Ok(records)
    }

    /// Labels for every issue, keyed by issue id, each list sorted.
    fn all_labels(&self) -> Result<HashMap<String, Vec<String>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT issue_id, label FROM labels ORDER BY issue_id, label")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for row in rows {
            let (issue_id, label) = row?;
            map.entry(issue_id).or_default().push(label);
        }
        Ok(map)
    }

    /// Insert or replace an issue and its labels.
    pub fn upsert_issue(&mut self, record: &IssueRecord) -> Result<()> {
        let tx = self.conn.transaction()?;
        write_record(&tx, record)?;
        tx.commit()?;
        Ok(())
    }

    /// Merge records into the store, keeping whichever copy was updated last.
    ///
    /// Returns the number of records written.
    pub fn merge_newer(&mut self, records: &[IssueRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut written = 0;
        for record in records {
            let is_newer = match stored_updated_at(&tx, &record.id)? {
                None => true,
                Some(stored) => stored < record.updated_at,
            };
            if is_newer {
                write_record(&tx, record)?;
                written += 1;
            }
        }
        tx.commit()?;
        Ok(written)
    }
}

fn stored_updated_at(conn: &Connection, id: &str) -> Result<Option<DateTime<Utc>>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT updated_at FROM issues WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    value
        .map(|s| parse_timestamp(&s, "updated_at"))
        .transpose()
}

fn write_record(conn: &Connection, record: &IssueRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO issues (id, title, description, status, priority, type, assignee,
                             epic_id, created_at, updated_at, closed_at, project_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(id) DO UPDATE SET
             title = excluded.title,
             description = excluded.description,
             status = excluded.status,
             priority = excluded.priority,
             type = excluded.type,
             assignee = excluded.assignee,
             epic_id = excluded.epic_id,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at,
             closed_at = excluded.closed_at,
             project_id = excluded.project_id",
        params![
            record.id,
            record.title,
            record.description,
            record.status,
            record.priority,
            record.issue_type,
            record.assignee,
            record.epic_id,
            record.created_at.to_rfc3339(),
            record.updated_at.to_rfc3339(),
            record.closed_at.map(|t| t.to_rfc3339()),
            record.project_id,
        ],
    )?;

    conn.execute("DELETE FROM labels WHERE issue_id = ?1", params![record.id])?;
    for label in &record.labels {
        conn.execute(
            "INSERT OR IGNORE INTO labels (issue_id, label) VALUES (?1, ?2)",
            params![record.id, label],
        )?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
