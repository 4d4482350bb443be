// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL (JSON Lines) file utilities.
//!
//! The export snapshot is rewritten in full on every pass and read back
//! leniently: a damaged line must not hide the rest of the file.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::Result;

/// Reads every parseable record from a JSONL file.
///
/// Blank lines are ignored and malformed lines are skipped with a warning.
/// Returns an empty vec if the file doesn't exist.
pub fn read_lenient<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(
                    "skipping malformed line {} in {}: {}",
                    index + 1,
                    path.display(),
                    e
                );
            }
        }
    }

    Ok(records)
}

/// Writes pre-encoded lines to a JSONL file, replacing existing content.
///
/// Each line is newline-terminated. Parent directories are created on demand.
pub fn write_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writer.write_all(line.as_ref().as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    writer.get_ref().sync_all()?;

    Ok(())
}

#[cfg(test)]
#[path = "jsonl_tests.rs"]
mod tests;
