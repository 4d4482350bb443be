// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};

const QUICKSTART_HELP: &str = "\
Get started:
  trkd init               Write .issues/config.json
  trkd start              Start the workspace daemon
  trkd status             Show what the daemon is doing
  trkd sync               Run one sync cycle now
  trkd stop               Stop the daemon";

#[derive(Parser)]
#[command(name = "trkd")]
#[command(version)]
#[command(about = "Workspace daemon for the trk issue tracker")]
#[command(
    long_about = "Workspace daemon for the trk issue tracker.\n\n\
    Keeps one background process per workspace that exports the issue store to \
    a git-tracked JSONL file and optionally commits, pulls and pushes it."
)]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(long, short, global = true)]
    pub workspace: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the daemon in this process until stopped
    Run,

    /// Detach from the session and launch the daemon (internal)
    #[command(hide = true)]
    Detach,

    /// Start (or restart) the workspace daemon
    Start {
        /// Stay attached to the terminal and log to stderr
        #[arg(long)]
        foreground: bool,
    },

    /// Stop the workspace daemon
    Stop,

    /// Show daemon status
    Status,

    /// Check that the daemon answers
    Health,

    /// Run one sync cycle in the daemon
    Sync,

    /// Write a default workspace config
    Init {
        /// Replace an existing config with defaults
        #[arg(long)]
        force: bool,
    },
}
