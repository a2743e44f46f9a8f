use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// meetinvite - turn a CSV of meeting rows into Outlook invites and feedback requests
#[derive(Debug, Parser)]
#[command(name = "meetinvite")]
#[command(about = "Send Outlook calendar invites from a CSV and request feedback afterwards", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Meeting rows CSV (overrides MEETINGS_CSV)
    #[arg(long, global = true, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// Subject marker for feedback requests (overrides FEEDBACK_MARKER)
    #[arg(long, global = true, value_name = "TEXT")]
    pub marker: Option<String>,

    /// Command to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Send invites, wait, then request feedback
    Run {
        /// Print event payloads instead of creating events; skips feedback
        #[arg(long)]
        dry_run: bool,
    },

    /// Send invites only
    Invite {
        /// Print event payloads instead of creating events
        #[arg(long)]
        dry_run: bool,
    },

    /// Request feedback for events whose subject contains the marker
    Feedback,

    /// Import and group the CSV without contacting any service
    Check,

    /// Write a default settings file and a .env template
    InitConfig {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub fn resolved_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run { dry_run: false })
    }
}
