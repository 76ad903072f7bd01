//! Configuration settings for SapTuner
//!
//! Defines the engine configuration (file locations and timeouts) and the
//! CLI argument surface.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default location of the persisted tuning state file.
pub const DEFAULT_STATE_FILE: &str = "/var/lib/saptuner/state.json";

/// Directory for external parties to place their tuning sheet files.
pub const DEFAULT_EXTRA_SHEETS_DIR: &str = "/etc/saptuner/extra";

/// Engine configuration: file locations and timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Persisted tuning state file
    pub state_file: PathBuf,
    /// Advisory lock file guarding the state against concurrent invocations
    pub lock_file: PathBuf,
    /// Directory with external tuning sheets (JSON, override built-ins by id)
    pub extra_sheets_dir: PathBuf,
    /// How long a mutating operation waits for the exclusive state lock
    pub lock_timeout: Duration,
    /// Upper bound for a single live parameter read
    pub read_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let state_file = PathBuf::from(DEFAULT_STATE_FILE);
        let lock_file = state_file.with_extension("lock");
        Self {
            state_file,
            lock_file,
            extra_sheets_dir: PathBuf::from(DEFAULT_EXTRA_SHEETS_DIR),
            lock_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(2),
        }
    }
}

impl EngineConfig {
    /// Build the engine configuration from parsed CLI arguments
    pub fn from_cli(args: &CliArgs) -> Self {
        let mut config = Self::default();
        if let Some(state_file) = &args.state_file {
            config.state_file = state_file.clone();
            config.lock_file = state_file.with_extension("lock");
        }
        if let Some(dir) = &args.extra_sheets {
            config.extra_sheets_dir = dir.clone();
        }
        config.lock_timeout = Duration::from_secs(args.lock_timeout);
        config
    }
}

/// SapTuner - comprehensive system optimisation management for SAP solutions
#[derive(Parser, Debug, Clone)]
#[command(name = "saptuner")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Comprehensive system optimisation management for SAP solutions")]
#[command(long_about = r#"
SapTuner applies, verifies and reverts SAP/SUSE tuning notes and solutions.

Daemon control:
  saptuner daemon [ start | status | stop ]
Tune system according to SAP and SUSE notes:
  saptuner note [ list | verify ]
  saptuner note [ apply | simulate | verify | revert ] NoteID
Tune system for all notes applicable to your SAP solution:
  saptuner solution [ list | verify ]
  saptuner solution [ apply | simulate | verify | revert ] SolutionName
"#)]
pub struct CliArgs {
    /// Persisted tuning state file
    #[arg(long, env = "SAPTUNER_STATE_FILE", value_name = "PATH")]
    pub state_file: Option<PathBuf>,

    /// Directory with external tuning sheets
    #[arg(long, env = "SAPTUNER_EXTRA_SHEETS", value_name = "DIR")]
    pub extra_sheets: Option<PathBuf>,

    /// Seconds to wait for the exclusive state lock
    #[arg(long, default_value = "10", value_name = "SECS")]
    pub lock_timeout: u64,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Control the tuning daemon (tuned.service)
    Daemon {
        /// Daemon action
        #[command(subcommand)]
        action: DaemonAction,
    },
    /// Apply, verify or revert individual tuning notes
    Note {
        /// Note action
        #[command(subcommand)]
        action: NoteAction,
    },
    /// Apply, verify or revert whole SAP solutions
    Solution {
        /// Solution action
        #[command(subcommand)]
        action: SolutionAction,
    },
}

/// Daemon-level actions
#[derive(Subcommand, Debug, Clone)]
pub enum DaemonAction {
    /// Enable and start the tuning daemon
    Start,
    /// Report daemon state and enabled notes/solutions
    Status,
    /// Disable and stop the tuning daemon
    Stop,
    /// Re-apply the full tuning state (invoked by the tuned profile script)
    #[command(hide = true)]
    Apply,
    /// Revert the full tuning state (invoked by the tuned profile script)
    #[command(hide = true)]
    Revert,
}

/// Note-level actions
#[derive(Subcommand, Debug, Clone)]
pub enum NoteAction {
    /// List all known notes, marking enabled ones
    List,
    /// Apply a note and save original values for later revert
    Apply {
        /// Note identifier
        id: String,
    },
    /// Show the changes a note apply would make, without applying
    Simulate {
        /// Note identifier
        id: String,
    },
    /// Compare live values against a note, or against all enabled notes
    Verify {
        /// Note identifier (omit to verify everything enabled)
        id: Option<String>,
    },
    /// Restore the saved original values of a note
    Revert {
        /// Note identifier
        id: String,
    },
}

/// Solution-level actions
#[derive(Subcommand, Debug, Clone)]
pub enum SolutionAction {
    /// List all solutions for this platform, marking enabled ones
    List,
    /// Apply every note of a solution
    Apply {
        /// Solution name
        name: String,
    },
    /// Show the changes a solution apply would make, without applying
    Simulate {
        /// Solution name
        name: String,
    },
    /// Compare live values against a solution, or against all enabled notes
    Verify {
        /// Solution name (omit to verify everything enabled)
        name: Option<String>,
    },
    /// Restore the saved original values of a solution's notes
    Revert {
        /// Solution name
        name: String,
    },
}
