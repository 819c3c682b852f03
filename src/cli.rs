//! Command line interface built on clap.
//!
//! Defines [`Cli`] with its [`Command`] subcommands and the global flags
//! (`--config`, `--role`, `--verbose`, `--json-logs`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Shop-floor production tracking for the plant ERP.
#[derive(Debug, Parser)]
#[command(name = "shopfloor", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file; defaults to ./shopfloor.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Role to act as, overriding the configured one.
    #[arg(long, global = true)]
    pub role: Option<String>,

    /// Enables debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Emits logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    pub json_logs: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Prints the workstation board once.
    Board,

    /// Keeps the board on screen, rebuilding it on every change.
    Watch,

    /// Starts, pauses, resumes or stops a production timer.
    Timer {
        #[command(subcommand)]
        action: TimerCommand,
    },

    /// Logs produced units against an active timer.
    Log {
        timer: Uuid,
        /// Units produced since the last entry.
        #[arg(allow_negative_numbers = true)]
        units: i64,
    },

    /// Manages the team assigned to a timer.
    Team {
        #[command(subcommand)]
        action: TeamCommand,
    },

    /// Lists the modules visible to the current role.
    Modules,
}

#[derive(Debug, Subcommand)]
pub enum TimerCommand {
    Start {
        workstation: Uuid,
        /// Production order to run on the workstation.
        order: Uuid,
    },
    Pause {
        timer: Uuid,
    },
    Resume {
        timer: Uuid,
    },
    Stop {
        timer: Uuid,
    },
}

#[derive(Debug, Subcommand)]
pub enum TeamCommand {
    Add { timer: Uuid, employee: Uuid },
    Remove { timer: Uuid, employee: Uuid },
}

impl Command {
    /// Whether the command reads or writes shop-floor data.
    pub fn needs_shop_floor(&self) -> bool {
        !matches!(self, Command::Modules)
    }
}
