//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "rts", version, about = "Somfy RTS shutter control")]
pub struct Args {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/rts_config.toml")]
    pub config: PathBuf,

    /// Print the result as a JSON line
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Override the configured frame repetition count
    #[arg(long)]
    pub repeat: Option<u32>,

    /// Block until the estimated travel time has elapsed before reporting
    #[arg(long, action = ArgAction::SetTrue)]
    pub wait: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Lower a shutter fully
    Lower { id: String },
    /// Raise a shutter fully
    Rise { id: String },
    /// Stop a shutter and reconcile its position estimate
    Stop { id: String },
    /// Lower to a target percentage (blocks for the travel time)
    LowerPartial {
        id: String,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        target: u8,
    },
    /// Raise to a target percentage (blocks for the travel time)
    RisePartial {
        id: String,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        target: u8,
    },
    /// Put the receiver into programming mode
    Program { id: String },
    /// Print the current position estimate
    Position { id: String },
}

impl Command {
    pub fn shutter_id(&self) -> &str {
        match self {
            Command::Lower { id }
            | Command::Rise { id }
            | Command::Stop { id }
            | Command::LowerPartial { id, .. }
            | Command::RisePartial { id, .. }
            | Command::Program { id }
            | Command::Position { id } => id,
        }
    }
}
