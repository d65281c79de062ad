//! Weapon CLI
//!
//! Read-only inspection of a weapon data directory. Safe to run while an
//! application holds the directory: the log is read into memory and never
//! written back.
//!
//! # Commands
//!
//! - `inspect` - Event counts, devices and per-backend sync state
//! - `dump-log` - Events in canonical order
//! - `leeches` - Cards that keep lapsing
//! - `version` - Version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Weapon data directory tools.
#[derive(Parser)]
#[command(name = "weapon")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display event counts, devices and sync state
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Dump events in canonical order
    DumpLog {
        /// Maximum number of events to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only events of this device
        #[arg(short, long)]
        device: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List leeches
    Leeches {
        /// Lapses in the window above which a card is a leech
        #[arg(short, long, default_value = "4")]
        threshold: u32,

        /// Recent reviews considered
        #[arg(short, long, default_value = "8")]
        window: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Data directory required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::DumpLog {
            limit,
            device,
            format,
        } => {
            let path = cli.path.ok_or("Data directory required for dump-log")?;
            commands::dump_log::run(&path, limit, device.as_deref(), &format)?;
        }
        Commands::Leeches {
            threshold,
            window,
            format,
        } => {
            let path = cli.path.ok_or("Data directory required for leeches")?;
            commands::leeches::run(&path, threshold, window, &format)?;
        }
        Commands::Version => {
            println!("Weapon CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Weapon Core v{}", weapon_core::VERSION);
            println!("Log format v{}", weapon_core::FORMAT_VERSION);
        }
    }

    Ok(())
}
