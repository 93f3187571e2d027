//! Whole-body controller configuration CLI.
//!
//! Provides two modes of operation:
//! - `validate`: Check a TOML configuration and print its priority levels
//! - `layout`: Print levels, row counts, joint columns and required task frames

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use wbc_core::prelude::*;
use wbc_velocity::WbcVelocity;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Velocity-level whole-body controller tools.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a configuration file and print its priority levels.
    Validate {
        /// Path to the TOML configuration.
        config: PathBuf,
    },

    /// Print the equation layout a configuration produces.
    Layout {
        /// Path to the TOML configuration.
        config: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Mode implementations
// ---------------------------------------------------------------------------

fn load(path: &Path) -> Result<WbcVelocity, WbcError> {
    let config = WbcConfig::from_file(path)?;
    debug!(path = %path.display(), constraints = config.constraints.len(), "loaded configuration");
    let mut wbc = WbcVelocity::new();
    wbc.configure_from(&config)?;
    Ok(wbc)
}

fn run_validate(path: &Path) -> Result<(), WbcError> {
    let wbc = load(path)?;
    println!("{}: ok", path.display());
    for (idx, level) in wbc.levels().iter().enumerate() {
        let names: Vec<&str> = level.constraints().iter().map(|c| c.name()).collect();
        println!("  level {idx} (priority {}): {}", level.priority(), names.join(", "));
    }
    Ok(())
}

fn run_layout(path: &Path) -> Result<(), WbcError> {
    let wbc = load(path)?;

    println!("joints ({}):", wbc.joint_index_map().len());
    for (column, name) in wbc.joint_names().iter().enumerate() {
        println!("  {column:>3}  {name}");
    }

    println!("\ntask frames:");
    if wbc.task_frame_names().is_empty() {
        println!("  (none)");
    }
    for name in wbc.task_frame_names() {
        println!("  {name}");
    }

    for (idx, level) in wbc.levels().iter().enumerate() {
        println!(
            "\nlevel {idx} (priority {}), {} x {}:",
            level.priority(),
            level.rows(),
            wbc.joint_index_map().len()
        );
        let mut row = 0;
        for constraint in level.constraints() {
            let dim = constraint.output_dim();
            let kind = match constraint.config().frame_names() {
                Some([root, tip, ref_frame]) => {
                    format!("cartesian {root} -> {tip} (ref {ref_frame})")
                }
                None => "joint".to_string(),
            };
            println!(
                "  rows {row:>3}..{:<3} {:<24} {kind}, timeout {}s",
                row + dim,
                constraint.name(),
                constraint.config().timeout
            );
            row += dim;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let result = match &cli.command {
        Commands::Validate { config } => run_validate(config),
        Commands::Layout { config } => run_layout(config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
