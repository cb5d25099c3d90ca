//! Tether command-line tools.
//!
//! Provides the `tether` binary for replaying constraint scenarios written
//! as JSON documents (see `tether_core::scenario`). `run` prints the report
//! as JSON on stdout; `check` only validates the setup section.
//!
//! Environment overrides, applied on top of the scenario's own config:
//! - `TETHER_SHIFTING`: `true` / `false`
//! - `TETHER_DEFAULT_MAX`: non-negative integer

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use tether_core::{Scenario, ScenarioError};

/// Ordered slider constraint tools.
#[derive(Parser)]
#[command(name = "tether", about = "Ordered slider constraint tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario and print the report.
    Run {
        /// Path to the scenario JSON file.
        #[arg(short, long)]
        scenario: PathBuf,

        /// Print the human-readable report instead of JSON.
        #[arg(long)]
        text: bool,
    },
    /// Validate a scenario's entities and constraints without running steps.
    Check {
        /// Path to the scenario JSON file.
        #[arg(short, long)]
        scenario: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Run { scenario, text } => run_scenario(&scenario, text),
        Commands::Check { scenario } => check_scenario(&scenario),
    };
    process::exit(exit_code);
}

/// Execute the run subcommand.
///
/// Returns exit code: 0 = every step succeeded, 1 = some step failed,
/// 2 = invalid scenario, 3 = I/O error.
fn run_scenario(path: &Path, text: bool) -> i32 {
    let scenario = match load(path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let report = match scenario.run() {
        Ok(report) => report,
        Err(e) => return report_error(&e),
    };

    if text {
        println!("{}", report);
    } else {
        let json = serde_json::to_string_pretty(&report).unwrap_or_else(|e| {
            format!("{{\"error\": \"failed to serialize report: {}\"}}", e)
        });
        println!("{}", json);
    }

    if report.has_failures() {
        1
    } else {
        0
    }
}

/// Execute the check subcommand. Exit codes match `run`.
fn check_scenario(path: &Path) -> i32 {
    let scenario = match load(path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    match scenario.build() {
        Ok(manager) => {
            println!(
                "ok: {} entities, {} constraints",
                manager.len(),
                manager.graph().constraint_count()
            );
            0
        }
        Err(e) => report_error(&e),
    }
}

/// Reads and parses a scenario, applying environment overrides.
fn load(path: &Path) -> Result<Scenario, i32> {
    let json = fs::read_to_string(path).map_err(|e| {
        eprintln!("Error: failed to read '{}': {}", path.display(), e);
        3
    })?;
    let mut scenario = Scenario::from_json(&json).map_err(|e| report_error(&e))?;

    if let Some(shifting) = env_override("TETHER_SHIFTING")? {
        scenario.config.shifting_allowed = shifting;
    }
    if let Some(default_max) = env_override("TETHER_DEFAULT_MAX")? {
        scenario.config.default_max = default_max;
    }
    Ok(scenario)
}

/// Parses an environment variable, if set.
fn env_override<T: std::str::FromStr>(name: &str) -> Result<Option<T>, i32> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(None);
    };
    raw.trim().parse().map(Some).map_err(|_| {
        eprintln!("Error: invalid value '{}' for {}", raw, name);
        2
    })
}

fn report_error(e: &ScenarioError) -> i32 {
    eprintln!("Error: {}", e);
    2
}
