//! # Drop Limiter
//!
//! Fired by a scheduler (cron, systemd timer). Each invocation simulates the
//! time since the previous one and grants the resulting spawns.
//!
//! ```bash
//! # every five minutes
//! */5 * * * * /opt/game/droplimiter --config /opt/game/droplimiter.toml
//!
//! # see what would happen, with every dice throw
//! droplimiter --dry-run -v
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use droplimiter::{logging, run_once, AppResult, Config, RunOptions, RunOutcome, DEFAULT_CONFIG};

/// Scheduled spawn-rate control for in-game items.
#[derive(Parser, Debug)]
#[command(name = "droplimiter", version, about)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Fixed trial seed, overrides the configuration
    #[arg(long)]
    seed: Option<u64>,

    /// Simulate without writing the ledger, store or report
    #[arg(long)]
    dry_run: bool,

    /// More console output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn run(args: &Args) -> AppResult<()> {
    let config = Config::load(&args.config)?;
    logging::init(args.verbose, config.log_path().as_deref())?;

    let options = RunOptions {
        seed: args.seed,
        dry_run: args.dry_run,
        now: chrono::Utc::now().timestamp(),
    };

    match run_once(&config, &options)? {
        RunOutcome::Baseline { created_at } => {
            println!("No previous run found. Baseline written at {created_at}; drops begin with the next run.");
        }
        RunOutcome::Completed { spawns, dry_run, .. } => {
            for spawn in &spawns {
                println!("{}: spawning {} more.", spawn.description, spawn.count);
            }
            if dry_run {
                println!("Dry run: nothing was written.");
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("droplimiter: {e}");
            ExitCode::FAILURE
        }
    }
}
