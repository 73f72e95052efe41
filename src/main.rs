use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mnemo::config::MnemoConfig;
use mnemo::engine::MemoryEngine;
use mnemo::store::stats::render_stats;
use mnemo::{db, scheduler};

#[derive(Parser)]
#[command(name = "mnemo", version, about = "Semantic query memory for assistant backends")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the background lifecycle scheduler until interrupted
    Run,
    /// Print store statistics
    Stats,
    /// Run the decay/expiry/purge sweeps once
    Sweep {
        /// Report purge candidates without deleting them
        #[arg(long)]
        dry_run: bool,
    },
    /// Show a memory unit with its audit trail
    Inspect { id: String },
    /// Confirm a cached result (confidence back to 1.0)
    Validate { id: String },
    /// Force-expire a cached result
    Invalidate { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = MnemoConfig::load()?;

    // Log to stderr so stdout stays clean for command output.
    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let conn = db::open_database(config.resolved_db_path())?;
    let mut engine = MemoryEngine::new(conn, config);

    match cli.command {
        Command::Run => {
            let worker = engine.attach_background(256);
            let engine = Arc::new(engine);
            let worker_handle = tokio::spawn(worker.run());

            tokio::select! {
                _ = scheduler::run(Arc::clone(&engine)) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutting down");
                }
            }

            drop(engine); // close the queue so the worker drains and exits
            worker_handle.await?;
        }
        Command::Stats => {
            let stats = engine.stats()?;
            print!("{}", render_stats(&stats));
        }
        Command::Sweep { dry_run } => {
            let report = engine.sweep(dry_run)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Inspect { id } => {
            let view = engine.inspect(&id)?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Command::Validate { id } => {
            if engine.validate(&id)? {
                println!("validated {id}");
            } else {
                println!("not found: {id}");
            }
        }
        Command::Invalidate { id } => {
            if engine.invalidate(&id)? {
                println!("invalidated {id}");
            } else {
                println!("not found: {id}");
            }
        }
    }

    Ok(())
}
