//! Timely server
//!
//! Student task tracker: recurring tasks, completion history and
//! predicted completion times over a JSON HTTP API.

use anyhow::Result;
use clap::Parser;
use std::fs::OpenOptions;
use std::sync::Arc;
use timely::api;
use timely::cli::import::{ImportArgs, read_records};
use timely::cli::{Cli, Command};
use timely::config::Config;
use timely::db::Database;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::load(path)?;
            config.apply_env();
            config
        }
        None => Config::load_or_default(),
    };

    // Override from CLI arguments
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.into();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    match cli.command {
        Some(Command::Import(args)) => run_import(&config, args),
        Some(Command::Serve) | None => run_server(config).await,
    }
}

fn open_database(config: &Config) -> Result<Database> {
    config.ensure_db_dir()?;
    let db = Database::open(&config.server.db_path)?
        .with_open_ended_horizon(config.schedule.open_ended_horizon_days);
    info!("Database opened at {}", config.server.db_path.display());
    Ok(db)
}

async fn run_server(config: Config) -> Result<()> {
    let db = Arc::new(open_database(&config)?);
    let (shutdown_tx, _addr) = api::start_server(db, &config).await?;

    tokio::signal::ctrl_c().await?;
    info!("Received interrupt, stopping");
    let _ = shutdown_tx.send(());
    Ok(())
}

fn run_import(config: &Config, args: ImportArgs) -> Result<()> {
    let records = read_records(&args.file)?;
    let db = open_database(config)?;
    db.ensure_user(&args.user)?;
    let summary = db.import_records(&args.user, &records)?;
    println!(
        "Imported {} records for {}: {} created, {} updated",
        records.len(),
        args.user,
        summary.created,
        summary.updated
    );
    Ok(())
}
