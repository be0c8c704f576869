//! CLI command definitions for timely
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod import;

use clap::{Parser, Subcommand};
use import::ImportArgs;

/// Timely student task tracker server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Port for the HTTP server (overrides config)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (default if no subcommand given)
    Serve,

    /// Import course assignments for a user from a JSON file
    Import(ImportArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_serve_with_stderr_logging() {
        let cli = Cli::parse_from(["timely"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.log, "2");
        assert!(!cli.verbose);
    }

    #[test]
    fn parses_import_subcommand() {
        let cli = Cli::parse_from([
            "timely",
            "--database",
            "t.db",
            "import",
            "--user",
            "jdoe",
            "assignments.json",
        ]);
        assert_eq!(cli.database.as_deref(), Some("t.db"));
        match cli.command {
            Some(Command::Import(args)) => {
                assert_eq!(args.user, "jdoe");
                assert_eq!(args.file.to_str(), Some("assignments.json"));
            }
            other => panic!("expected import, got {:?}", other),
        }
    }
}
