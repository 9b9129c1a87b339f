//! CLI argument parsing and command dispatch.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::repository::ConflictPolicy;

#[derive(Parser)]
#[command(name = "wbmigrate")]
#[command(about = "Weather bot SQLite-to-PostgreSQL migration tool")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Export the SQLite database to a JSON snapshot
    Export {
        /// Path to the source SQLite database
        source: PathBuf,
        /// Where to write the snapshot
        #[arg(short, long, default_value = "snapshot.json")]
        out: PathBuf,
    },

    /// Import a JSON snapshot into PostgreSQL
    Import {
        /// Path to a snapshot produced by `export`
        snapshot: PathBuf,
        /// PostgreSQL connection URL
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },

    /// Migrate directly from SQLite to PostgreSQL in one transaction
    Migrate {
        /// Path to the source SQLite database
        source: PathBuf,
        /// PostgreSQL connection URL
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
        /// What to do when a row already exists in the destination
        #[arg(long, value_enum, default_value = "overwrite")]
        on_conflict: ConflictPolicy,
    },

    /// Summarize active users in the destination database
    Verify {
        /// PostgreSQL connection URL
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Export { source, out } => commands::cmd_export(&source, &out).await,
        Commands::Import {
            snapshot,
            database_url,
        } => commands::cmd_import(&snapshot, &database_url).await,
        Commands::Migrate {
            source,
            database_url,
            on_conflict,
        } => commands::cmd_migrate(&source, &database_url, on_conflict).await,
        Commands::Verify { database_url } => commands::cmd_verify(&database_url).await,
    }
}
