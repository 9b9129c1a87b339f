//! wbmigrate - weather bot database migration.
//!
//! Migrates the weather bot's user and notification-settings data from the
//! legacy SQLite database to PostgreSQL.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use weatherbot_migrate::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "weatherbot_migrate=debug"
    } else {
        "weatherbot_migrate=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    cli::run().await
}
