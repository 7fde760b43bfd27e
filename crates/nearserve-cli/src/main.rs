mod bookings;
mod db;
mod providers;
mod reviews;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::bookings::BookingCommands;
use crate::db::DbCommands;
use crate::providers::ProviderCommands;
use crate::reviews::ReviewCommands;

#[derive(Debug, Parser)]
#[command(name = "nearserve")]
#[command(about = "Find, review and book nearby plumbers and electricians")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Search and register service providers
    Providers {
        #[command(subcommand)]
        command: ProviderCommands,
    },
    /// Rate providers and read reviews
    Reviews {
        #[command(subcommand)]
        command: ReviewCommands,
    },
    /// Create and track bookings
    Bookings {
        #[command(subcommand)]
        command: BookingCommands,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("nearserve: no command given; run `nearserve --help`");
        return Ok(());
    };

    let config = nearserve_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let pool_config = nearserve_db::PoolConfig::from_app_config(&config);
    let pool = nearserve_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => db::run(&pool, &config, command).await,
        Commands::Providers { command } => providers::run(&pool, &config, command).await,
        Commands::Reviews { command } => reviews::run(&pool, command).await,
        Commands::Bookings { command } => bookings::run(&pool, &config, command).await,
    }
}

/// Format an optional value for table output, `"-"` when absent.
pub(crate) fn or_dash<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Shorten `text` to at most `max` characters, marking the cut with `...`.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}
