//! `nearserve db` handlers: connectivity, migrations and seeding.

use std::path::PathBuf;

use clap::Subcommand;
use nearserve_core::{load_seed_file, sample_providers, AppConfig};

/// Sub-commands available under `db`.
#[derive(Debug, Subcommand)]
pub enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Populate an empty providers table
    Seed {
        /// Seed file to load instead of `NEARSERVE_SEED_PATH`
        #[arg(long, conflicts_with = "sample")]
        file: Option<PathBuf>,
        /// Generate the built-in demo providers around the default origin
        #[arg(long)]
        sample: bool,
    },
}

pub(crate) async fn run(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    command: DbCommands,
) -> anyhow::Result<()> {
    match command {
        DbCommands::Ping => {
            nearserve_db::health_check(pool).await?;
            println!("database ok");
        }
        DbCommands::Migrate => {
            let applied = nearserve_db::run_migrations(pool).await?;
            println!("applied {applied} migration(s)");
        }
        DbCommands::Seed { file, sample } => run_seed(pool, config, file, sample).await?,
    }
    Ok(())
}

/// Seed providers from a YAML file or the built-in sample set.
///
/// # Errors
///
/// Returns an error if the seed file cannot be read or validated, or any
/// insert fails.
async fn run_seed(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    file: Option<PathBuf>,
    sample: bool,
) -> anyhow::Result<()> {
    let providers = if sample {
        sample_providers(config.default_origin)
    } else {
        let path = file.unwrap_or_else(|| config.seed_path.clone());
        tracing::info!(path = %path.display(), "loading seed file");
        load_seed_file(&path)?.providers
    };

    let inserted = nearserve_db::seed_providers(pool, &providers).await?;
    if inserted == 0 {
        println!("providers table already populated; nothing seeded");
    } else {
        println!("seeded {inserted} provider(s)");
    }
    Ok(())
}
