//! `nearserve providers` handlers.
//!
//! Ranking, sorting and search run in-process over the providers fetched from
//! the store; the origin comes from `--lat/--lng` or the configured fallback.

use clap::Subcommand;
use nearserve_core::{
    nearby_providers, resolve_origin, search_providers, sort_providers, summarize_providers,
    AppConfig, Category, CategoryFilter, Coordinates, FixedLocation, NearbyQuery, NewProvider,
    RankedProvider, SortKey,
};

/// Width of the NAME column in provider tables.
pub(crate) const NAME_WIDTH: usize = 28;

/// Sub-commands available under `providers`.
#[derive(Debug, Subcommand)]
pub enum ProviderCommands {
    /// List providers within a radius, nearest first
    Nearby {
        /// Your latitude; falls back to NEARSERVE_DEFAULT_LAT
        #[arg(long, allow_hyphen_values = true, requires = "lng")]
        lat: Option<f64>,
        /// Your longitude; falls back to NEARSERVE_DEFAULT_LNG
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lng: Option<f64>,
        /// Search radius in kilometres (defaults to NEARSERVE_DEFAULT_RADIUS_KM)
        #[arg(long)]
        radius_km: Option<f64>,
        /// plumber, electrician or all
        #[arg(long, default_value = "all")]
        category: CategoryFilter,
        /// Re-order results by rating, price or distance
        #[arg(long)]
        sort: Option<SortKey>,
        /// Case-insensitive match on name or category
        #[arg(long)]
        search: Option<String>,
    },
    /// List every provider, highest rated first
    List {
        /// Latitude distances are measured from; falls back to NEARSERVE_DEFAULT_LAT
        #[arg(long, allow_hyphen_values = true, requires = "lng")]
        lat: Option<f64>,
        /// Longitude distances are measured from; falls back to NEARSERVE_DEFAULT_LNG
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lng: Option<f64>,
        /// plumber, electrician or all
        #[arg(long, default_value = "all")]
        category: CategoryFilter,
        /// Re-order results by rating, price or distance
        #[arg(long)]
        sort: Option<SortKey>,
        /// Case-insensitive match on name or category
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one provider
    Show {
        /// Provider id
        id: String,
    },
    /// Register a new provider
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        /// plumber or electrician
        #[arg(long)]
        category: Category,
        /// Hourly rate
        #[arg(long)]
        rate: f64,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        #[arg(long)]
        bio: Option<String>,
    },
}

pub(crate) async fn run(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    command: ProviderCommands,
) -> anyhow::Result<()> {
    match command {
        ProviderCommands::Nearby {
            lat,
            lng,
            radius_km,
            category,
            sort,
            search,
        } => {
            let origin =
                resolve_origin(&FixedLocation::from_parts(lat, lng), config.default_origin);
            let query = NearbyQuery::new(origin)
                .with_radius(radius_km.unwrap_or(config.default_radius_km))
                .with_category(category);
            run_nearby(pool, &query, sort, search.as_deref()).await
        }
        ProviderCommands::List {
            lat,
            lng,
            category,
            sort,
            search,
        } => {
            let origin =
                resolve_origin(&FixedLocation::from_parts(lat, lng), config.default_origin);
            run_list(pool, origin, category, sort, search.as_deref()).await
        }
        ProviderCommands::Show { id } => run_show(pool, &id).await,
        ProviderCommands::Register {
            name,
            phone,
            category,
            rate,
            lat,
            lng,
            bio,
        } => {
            let provider = NewProvider {
                name,
                phone,
                category,
                bio,
                hourly_rate: rate,
                latitude: lat,
                longitude: lng,
            };
            run_register(pool, &provider).await
        }
    }
}

/// Rank stored providers around the query origin and print them.
///
/// # Errors
///
/// Returns an error if the query is invalid or the store cannot be read.
async fn run_nearby(
    pool: &sqlx::PgPool,
    query: &NearbyQuery,
    sort: Option<SortKey>,
    search: Option<&str>,
) -> anyhow::Result<()> {
    let stored = nearserve_db::list_providers(pool, query.category.category()).await?;
    let mut ranked = nearby_providers(query, &stored)?;
    if let Some(q) = search {
        ranked = search_providers(ranked, q);
    }
    if let Some(key) = sort {
        ranked = sort_providers(ranked, key);
    }

    if ranked.is_empty() {
        println!(
            "no {} providers within {} km of {}",
            query.category, query.radius_km, query.origin
        );
        return Ok(());
    }

    print_ranked(&ranked);
    let summary = summarize_providers(&ranked);
    println!();
    println!(
        "{} found ({} plumbers, {} electricians, {} available), average rating {:.1}",
        summary.total,
        summary.plumbers,
        summary.electricians,
        summary.available,
        summary.average_rating
    );
    Ok(())
}

async fn run_list(
    pool: &sqlx::PgPool,
    origin: Coordinates,
    category: CategoryFilter,
    sort: Option<SortKey>,
    search: Option<&str>,
) -> anyhow::Result<()> {
    let stored = nearserve_db::list_providers(pool, category.category()).await?;
    let mut ranked: Vec<RankedProvider> = stored
        .into_iter()
        .map(|p| RankedProvider::new(p, origin))
        .collect();
    if let Some(q) = search {
        ranked = search_providers(ranked, q);
    }
    if let Some(key) = sort {
        ranked = sort_providers(ranked, key);
    }

    if ranked.is_empty() {
        println!("no providers found; run `nearserve db seed` first");
        return Ok(());
    }

    print_ranked(&ranked);
    Ok(())
}

async fn run_show(pool: &sqlx::PgPool, id: &str) -> anyhow::Result<()> {
    let provider = nearserve_db::get_provider(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("provider '{id}' not found"))?;

    println!("{} ({})", provider.name, provider.category);
    println!("id:        {}", provider.id);
    println!("phone:     {}", provider.phone);
    println!("rate:      {:.2}/hr", provider.hourly_rate);
    println!(
        "rating:    {:.1} ({} reviews)",
        provider.rating, provider.review_count
    );
    println!("available: {}", if provider.available { "yes" } else { "no" });
    println!("location:  {}", provider.position());
    if let Some(bio) = provider.bio.as_deref() {
        println!();
        println!("{bio}");
    }
    Ok(())
}

async fn run_register(pool: &sqlx::PgPool, provider: &NewProvider) -> anyhow::Result<()> {
    let stored = nearserve_db::insert_provider(pool, provider).await?;
    tracing::info!(provider_id = %stored.id, "provider registered");
    println!("registered {} as {}", stored.name, stored.id);
    Ok(())
}

/// Provider name cut short enough to leave a gap before the next column,
/// counting the `...` marker.
pub(crate) fn name_cell(name: &str) -> String {
    crate::truncate(name, NAME_WIDTH - 4)
}

fn print_ranked(ranked: &[RankedProvider]) {
    let header = format!(
        "{:<38}{:<NAME_WIDTH$}{:<13}{:>9}{:>8}{:>10}",
        "ID", "NAME", "CATEGORY", "RATE", "RATING", "DIST KM"
    );
    println!("{header}");
    for r in ranked {
        let p = &r.provider;
        println!(
            "{:<38}{:<NAME_WIDTH$}{:<13}{:>9.2}{:>8.1}{:>10.1}",
            p.id,
            name_cell(&p.name),
            p.category.as_str(),
            p.hourly_rate,
            p.rating,
            r.display_distance_km()
        );
    }
}
