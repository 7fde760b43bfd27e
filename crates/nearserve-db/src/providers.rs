//! Database operations for the `providers` table.

use chrono::{DateTime, Utc};
use nearserve_core::{Category, CoreError, NewProvider, Provider, RatingAggregate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{parse_id, DbError};

/// A row from the `providers` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProviderRow {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub category: String,
    pub bio: Option<String>,
    pub hourly_rate: Decimal,
    pub latitude: f64,
    pub longitude: f64,
    pub rating: Decimal,
    /// The schema defines this as `INTEGER NOT NULL DEFAULT 0 CHECK (>= 0)`.
    pub review_count: i32,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProviderRow> for Provider {
    type Error = CoreError;

    fn try_from(row: ProviderRow) -> Result<Self, Self::Error> {
        Ok(Provider {
            id: row.id.to_string(),
            category: row.category.parse::<Category>()?,
            name: row.name,
            latitude: row.latitude,
            longitude: row.longitude,
            hourly_rate: row.hourly_rate.to_f64().unwrap_or_default(),
            rating: row.rating.to_f64().unwrap_or_default(),
            review_count: u32::try_from(row.review_count).unwrap_or_default(),
            available: row.available,
            phone: row.phone,
            bio: row.bio,
            created_at: row.created_at,
        })
    }
}

pub(crate) const PROVIDER_COLUMNS: &str = "id, name, phone, category, bio, hourly_rate, \
     latitude, longitude, rating, review_count, available, created_at, updated_at";

pub(crate) fn rows_to_providers(rows: Vec<ProviderRow>) -> Result<Vec<Provider>, DbError> {
    rows.into_iter()
        .map(|row| Provider::try_from(row).map_err(DbError::from))
        .collect()
}

/// List providers, optionally restricted to one category.
///
/// Results are ordered by `rating DESC`, then oldest first.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row carries an unknown category.
pub async fn list_providers(
    pool: &PgPool,
    category: Option<Category>,
) -> Result<Vec<Provider>, DbError> {
    let rows = if let Some(category) = category {
        sqlx::query_as::<_, ProviderRow>(&format!(
            "SELECT {PROVIDER_COLUMNS} FROM providers \
             WHERE category = $1 \
             ORDER BY rating DESC, created_at ASC"
        ))
        .bind(category.as_str())
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, ProviderRow>(&format!(
            "SELECT {PROVIDER_COLUMNS} FROM providers \
             ORDER BY rating DESC, created_at ASC"
        ))
        .fetch_all(pool)
        .await?
    };

    rows_to_providers(rows)
}

/// Fetch a single provider by id. Returns `None` if it does not exist.
///
/// # Errors
///
/// Returns [`DbError::Core`] for a malformed id, or [`DbError::Sqlx`] if the
/// query fails.
pub async fn get_provider(pool: &PgPool, provider_id: &str) -> Result<Option<Provider>, DbError> {
    let id = parse_id("provider", provider_id)?;

    let row = sqlx::query_as::<_, ProviderRow>(&format!(
        "SELECT {PROVIDER_COLUMNS} FROM providers WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(Provider::try_from)
        .transpose()
        .map_err(DbError::from)
}

/// Register a provider. New providers start unrated and available.
///
/// # Errors
///
/// Returns [`DbError::Core`] if `provider` fails validation, or
/// [`DbError::Sqlx`] if the insert fails.
pub async fn insert_provider(pool: &PgPool, provider: &NewProvider) -> Result<Provider, DbError> {
    insert_provider_with_rating(pool, provider, 0.0, 0).await
}

pub(crate) async fn insert_provider_with_rating<'e, E>(
    executor: E,
    provider: &NewProvider,
    rating: f64,
    review_count: u32,
) -> Result<Provider, DbError>
where
    E: sqlx::PgExecutor<'e>,
{
    provider.validate()?;
    let review_count = i32::try_from(review_count)
        .map_err(|_| CoreError::InvalidInput("review count out of range".to_string()))?;

    // hourly_rate and rating are bound as float8 and coerced to NUMERIC by
    // the database on assignment.
    let row = sqlx::query_as::<_, ProviderRow>(&format!(
        "INSERT INTO providers \
             (name, phone, category, bio, hourly_rate, latitude, longitude, rating, review_count) \
         VALUES ($1, $2, $3, $4, $5::float8, $6, $7, $8::float8, $9) \
         RETURNING {PROVIDER_COLUMNS}"
    ))
    .bind(provider.name.trim())
    .bind(provider.phone.trim())
    .bind(provider.category.as_str())
    .bind(provider.bio.as_deref())
    .bind(provider.hourly_rate)
    .bind(provider.latitude)
    .bind(provider.longitude)
    .bind(rating)
    .bind(review_count)
    .fetch_one(executor)
    .await?;

    Ok(Provider::try_from(row)?)
}

/// Overwrite a provider's rating fields with a freshly computed aggregate.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no provider has this id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_provider_rating(
    pool: &PgPool,
    provider_id: &str,
    aggregate: RatingAggregate,
) -> Result<(), DbError> {
    let id = parse_id("provider", provider_id)?;
    write_provider_rating(pool, id, aggregate).await
}

pub(crate) async fn write_provider_rating<'e, E>(
    executor: E,
    provider_id: Uuid,
    aggregate: RatingAggregate,
) -> Result<(), DbError>
where
    E: sqlx::PgExecutor<'e>,
{
    let review_count = i32::try_from(aggregate.count)
        .map_err(|_| CoreError::InvalidInput("review count out of range".to_string()))?;

    let result = sqlx::query(
        "UPDATE providers \
         SET rating = $1::float8, review_count = $2, updated_at = NOW() \
         WHERE id = $3",
    )
    .bind(aggregate.average)
    .bind(review_count)
    .bind(provider_id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Total number of providers.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn count_providers(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM providers")
        .fetch_one(pool)
        .await
}
