//! Database operations for the `reviews` table and rating aggregation.

use chrono::{DateTime, Utc};
use nearserve_core::{recompute_average_rating, CoreError, NewReview, RatingAggregate, Review};
use sqlx::PgPool;
use uuid::Uuid;

use crate::providers::write_provider_rating;
use crate::{parse_id, DbError};

/// A row from the `reviews` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewRow {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub user_id: String,
    pub user_name: String,
    /// `SMALLINT` constrained to 1..=5 by the schema.
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = CoreError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let rating = u8::try_from(row.rating).map_err(|_| {
            CoreError::InvalidInput(format!("stored rating {} is out of range", row.rating))
        })?;
        Ok(Review {
            id: row.id.to_string(),
            provider_id: row.provider_id.to_string(),
            user_id: row.user_id,
            user_name: row.user_name,
            rating,
            comment: row.comment,
            created_at: row.created_at,
        })
    }
}

const REVIEW_COLUMNS: &str = "id, provider_id, user_id, user_name, rating, comment, created_at";

fn rows_to_reviews(rows: Vec<ReviewRow>) -> Result<Vec<Review>, DbError> {
    rows.into_iter()
        .map(|row| Review::try_from(row).map_err(DbError::from))
        .collect()
}

/// Insert a single review without touching the provider's aggregate.
///
/// Most callers want [`submit_review`], which also refreshes the provider's
/// rating in the same transaction.
///
/// # Errors
///
/// Returns [`DbError::Core`] if the review fails validation,
/// [`DbError::NotFound`] if the provider does not exist, or
/// [`DbError::Sqlx`] if the insert fails.
pub async fn insert_review(
    pool: &PgPool,
    provider_id: &str,
    review: &NewReview,
) -> Result<Review, DbError> {
    review.validate()?;
    let id = parse_id("provider", provider_id)?;
    insert_review_row(pool, id, review).await
}

async fn insert_review_row<'e, E>(
    executor: E,
    provider_id: Uuid,
    review: &NewReview,
) -> Result<Review, DbError>
where
    E: sqlx::PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, ReviewRow>(&format!(
        "INSERT INTO reviews (provider_id, user_id, user_name, rating, comment) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {REVIEW_COLUMNS}"
    ))
    .bind(provider_id)
    .bind(review.user_id.trim())
    .bind(review.display_name())
    .bind(i16::from(review.rating))
    .bind(review.comment.trim())
    .fetch_one(executor)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => DbError::NotFound,
        other => DbError::Sqlx(other),
    })?;

    Ok(Review::try_from(row)?)
}

/// Reviews for one provider, newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the id is malformed or the query fails.
pub async fn list_reviews_by_provider(
    pool: &PgPool,
    provider_id: &str,
) -> Result<Vec<Review>, DbError> {
    let id = parse_id("provider", provider_id)?;

    let rows = sqlx::query_as::<_, ReviewRow>(&format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews \
         WHERE provider_id = $1 \
         ORDER BY created_at DESC, id DESC"
    ))
    .bind(id)
    .fetch_all(pool)
    .await?;

    rows_to_reviews(rows)
}

/// Reviews written by one user, newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn list_reviews_by_user(pool: &PgPool, user_id: &str) -> Result<Vec<Review>, DbError> {
    let rows = sqlx::query_as::<_, ReviewRow>(&format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews \
         WHERE user_id = $1 \
         ORDER BY created_at DESC, id DESC"
    ))
    .bind(user_id.trim())
    .fetch_all(pool)
    .await?;

    rows_to_reviews(rows)
}

/// Store a review and refresh the provider's rating from its full review set.
///
/// Runs in one transaction: the provider row is locked, the review is
/// inserted, every rating for the provider (including the new one) is read
/// back, and the recomputed average and count are written to the provider.
/// Concurrent submissions for the same provider serialize on the row lock.
///
/// # Errors
///
/// Returns [`DbError::Core`] if the review fails validation,
/// [`DbError::NotFound`] if the provider does not exist, or
/// [`DbError::Sqlx`] if any statement fails (the transaction is rolled back).
pub async fn submit_review(
    pool: &PgPool,
    provider_id: &str,
    review: &NewReview,
) -> Result<(Review, RatingAggregate), DbError> {
    review.validate()?;
    let id = parse_id("provider", provider_id)?;

    let mut tx = pool.begin().await?;

    let locked: Option<Uuid> =
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM providers WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
    if locked.is_none() {
        return Err(DbError::NotFound);
    }

    let stored = insert_review_row(&mut *tx, id, review).await?;

    let ratings: Vec<i16> =
        sqlx::query_scalar::<_, i16>("SELECT rating FROM reviews WHERE provider_id = $1")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
    let ratings = ratings
        .into_iter()
        .map(|r| {
            u8::try_from(r).map_err(|_| {
                CoreError::InvalidInput(format!("stored rating {r} is out of range"))
            })
        })
        .collect::<Result<Vec<u8>, CoreError>>()?;

    let aggregate = recompute_average_rating(&ratings)?;
    write_provider_rating(&mut *tx, id, aggregate).await?;

    tx.commit().await?;

    tracing::info!(
        provider_id = %id,
        rating = stored.rating,
        average = aggregate.average,
        count = aggregate.count,
        "review submitted"
    );

    Ok((stored, aggregate))
}
