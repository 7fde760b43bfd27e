use nearserve_core::SeedProvider;
use sqlx::PgPool;

use crate::providers::insert_provider_with_rating;
use crate::DbError;

/// Insert seed providers, but only into an empty `providers` table.
///
/// Returns the number of providers inserted, which is zero when the table
/// already held rows. The emptiness check and all inserts run inside a
/// single transaction; if any insert fails the entire batch is rolled back.
///
/// # Errors
///
/// Returns [`DbError::Core`] if a seed entry fails validation, or
/// [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_providers(pool: &PgPool, providers: &[SeedProvider]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;

    // Blocks a concurrent seeder between the count and the inserts.
    sqlx::query("LOCK TABLE providers IN SHARE ROW EXCLUSIVE MODE")
        .execute(&mut *tx)
        .await?;

    let existing: i64 = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM providers")
        .fetch_one(&mut *tx)
        .await?;
    if existing > 0 {
        tracing::info!(existing, "providers table already populated; skipping seed");
        tx.rollback().await?;
        return Ok(0);
    }

    let mut count = 0usize;
    for seed in providers {
        insert_provider_with_rating(
            &mut *tx,
            &seed.provider,
            seed.rating.unwrap_or(0.0),
            seed.review_count.unwrap_or(0),
        )
        .await?;
        count += 1;
    }

    tx.commit().await?;

    tracing::info!(count, "seeded providers");

    Ok(count)
}
