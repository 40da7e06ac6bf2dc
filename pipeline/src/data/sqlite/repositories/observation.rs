//! Observation repository
//!
//! Observations are insert-only. The Wrangler's idempotency guarantee rests
//! on the existence check over `(series_id, period)` backed by the UNIQUE
//! constraint; a recorded value is never overwritten by re-ingestion.
//!
//! Functions take a generic executor so the Wrangler can run them inside a
//! per-series or whole-run transaction.

use chrono::NaiveDate;
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::data::error::StoreError;
use crate::data::types::ObservationRow;

const DATE_FMT: &str = "%Y-%m-%d";

/// Check whether an observation exists for a series and period
pub async fn observation_exists<'e, E>(
    executor: E,
    series_id: i64,
    period: NaiveDate,
) -> Result<bool, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM observations WHERE series_id = ? AND period = ?)",
    )
    .bind(series_id)
    .bind(period.format(DATE_FMT).to_string())
    .fetch_one(executor)
    .await?;

    Ok(exists)
}

/// Insert an observation, returning its row id
pub async fn insert_observation<'e, E>(
    executor: E,
    series_id: i64,
    period: NaiveDate,
    value: f64,
    footnote: Option<&str>,
) -> Result<i64, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO observations (series_id, period, value, footnote)
         VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(series_id)
    .bind(period.format(DATE_FMT).to_string())
    .bind(value)
    .bind(footnote)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// List a series' observations in ascending period order
pub async fn list_for_series(
    pool: &SqlitePool,
    series_id: i64,
) -> Result<Vec<ObservationRow>, StoreError> {
    let rows = sqlx::query_as::<_, (i64, i64, String, f64, Option<String>)>(
        "SELECT id, series_id, period, value, footnote FROM observations
         WHERE series_id = ? ORDER BY period ASC",
    )
    .bind(series_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(id, series_id, period, value, footnote)| {
            let period = NaiveDate::parse_from_str(&period, DATE_FMT).map_err(|e| {
                StoreError::Conflict(format!("unparseable period {period:?} in row {id}: {e}"))
            })?;
            Ok(ObservationRow {
                id,
                series_id,
                period,
                value,
                footnote,
            })
        })
        .collect()
}

/// Count observations for a series
pub async fn count_for_series(pool: &SqlitePool, series_id: i64) -> Result<i64, StoreError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM observations WHERE series_id = ?")
        .bind(series_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::test_pool;
    use crate::data::sqlite::repositories::series::create_series;
    use crate::data::types::NewSeries;

    async fn seed_series(pool: &SqlitePool, source_id: &str) -> i64 {
        create_series(
            pool,
            &NewSeries {
                source_id: source_id.to_string(),
                title: "Test".to_string(),
                source: "CPS".to_string(),
                is_primary: true,
                is_delta: false,
                is_adjusted: false,
            },
        )
        .await
        .unwrap()
        .id
    }

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_exists() {
        let pool = test_pool().await;
        let sid = seed_series(&pool, "LNS14000000").await;

        assert!(!observation_exists(&pool, sid, d(2015, 1)).await.unwrap());
        insert_observation(&pool, sid, d(2015, 1), 5.7, None).await.unwrap();
        assert!(observation_exists(&pool, sid, d(2015, 1)).await.unwrap());
        // Same period on a different series is independent
        let other = seed_series(&pool, "LNS11000000").await;
        assert!(!observation_exists(&pool, other, d(2015, 1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_period_rejected() {
        let pool = test_pool().await;
        let sid = seed_series(&pool, "LNS14000000").await;

        insert_observation(&pool, sid, d(2015, 1), 5.7, None).await.unwrap();
        let dup = insert_observation(&pool, sid, d(2015, 1), 6.0, None).await;
        assert!(matches!(dup, Err(StoreError::Database(_))));
    }

    #[tokio::test]
    async fn test_list_for_series_ascending() {
        let pool = test_pool().await;
        let sid = seed_series(&pool, "LNS14000000").await;

        // Insert out of order
        insert_observation(&pool, sid, d(2015, 3), 5.5, None).await.unwrap();
        insert_observation(&pool, sid, d(2014, 12), 5.6, Some("P")).await.unwrap();
        insert_observation(&pool, sid, d(2015, 1), 5.7, None).await.unwrap();

        let rows = list_for_series(&pool, sid).await.unwrap();
        let periods: Vec<NaiveDate> = rows.iter().map(|r| r.period).collect();
        assert_eq!(periods, vec![d(2014, 12), d(2015, 1), d(2015, 3)]);
        assert_eq!(rows[0].footnote.as_deref(), Some("P"));
    }

    #[tokio::test]
    async fn test_exists_inside_transaction() {
        let pool = test_pool().await;
        let sid = seed_series(&pool, "LNS14000000").await;

        let mut tx = pool.begin().await.unwrap();
        insert_observation(&mut *tx, sid, d(2015, 2), 5.5, None).await.unwrap();
        assert!(observation_exists(&mut *tx, sid, d(2015, 2)).await.unwrap());
        tx.rollback().await.unwrap();

        assert_eq!(count_for_series(&pool, sid).await.unwrap(), 0);
    }
}
