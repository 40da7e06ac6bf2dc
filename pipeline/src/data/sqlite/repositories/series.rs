//! Series repository
//!
//! The series table is both the identifier universe the Fetcher paginates
//! over and the owner of observations (deleted series cascade their rows).
//! The `delta_id` column carries the exclusive source-to-delta link; its
//! `ON DELETE SET NULL` action unlinks a source automatically when its
//! delta series is deleted for a rebuild.

use sqlx::{Executor, Sqlite, SqlitePool};

use crate::data::error::StoreError;
use crate::data::types::{NewSeries, SeriesRow};

type SeriesTuple = (i64, String, String, String, bool, bool, bool, Option<i64>);

fn from_tuple(t: SeriesTuple) -> SeriesRow {
    let (id, source_id, title, source, is_primary, is_delta, is_adjusted, delta_id) = t;
    SeriesRow {
        id,
        source_id,
        title,
        source,
        is_primary,
        is_delta,
        is_adjusted,
        delta_id,
    }
}

const SELECT_COLUMNS: &str =
    "id, source_id, title, source, is_primary, is_delta, is_adjusted, delta_id";

/// Create a new series. Takes a generic executor so the Delta Engine can
/// create rows inside its rebuild transaction.
pub async fn create_series<'e, E>(executor: E, new: &NewSeries) -> Result<SeriesRow, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO series (source_id, title, source, is_primary, is_delta, is_adjusted)
         VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&new.source_id)
    .bind(&new.title)
    .bind(&new.source)
    .bind(new.is_primary)
    .bind(new.is_delta)
    .bind(new.is_adjusted)
    .fetch_one(executor)
    .await?;

    Ok(SeriesRow {
        id,
        source_id: new.source_id.clone(),
        title: new.title.clone(),
        source: new.source.clone(),
        is_primary: new.is_primary,
        is_delta: new.is_delta,
        is_adjusted: new.is_adjusted,
        delta_id: None,
    })
}

/// Get a series by row id
pub async fn get_series(pool: &SqlitePool, id: i64) -> Result<Option<SeriesRow>, StoreError> {
    let row = sqlx::query_as::<_, SeriesTuple>(&format!(
        "SELECT {SELECT_COLUMNS} FROM series WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(from_tuple))
}

/// Get a series by its external identifier
pub async fn get_by_source_id(
    pool: &SqlitePool,
    source_id: &str,
) -> Result<Option<SeriesRow>, StoreError> {
    let row = sqlx::query_as::<_, SeriesTuple>(&format!(
        "SELECT {SELECT_COLUMNS} FROM series WHERE source_id = ?"
    ))
    .bind(source_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(from_tuple))
}

/// List series with pagination, ordered by external identifier
pub async fn list_series(
    pool: &SqlitePool,
    page: u32,
    limit: u32,
) -> Result<(Vec<SeriesRow>, u64), StoreError> {
    let offset = (page.saturating_sub(1)) * limit;

    let rows = sqlx::query_as::<_, SeriesTuple>(&format!(
        "SELECT {SELECT_COLUMNS} FROM series ORDER BY source_id LIMIT ? OFFSET ?"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM series")
        .fetch_one(pool)
        .await?;

    Ok((rows.into_iter().map(from_tuple).collect(), total.0 as u64))
}

/// List external identifiers of primary (directly fetched) series, paginated
/// and ordered. This is the identifier universe the Fetcher partitions into
/// batches.
pub async fn list_primary_source_ids(
    pool: &SqlitePool,
    page: u32,
    limit: u32,
) -> Result<Vec<String>, StoreError> {
    let offset = (page.saturating_sub(1)) * limit;

    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT source_id FROM series WHERE is_primary = 1 ORDER BY source_id LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// List row ids of all non-delta series (the universe for `deltas --all`)
pub async fn list_non_delta_ids(pool: &SqlitePool) -> Result<Vec<i64>, StoreError> {
    let ids: Vec<i64> =
        sqlx::query_scalar("SELECT id FROM series WHERE is_delta = 0 ORDER BY source_id")
            .fetch_all(pool)
            .await?;

    Ok(ids)
}

/// Set the forward link from a source series to its delta series
pub async fn set_delta_link<'e, E>(
    executor: E,
    source_id: i64,
    delta_id: i64,
) -> Result<(), StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE series SET delta_id = ? WHERE id = ?")
        .bind(delta_id)
        .bind(source_id)
        .execute(executor)
        .await?;

    Ok(())
}

/// Get the source series that links to the given delta series, if any
pub async fn get_original_of(
    pool: &SqlitePool,
    delta_id: i64,
) -> Result<Option<SeriesRow>, StoreError> {
    let row = sqlx::query_as::<_, SeriesTuple>(&format!(
        "SELECT {SELECT_COLUMNS} FROM series WHERE delta_id = ?"
    ))
    .bind(delta_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(from_tuple))
}

/// Delete a series. Its observations cascade; any source linking to it via
/// `delta_id` is unlinked by the foreign key action.
pub async fn delete_series<'e, E>(executor: E, id: i64) -> Result<bool, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM series WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}
