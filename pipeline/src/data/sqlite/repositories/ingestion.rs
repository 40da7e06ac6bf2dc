//! Ingestion audit-record repository
//!
//! One row per orchestrated run, appended at run start and written once
//! more at completion. `finished IS NULL` marks an in-progress (or killed)
//! run; a finished row is immutable and attempting to finish it again is a
//! conflict.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::data::error::StoreError;
use crate::data::types::IngestionRow;

type IngestionTuple = (
    i64,
    Option<String>,
    String,
    i32,
    i32,
    Option<f64>,
    i64,
    i64,
    i64,
    i64,
    Option<i64>,
);

const SELECT_COLUMNS: &str = "id, title, version, start_year, end_year, duration_secs, \
     num_series, num_added, num_fetched, started, finished";

fn from_tuple(t: IngestionTuple) -> IngestionRow {
    let (
        id,
        title,
        version,
        start_year,
        end_year,
        duration_secs,
        num_series,
        num_added,
        num_fetched,
        started,
        finished,
    ) = t;
    IngestionRow {
        id,
        title: title.unwrap_or_default(),
        version,
        start_year,
        end_year,
        duration_secs,
        num_series,
        num_added,
        num_fetched,
        started: DateTime::from_timestamp(started, 0).unwrap_or(DateTime::UNIX_EPOCH),
        finished: finished.map(|f| DateTime::from_timestamp(f, 0).unwrap_or(DateTime::UNIX_EPOCH)),
    }
}

/// Create an in-progress ingestion record (zero counts, NULL finished)
pub async fn create_ingestion(
    pool: &SqlitePool,
    title: &str,
    version: &str,
    start_year: i32,
    end_year: i32,
    started: DateTime<Utc>,
) -> Result<IngestionRow, StoreError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO ingestions (title, version, start_year, end_year, started)
         VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(title)
    .bind(version)
    .bind(start_year)
    .bind(end_year)
    .bind(started.timestamp())
    .fetch_one(pool)
    .await?;

    Ok(IngestionRow {
        id,
        title: title.to_string(),
        version: version.to_string(),
        start_year,
        end_year,
        duration_secs: None,
        num_series: 0,
        num_added: 0,
        num_fetched: 0,
        started: DateTime::from_timestamp(started.timestamp(), 0).unwrap_or(DateTime::UNIX_EPOCH),
        finished: None,
    })
}

/// Completion counts written onto an ingestion record
#[derive(Debug, Clone, Copy)]
pub struct IngestionCounts {
    pub num_series: i64,
    pub num_added: i64,
    pub num_fetched: i64,
}

/// Finish an in-progress ingestion record.
///
/// Fails with a conflict if the record does not exist or was already
/// finished; finished records are immutable.
pub async fn finish_ingestion(
    pool: &SqlitePool,
    id: i64,
    finished: DateTime<Utc>,
    duration_secs: f64,
    counts: IngestionCounts,
) -> Result<IngestionRow, StoreError> {
    let result = sqlx::query(
        "UPDATE ingestions
         SET finished = ?, duration_secs = ?, num_series = ?, num_added = ?, num_fetched = ?
         WHERE id = ? AND finished IS NULL",
    )
    .bind(finished.timestamp())
    .bind(duration_secs)
    .bind(counts.num_series)
    .bind(counts.num_added)
    .bind(counts.num_fetched)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::Conflict(format!(
            "ingestion {id} does not exist or is already finished"
        )));
    }

    get_ingestion(pool, id)
        .await?
        .ok_or_else(|| StoreError::Conflict(format!("ingestion {id} disappeared during finish")))
}

/// Get an ingestion record by id
pub async fn get_ingestion(pool: &SqlitePool, id: i64) -> Result<Option<IngestionRow>, StoreError> {
    let row = sqlx::query_as::<_, IngestionTuple>(&format!(
        "SELECT {SELECT_COLUMNS} FROM ingestions WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(from_tuple))
}

/// List ingestion records, most recent first
pub async fn list_ingestions(
    pool: &SqlitePool,
    limit: u32,
) -> Result<Vec<IngestionRow>, StoreError> {
    let rows = sqlx::query_as::<_, IngestionTuple>(&format!(
        "SELECT {SELECT_COLUMNS} FROM ingestions ORDER BY started DESC, id DESC LIMIT ?"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(from_tuple).collect())
}
