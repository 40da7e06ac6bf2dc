//! Delta engine: derived percent-change series
//!
//! For a source series, builds a linked series whose value at each period
//! is the percent change from the previous period's value. The change is
//! divided by the *current* value, `(cur - prev) / cur * 100`, not the
//! previous one. That denominator is a long-standing convention of this
//! pipeline's data; downstream consumers rely on it, so it is preserved
//! deliberately even though it differs from the textbook definition.
//!
//! The first period has no predecessor, so a delta series always has
//! exactly one observation fewer than its source. A zero value cannot be
//! a denominator; the computation aborts with `DeltaError::ZeroValue`
//! instead of persisting non-finite changes.

use std::fmt;

use chrono::NaiveDate;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::core::constants::{DELTA_ID_SUFFIX, DELTA_SOURCE_SUFFIX, DELTA_TITLE_SUFFIX};
use crate::data::types::{NewSeries, SeriesRow};
use crate::data::StoreError;
use crate::data::sqlite::repositories::{observation, series};

#[derive(Error, Debug)]
pub enum DeltaError {
    #[error("series not found: {0}")]
    NotFound(String),

    #[error("series {0} is itself a delta series; deltas of deltas are not allowed")]
    SourceIsDelta(String),

    #[error(
        "series {0} already has a delta series; updating it in place is not implemented \
         (rerun with delete to rebuild)"
    )]
    Unsupported(String),

    #[error("series {series} has a zero value at {period}; percent change from it is undefined")]
    ZeroValue { series: String, period: NaiveDate },

    #[error("specify series identifiers or all")]
    Usage,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Reference to a series: external identifier or numeric row id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesKey {
    SourceId(String),
    RowId(i64),
}

impl SeriesKey {
    /// Interpret CLI input: all-digit strings are row ids, anything else is
    /// an external identifier.
    pub fn parse(input: &str) -> Self {
        match input.parse::<i64>() {
            Ok(id) => SeriesKey::RowId(id),
            Err(_) => SeriesKey::SourceId(input.to_string()),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesKey::SourceId(s) => write!(f, "{s}"),
            SeriesKey::RowId(id) => write!(f, "#{id}"),
        }
    }
}

pub struct DeltaEngine<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DeltaEngine<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    async fn resolve(&self, key: &SeriesKey) -> Result<SeriesRow, DeltaError> {
        let found = match key {
            SeriesKey::SourceId(source_id) => {
                series::get_by_source_id(self.pool, source_id).await?
            }
            SeriesKey::RowId(id) => series::get_series(self.pool, *id).await?,
        };
        found.ok_or_else(|| DeltaError::NotFound(key.to_string()))
    }

    /// Compute (or rebuild, when `delete` is set) the delta series for one
    /// source series, returning the persisted delta series row.
    pub async fn compute_delta(
        &self,
        key: &SeriesKey,
        delete: bool,
    ) -> Result<SeriesRow, DeltaError> {
        let source = self.resolve(key).await?;

        if source.is_delta {
            return Err(DeltaError::SourceIsDelta(source.source_id));
        }
        if source.delta_id.is_some() && !delete {
            return Err(DeltaError::Unsupported(source.source_id));
        }

        let rows = observation::list_for_series(self.pool, source.id).await?;

        // Delete, recreate, relink, and insert under a single transaction;
        // a rebuild that fails partway leaves the previous delta series and
        // its link untouched.
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        if let Some(existing) = source.delta_id {
            tracing::info!(
                source_id = %source.source_id,
                delta_row = existing,
                "Deleting existing delta series for rebuild"
            );
            // Observations cascade; the source's link is nulled by the FK
            series::delete_series(&mut *tx, existing).await?;
        }

        let delta = series::create_series(
            &mut *tx,
            &NewSeries {
                source_id: format!("{}{DELTA_ID_SUFFIX}", source.source_id),
                title: format!("{}{DELTA_TITLE_SUFFIX}", source.title),
                source: format!("{}{DELTA_SOURCE_SUFFIX}", source.source),
                is_primary: false,
                is_delta: true,
                is_adjusted: source.is_adjusted,
            },
        )
        .await?;
        series::set_delta_link(&mut *tx, source.id, delta.id).await?;

        let mut previous: Option<f64> = None;
        let mut written = 0u64;
        for row in &rows {
            let Some(prev) = previous.replace(row.value) else {
                continue;
            };
            if row.value == 0.0 {
                return Err(DeltaError::ZeroValue {
                    series: source.source_id.clone(),
                    period: row.period,
                });
            }
            let change = ((row.value - prev) / row.value) * 100.0;
            observation::insert_observation(&mut *tx, delta.id, row.period, change, None).await?;
            written += 1;
        }
        tx.commit().await.map_err(StoreError::from)?;

        tracing::info!(
            source_id = %source.source_id,
            delta_id = %delta.source_id,
            observations = written,
            "Delta series computed"
        );
        Ok(delta)
    }

    /// Compute deltas for an explicit list of series, or for every
    /// non-delta series in the store when `all` is set. With neither, this
    /// is a usage error reported before any store access.
    pub async fn deltas(
        &self,
        keys: &[SeriesKey],
        all: bool,
        delete: bool,
    ) -> Result<Vec<SeriesRow>, DeltaError> {
        if keys.is_empty() && !all {
            return Err(DeltaError::Usage);
        }

        let keys: Vec<SeriesKey> = if keys.is_empty() {
            series::list_non_delta_ids(self.pool)
                .await?
                .into_iter()
                .map(SeriesKey::RowId)
                .collect()
        } else {
            keys.to_vec()
        };

        let mut results = Vec::with_capacity(keys.len());
        for key in &keys {
            results.push(self.compute_delta(key, delete).await?);
        }
        Ok(results)
    }
}
