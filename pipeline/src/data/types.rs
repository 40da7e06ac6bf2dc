//! Row types shared between the data and domain layers

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// A named, sourced time series in the canonical store.
///
/// `delta_id` is the exclusive forward link from a source series to its
/// derived percent-change series; the reverse direction (delta to original)
/// is the inverse lookup on the same column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesRow {
    pub id: i64,
    /// Stable external identifier from the statistics API (unique)
    pub source_id: String,
    pub title: String,
    /// Origin dataset tag (e.g. national vs. per-state survey)
    pub source: String,
    /// Directly fetched from the API, as opposed to derived
    pub is_primary: bool,
    /// Derived percent-change series
    pub is_delta: bool,
    /// Seasonally adjusted
    pub is_adjusted: bool,
    pub delta_id: Option<i64>,
}

/// Fields required to create a series row
#[derive(Debug, Clone)]
pub struct NewSeries {
    pub source_id: String,
    pub title: String,
    pub source: String,
    pub is_primary: bool,
    pub is_delta: bool,
    pub is_adjusted: bool,
}

/// One data point of a series: a first-of-month period and a value.
///
/// Observations are insert-only: re-ingestion never mutates an existing
/// row, and rows are removed only when their owning series is deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationRow {
    pub id: i64,
    pub series_id: i64,
    pub period: NaiveDate,
    pub value: f64,
    pub footnote: Option<String>,
}

/// Audit record for one orchestrated ingestion run.
///
/// `finished` is NULL while the run is in progress; a row that never gets
/// its `finished` written belongs to a run that failed or was killed.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionRow {
    pub id: i64,
    pub title: String,
    /// Pipeline version that performed the run
    pub version: String,
    pub start_year: i32,
    pub end_year: i32,
    pub duration_secs: Option<f64>,
    pub num_series: i64,
    pub num_added: i64,
    pub num_fetched: i64,
    pub started: DateTime<Utc>,
    pub finished: Option<DateTime<Utc>>,
}
