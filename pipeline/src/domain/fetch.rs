//! Fetcher: batched, rate-limited fetch into staged files
//!
//! Partitions the identifier universe into bounded batches, calls the
//! statistics API once per batch, and writes each returned series' raw
//! observations to its own JSON file under a dated staging directory.
//! A delay is slept after every API call, including the last one, to
//! respect the external service's quota; failed calls count against the
//! quota too, so the sleep is not skipped on the error path.
//!
//! A transport or non-success API status aborts the run; the error names
//! the failing batch and its identifiers. Retries are a caller concern.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use sqlx::SqlitePool;
use thiserror::Error;

use crate::core::constants::{
    API_BATCH_LIMIT, SERIES_PAGE_SIZE, STAGING_DIR_PREFIX,
};
use crate::data::StoreError;
use crate::data::sqlite::repositories::series;
use crate::domain::api::{ApiError, RawSeries, SeriesApi};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("batch size {0} out of range (must be 1..={limit})", limit = API_BATCH_LIMIT)]
    InvalidBatchSize(usize),

    #[error("batch {index} failed for series [{}]: {source}", .series_ids.join(", "))]
    Batch {
        index: usize,
        series_ids: Vec<String>,
        #[source]
        source: ApiError,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("staging error: {0}")]
    Io(#[from] std::io::Error),
}

/// Explicit fetch configuration, defaults supplied by the composition root
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// First year of the requested range (inclusive)
    pub start_year: i32,
    /// Last year of the requested range (inclusive)
    pub end_year: i32,
    /// Identifiers requested per API call; capped by the API
    pub batch_size: usize,
    /// Delay slept after every API call
    pub rate_limit: Duration,
    /// Remove the staging directory tree at the end of the run
    pub cleanup: bool,
}

/// Result of a completed fetch stage
#[derive(Debug)]
pub struct FetchOutcome {
    /// Directory holding one raw JSON file per fetched series
    pub staging_dir: PathBuf,
    /// Size of the identifier universe
    pub num_series: u64,
    /// Number of API calls issued
    pub num_batches: u32,
    /// Wall-clock time of the fetch stage
    pub duration: Duration,
}

pub struct Fetcher<'a> {
    pool: &'a SqlitePool,
    api: &'a dyn SeriesApi,
    staging_root: PathBuf,
    options: FetchOptions,
}

impl<'a> Fetcher<'a> {
    pub fn new(
        pool: &'a SqlitePool,
        api: &'a dyn SeriesApi,
        staging_root: &Path,
        options: FetchOptions,
    ) -> Self {
        Self {
            pool,
            api,
            staging_root: staging_root.to_path_buf(),
            options,
        }
    }

    /// The dated staging directory for runs started today. Same-day runs
    /// share the directory and overwrite each other's per-series files
    /// rather than colliding destructively.
    fn staging_dir(&self) -> PathBuf {
        let date = chrono::Local::now().format("%Y-%m-%d");
        self.staging_root
            .join(format!("{STAGING_DIR_PREFIX}-{date}"))
    }

    /// Read the full identifier universe from the canonical store
    async fn identifier_universe(&self) -> Result<Vec<String>, FetchError> {
        let mut ids = Vec::new();
        let mut page = 1;
        loop {
            let chunk = series::list_primary_source_ids(self.pool, page, SERIES_PAGE_SIZE).await?;
            let done = (chunk.len() as u32) < SERIES_PAGE_SIZE;
            ids.extend(chunk);
            if done {
                break;
            }
            page += 1;
        }
        Ok(ids)
    }

    /// Fetch all batches, staging each returned series as one JSON file.
    pub async fn fetch_all(&self) -> Result<FetchOutcome, FetchError> {
        if self.options.batch_size == 0 || self.options.batch_size > API_BATCH_LIMIT {
            return Err(FetchError::InvalidBatchSize(self.options.batch_size));
        }

        let start = Instant::now();
        let staging_dir = self.staging_dir();
        tokio::fs::create_dir_all(&staging_dir).await?;

        let ids = self.identifier_universe().await?;
        let mut num_batches = 0u32;

        for (index, batch) in ids.chunks(self.options.batch_size).enumerate() {
            tracing::info!(
                batch = index,
                count = batch.len(),
                "Fetching batch from statistics API"
            );

            let result = self
                .api
                .fetch_series(batch, self.options.start_year, self.options.end_year)
                .await;
            num_batches += 1;

            // Quota applies to failed calls too
            tokio::time::sleep(self.options.rate_limit).await;

            let fetched = result.map_err(|source| FetchError::Batch {
                index,
                series_ids: batch.to_vec(),
                source,
            })?;

            self.stage_batch(&staging_dir, &fetched).await?;
        }

        let outcome = FetchOutcome {
            staging_dir,
            num_series: ids.len() as u64,
            num_batches,
            duration: start.elapsed(),
        };
        tracing::info!(
            num_series = outcome.num_series,
            num_batches = outcome.num_batches,
            duration_secs = outcome.duration.as_secs_f64(),
            "Fetch stage complete"
        );
        Ok(outcome)
    }

    async fn stage_batch(
        &self,
        staging_dir: &Path,
        fetched: &[RawSeries],
    ) -> Result<(), FetchError> {
        for raw in fetched {
            let path = staging_dir.join(format!("{}.json", raw.series_id));
            let body = serde_json::to_vec_pretty(raw)
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            tokio::fs::write(&path, body).await?;
            tracing::debug!(path = %path.display(), rows = raw.data.len(), "Staged series");
        }
        Ok(())
    }
}
