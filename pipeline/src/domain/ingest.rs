//! Ingestion orchestrator
//!
//! Composes the Fetcher and the Wrangler into one auditable run. The audit
//! record is persisted with a NULL `finished` before any work starts, so a
//! crash mid-run leaves a discoverable in-progress row; the counts and
//! `finished` timestamp are written exactly once at completion, and the
//! returned record is fully committed and queryable.
//!
//! The two stages are sequenced here explicitly rather than through a
//! callback threaded into the Fetcher. Staging cleanup is owned by the
//! orchestrator so the tree is removed even when wrangling fails.

use std::path::{Path, PathBuf};

use sqlx::SqlitePool;
use thiserror::Error;

use crate::data::StoreError;
use crate::data::sqlite::repositories::ingestion::{self, IngestionCounts};
use crate::data::types::IngestionRow;
use crate::domain::api::SeriesApi;
use crate::domain::fetch::{FetchError, FetchOptions, Fetcher};
use crate::domain::wrangle::{CommitGranularity, WrangleError, Wrangler};

/// Pipeline version stamped on every audit record
pub const PIPELINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Wrangle(#[from] WrangleError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub struct Orchestrator<'a> {
    pool: &'a SqlitePool,
    api: &'a dyn SeriesApi,
    staging_root: PathBuf,
    options: FetchOptions,
    granularity: CommitGranularity,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        pool: &'a SqlitePool,
        api: &'a dyn SeriesApi,
        staging_root: &Path,
        options: FetchOptions,
        granularity: CommitGranularity,
    ) -> Self {
        Self {
            pool,
            api,
            staging_root: staging_root.to_path_buf(),
            options,
            granularity,
        }
    }

    /// Run one full ingestion: fetch, wrangle, audit.
    pub async fn ingest(&self, title: &str) -> Result<IngestionRow, IngestError> {
        let started = chrono::Utc::now();
        let record = ingestion::create_ingestion(
            self.pool,
            title,
            PIPELINE_VERSION,
            self.options.start_year,
            self.options.end_year,
            started,
        )
        .await?;
        tracing::info!(
            ingestion = record.id,
            title,
            start_year = self.options.start_year,
            end_year = self.options.end_year,
            "Ingestion started"
        );

        let fetcher = Fetcher::new(self.pool, self.api, &self.staging_root, self.options.clone());
        let fetched = fetcher.fetch_all().await?;

        let wrangler = Wrangler::new(self.pool, self.granularity);
        let wrangled = wrangler.wrangle(&fetched.staging_dir).await;

        if self.options.cleanup {
            // Runs whether or not wrangling succeeded; a cleanup failure is
            // logged but never masks the wrangle result.
            if let Err(e) = tokio::fs::remove_dir_all(&fetched.staging_dir).await {
                tracing::warn!(
                    path = %fetched.staging_dir.display(),
                    error = %e,
                    "Failed to remove staging directory"
                );
            } else {
                tracing::debug!(
                    path = %fetched.staging_dir.display(),
                    "Staging directory removed"
                );
            }
        }

        let wrangled = wrangled?;

        let finished = chrono::Utc::now();
        let duration_secs = (finished - started).as_seconds_f64();
        let record = ingestion::finish_ingestion(
            self.pool,
            record.id,
            finished,
            duration_secs,
            IngestionCounts {
                num_series: fetched.num_series as i64,
                num_added: wrangled.rows_added as i64,
                num_fetched: wrangled.rows_fetched as i64,
            },
        )
        .await?;

        tracing::info!(
            ingestion = record.id,
            num_series = record.num_series,
            num_added = record.num_added,
            num_fetched = record.num_fetched,
            duration_secs,
            "Ingestion finished"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::API_BATCH_LIMIT;
    use crate::data::sqlite::test_pool;
    use crate::data::sqlite::repositories::series;
    use crate::data::types::NewSeries;
    use crate::domain::api::{ApiError, RawObservation, RawSeries};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Returns two months of data per requested series
    struct StubApi;

    #[async_trait]
    impl SeriesApi for StubApi {
        async fn fetch_series(
            &self,
            ids: &[String],
            _start_year: i32,
            _end_year: i32,
        ) -> Result<Vec<RawSeries>, ApiError> {
            Ok(ids
                .iter()
                .map(|id| RawSeries {
                    series_id: id.clone(),
                    data: vec![
                        RawObservation {
                            year: "2015".to_string(),
                            period: "M01".to_string(),
                            period_name: "January".to_string(),
                            value: "100.0".to_string(),
                            footnotes: vec![],
                        },
                        RawObservation {
                            year: "2015".to_string(),
                            period: "M02".to_string(),
                            period_name: "February".to_string(),
                            value: "102.0".to_string(),
                            footnotes: vec![],
                        },
                    ],
                })
                .collect())
        }
    }

    async fn seed_universe(pool: &SqlitePool, count: usize) {
        for i in 0..count {
            series::create_series(
                pool,
                &NewSeries {
                    source_id: format!("LNS{i:08}"),
                    title: format!("Series {i}"),
                    source: "CPS".to_string(),
                    is_primary: true,
                    is_delta: false,
                    is_adjusted: false,
                },
            )
            .await
            .unwrap();
        }
    }

    fn options(cleanup: bool) -> FetchOptions {
        FetchOptions {
            start_year: 2015,
            end_year: 2015,
            batch_size: 2,
            rate_limit: Duration::ZERO,
            cleanup,
        }
    }

    #[tokio::test]
    async fn test_ingest_records_audit_row() {
        let pool = test_pool().await;
        seed_universe(&pool, 3).await;
        let staging = tempfile::tempdir().unwrap();

        let orchestrator = Orchestrator::new(
            &pool,
            &StubApi,
            staging.path(),
            options(true),
            CommitGranularity::PerSeries,
        );
        let record = orchestrator.ingest("test run").await.unwrap();

        assert_eq!(record.title, "test run");
        assert_eq!(record.version, PIPELINE_VERSION);
        assert_eq!(record.num_series, 3);
        assert_eq!(record.num_fetched, 6);
        assert_eq!(record.num_added, 6);
        assert!(record.finished.is_some());
        assert!(record.duration_secs.is_some());

        // The returned record is committed and queryable
        let stored = ingestion::get_ingestion(&pool, record.id).await.unwrap().unwrap();
        assert!(stored.finished.is_some());
        assert_eq!(stored.num_added, 6);
    }

    #[tokio::test]
    async fn test_ingest_twice_adds_nothing_new() {
        let pool = test_pool().await;
        seed_universe(&pool, 2).await;
        let staging = tempfile::tempdir().unwrap();

        let orchestrator = Orchestrator::new(
            &pool,
            &StubApi,
            staging.path(),
            options(true),
            CommitGranularity::PerSeries,
        );
        let first = orchestrator.ingest("first").await.unwrap();
        let second = orchestrator.ingest("second").await.unwrap();

        assert_eq!(first.num_added, 4);
        assert_eq!(second.num_added, 0);
        assert_eq!(second.num_fetched, 4);
    }

    #[tokio::test]
    async fn test_cleanup_removes_staging_tree() {
        let pool = test_pool().await;
        seed_universe(&pool, 2).await;
        let staging = tempfile::tempdir().unwrap();

        let orchestrator = Orchestrator::new(
            &pool,
            &StubApi,
            staging.path(),
            options(true),
            CommitGranularity::PerSeries,
        );
        orchestrator.ingest("test run").await.unwrap();

        let leftover = std::fs::read_dir(staging.path()).unwrap().count();
        assert_eq!(leftover, 0);
    }

    #[tokio::test]
    async fn test_keep_staging_when_cleanup_disabled() {
        let pool = test_pool().await;
        seed_universe(&pool, 2).await;
        let staging = tempfile::tempdir().unwrap();

        let orchestrator = Orchestrator::new(
            &pool,
            &StubApi,
            staging.path(),
            options(false),
            CommitGranularity::PerSeries,
        );
        orchestrator.ingest("test run").await.unwrap();

        let leftover = std::fs::read_dir(staging.path()).unwrap().count();
        assert_eq!(leftover, 1);
    }

    #[tokio::test]
    async fn test_cleanup_runs_even_when_wrangling_fails() {
        let pool = test_pool().await;
        seed_universe(&pool, 2).await;
        let staging = tempfile::tempdir().unwrap();

        // Stages one series the canonical store has never heard of
        struct DriftApi;

        #[async_trait]
        impl SeriesApi for DriftApi {
            async fn fetch_series(
                &self,
                ids: &[String],
                start_year: i32,
                end_year: i32,
            ) -> Result<Vec<RawSeries>, ApiError> {
                let mut series = StubApi.fetch_series(ids, start_year, end_year).await?;
                let mut stray = series[0].clone();
                stray.series_id = "LNS99999999".to_string();
                series.push(stray);
                Ok(series)
            }
        }

        let orchestrator = Orchestrator::new(
            &pool,
            &DriftApi,
            staging.path(),
            options(true),
            CommitGranularity::PerSeries,
        );

        let err = orchestrator.ingest("test run").await.unwrap_err();
        assert!(matches!(err, IngestError::Wrangle(WrangleError::UnknownSeries { .. })));

        // Staging tree was still removed
        let leftover = std::fs::read_dir(staging.path()).unwrap().count();
        assert_eq!(leftover, 0);

        // The audit row is left in-progress (NULL finished)
        let rows = ingestion::list_ingestions(&pool, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].finished.is_none());
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_in_progress_record() {
        let pool = test_pool().await;
        seed_universe(&pool, 2).await;
        let staging = tempfile::tempdir().unwrap();

        let mut opts = options(true);
        opts.batch_size = API_BATCH_LIMIT + 1;
        let orchestrator = Orchestrator::new(
            &pool,
            &StubApi,
            staging.path(),
            opts,
            CommitGranularity::PerSeries,
        );

        let err = orchestrator.ingest("bad run").await.unwrap_err();
        assert!(matches!(err, IngestError::Fetch(FetchError::InvalidBatchSize(_))));

        let rows = ingestion::list_ingestions(&pool, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].finished.is_none());
    }
}
