//! Wrangler: normalize staged raw files and merge them into the store
//!
//! Every staged file holds one series' raw observations. Wrangling resolves
//! each series by external identifier, parses periods into first-of-month
//! dates, and inserts only the rows not already present. Re-running over
//! overlapping data is safe: first write wins, nothing is overwritten.
//!
//! Commit granularity is configurable. Per-series commits (the default)
//! bound transaction size and leave already-committed series durable when a
//! later series fails; whole-run commits give all-or-nothing semantics.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;

use crate::data::StoreError;
use crate::data::sqlite::repositories::{observation, series};
use crate::domain::api::RawSeries;
use crate::utils::period::parse_period;

#[derive(Error, Debug)]
pub enum WrangleError {
    #[error("staged series {source_id} is not present in the canonical store ({path})")]
    UnknownSeries { source_id: String, path: PathBuf },

    #[error("invalid staged file {path}: {message}")]
    InvalidFile { path: PathBuf, message: String },

    #[error("invalid value {value:?} for series {source_id}, period {period}")]
    InvalidValue {
        source_id: String,
        period: NaiveDate,
        value: String,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("staging error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transaction scope of the merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommitGranularity {
    /// One transaction per staged series (bounded size, partial progress)
    #[default]
    PerSeries,
    /// One transaction for the whole run (all-or-nothing)
    WholeRun,
}

/// Counts reported by a wrangle run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WrangleOutcome {
    /// Rows actually inserted
    pub rows_added: u64,
    /// Rows considered (every staged observation row, including skipped ones)
    pub rows_fetched: u64,
}

/// One staged series after parsing, periods in ascending order
struct StagedSeries {
    source_id: String,
    path: PathBuf,
    rows: BTreeMap<NaiveDate, (f64, Option<String>)>,
    rows_fetched: u64,
}

pub struct Wrangler<'a> {
    pool: &'a SqlitePool,
    granularity: CommitGranularity,
}

impl<'a> Wrangler<'a> {
    pub fn new(pool: &'a SqlitePool, granularity: CommitGranularity) -> Self {
        Self { pool, granularity }
    }

    /// Merge every staged file under `staging_dir` into the canonical store.
    pub async fn wrangle(&self, staging_dir: &Path) -> Result<WrangleOutcome, WrangleError> {
        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(staging_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut outcome = WrangleOutcome::default();

        match self.granularity {
            CommitGranularity::PerSeries => {
                for path in &paths {
                    let staged = extract(path).await?;
                    let series_row = self.resolve(&staged).await?;

                    let mut tx = self.pool.begin().await.map_err(StoreError::from)?;
                    let added = merge_series(&mut tx, series_row.id, &staged).await?;
                    tx.commit().await.map_err(StoreError::from)?;

                    outcome.rows_added += added;
                    outcome.rows_fetched += staged.rows_fetched;
                    tracing::debug!(
                        source_id = %staged.source_id,
                        added,
                        fetched = staged.rows_fetched,
                        "Committed series"
                    );
                }
            }
            CommitGranularity::WholeRun => {
                let mut tx = self.pool.begin().await.map_err(StoreError::from)?;
                for path in &paths {
                    let staged = extract(path).await?;
                    let series_row = self.resolve(&staged).await?;
                    outcome.rows_added += merge_series(&mut tx, series_row.id, &staged).await?;
                    outcome.rows_fetched += staged.rows_fetched;
                }
                tx.commit().await.map_err(StoreError::from)?;
            }
        }

        tracing::info!(
            rows_added = outcome.rows_added,
            rows_fetched = outcome.rows_fetched,
            series = paths.len(),
            "Wrangle complete"
        );
        Ok(outcome)
    }

    /// Resolve a staged series against the canonical store. A missing
    /// identifier means the fetched universe and the store have drifted;
    /// that is a hard error, not something to paper over.
    async fn resolve(
        &self,
        staged: &StagedSeries,
    ) -> Result<crate::data::SeriesRow, WrangleError> {
        series::get_by_source_id(self.pool, &staged.source_id)
            .await?
            .ok_or_else(|| WrangleError::UnknownSeries {
                source_id: staged.source_id.clone(),
                path: staged.path.clone(),
            })
    }
}

/// Insert the staged rows that are not already present
async fn merge_series(
    conn: &mut SqliteConnection,
    series_id: i64,
    staged: &StagedSeries,
) -> Result<u64, WrangleError> {
    let mut added = 0;
    for (&period, (value, footnote)) in &staged.rows {
        if observation_missing(conn, series_id, period).await? {
            observation::insert_observation(&mut *conn, series_id, period, *value, footnote.as_deref())
                .await?;
            added += 1;
        }
    }
    Ok(added)
}

async fn observation_missing(
    conn: &mut SqliteConnection,
    series_id: i64,
    period: NaiveDate,
) -> Result<bool, WrangleError> {
    Ok(!observation::observation_exists(&mut *conn, series_id, period).await?)
}

/// Parse a staged raw file into `(period -> (value, footnote))` form.
///
/// Non-monthly rows (annual averages) have no first-of-month period and are
/// skipped; they still count as fetched.
async fn extract(path: &Path) -> Result<StagedSeries, WrangleError> {
    let body = tokio::fs::read_to_string(path).await?;
    let raw: RawSeries = serde_json::from_str(&body).map_err(|e| WrangleError::InvalidFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut rows = BTreeMap::new();
    let mut rows_fetched = 0;
    for obs in &raw.data {
        rows_fetched += 1;
        let Some(period) = parse_period(&obs.period_name, &obs.year) else {
            tracing::debug!(
                source_id = %raw.series_id,
                period = %obs.period,
                "Skipping non-monthly period"
            );
            continue;
        };
        let value: f64 = obs
            .value
            .trim()
            .parse()
            .map_err(|_| WrangleError::InvalidValue {
                source_id: raw.series_id.clone(),
                period,
                value: obs.value.clone(),
            })?;
        let footnote = obs
            .footnotes
            .iter()
            .find_map(|f| f.text.clone().filter(|t| !t.is_empty()));
        rows.insert(period, (value, footnote));
    }

    Ok(StagedSeries {
        source_id: raw.series_id,
        path: path.to_path_buf(),
        rows,
        rows_fetched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::test_pool;
    use crate::data::types::NewSeries;
    use crate::domain::api::{RawFootnote, RawObservation};

    fn raw_obs(year: &str, period_name: &str, value: &str) -> RawObservation {
        let month = match period_name {
            "January" => "M01",
            "February" => "M02",
            "March" => "M03",
            "April" => "M04",
            _ => "M13",
        };
        RawObservation {
            year: year.to_string(),
            period: month.to_string(),
            period_name: period_name.to_string(),
            value: value.to_string(),
            footnotes: vec![],
        }
    }

    async fn stage(dir: &Path, source_id: &str, data: Vec<RawObservation>) {
        let raw = RawSeries {
            series_id: source_id.to_string(),
            data,
        };
        let path = dir.join(format!("{source_id}.json"));
        std::fs::write(&path, serde_json::to_vec_pretty(&raw).unwrap()).unwrap();
    }

    async fn seed_series(pool: &SqlitePool, source_id: &str) -> i64 {
        series::create_series(
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

    #[tokio::test]
    async fn test_wrangle_inserts_and_counts() {
        let pool = test_pool().await;
        let sid = seed_series(&pool, "LNS14000000").await;
        let dir = tempfile::tempdir().unwrap();
        stage(
            dir.path(),
            "LNS14000000",
            vec![
                raw_obs("2015", "January", "5.7"),
                raw_obs("2015", "February", "5.5"),
            ],
        )
        .await;

        let wrangler = Wrangler::new(&pool, CommitGranularity::PerSeries);
        let outcome = wrangler.wrangle(dir.path()).await.unwrap();

        assert_eq!(outcome.rows_added, 2);
        assert_eq!(outcome.rows_fetched, 2);
        assert_eq!(observation::count_for_series(&pool, sid).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_wrangle_is_idempotent() {
        let pool = test_pool().await;
        seed_series(&pool, "LNS14000000").await;
        let dir = tempfile::tempdir().unwrap();
        stage(
            dir.path(),
            "LNS14000000",
            vec![
                raw_obs("2015", "January", "5.7"),
                raw_obs("2015", "February", "5.5"),
                raw_obs("2015", "March", "5.5"),
            ],
        )
        .await;

        let wrangler = Wrangler::new(&pool, CommitGranularity::PerSeries);
        let first = wrangler.wrangle(dir.path()).await.unwrap();
        let second = wrangler.wrangle(dir.path()).await.unwrap();

        assert_eq!(first.rows_added, 3);
        assert_eq!(second.rows_added, 0);
        assert_eq!(second.rows_fetched, 3);
    }

    #[tokio::test]
    async fn test_wrangle_never_overwrites() {
        let pool = test_pool().await;
        let sid = seed_series(&pool, "LNS14000000").await;
        let dir = tempfile::tempdir().unwrap();
        stage(dir.path(), "LNS14000000", vec![raw_obs("2015", "January", "5.7")]).await;

        let wrangler = Wrangler::new(&pool, CommitGranularity::PerSeries);
        wrangler.wrangle(dir.path()).await.unwrap();

        // A revised value for the same period arrives on a later run
        stage(dir.path(), "LNS14000000", vec![raw_obs("2015", "January", "9.9")]).await;
        let outcome = wrangler.wrangle(dir.path()).await.unwrap();

        assert_eq!(outcome.rows_added, 0);
        let rows = observation::list_for_series(&pool, sid).await.unwrap();
        assert_eq!(rows[0].value, 5.7);
    }

    #[tokio::test]
    async fn test_unknown_series_is_hard_error() {
        let pool = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        stage(dir.path(), "LNS99999999", vec![raw_obs("2015", "January", "5.7")]).await;

        let wrangler = Wrangler::new(&pool, CommitGranularity::PerSeries);
        let err = wrangler.wrangle(dir.path()).await.unwrap_err();
        assert!(
            matches!(err, WrangleError::UnknownSeries { ref source_id, .. } if source_id == "LNS99999999")
        );
    }

    #[tokio::test]
    async fn test_annual_rows_skipped_but_counted() {
        let pool = test_pool().await;
        let sid = seed_series(&pool, "LNS14000000").await;
        let dir = tempfile::tempdir().unwrap();
        stage(
            dir.path(),
            "LNS14000000",
            vec![
                raw_obs("2015", "January", "5.7"),
                raw_obs("2015", "Annual", "5.6"),
            ],
        )
        .await;

        let wrangler = Wrangler::new(&pool, CommitGranularity::PerSeries);
        let outcome = wrangler.wrangle(dir.path()).await.unwrap();

        assert_eq!(outcome.rows_fetched, 2);
        assert_eq!(outcome.rows_added, 1);
        assert_eq!(observation::count_for_series(&pool, sid).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_value_aborts() {
        let pool = test_pool().await;
        seed_series(&pool, "LNS14000000").await;
        let dir = tempfile::tempdir().unwrap();
        stage(dir.path(), "LNS14000000", vec![raw_obs("2015", "January", "-")]).await;

        let wrangler = Wrangler::new(&pool, CommitGranularity::PerSeries);
        let err = wrangler.wrangle(dir.path()).await.unwrap_err();
        assert!(matches!(err, WrangleError::InvalidValue { .. }));
    }

    #[tokio::test]
    async fn test_per_series_commit_keeps_earlier_series() {
        let pool = test_pool().await;
        let sid = seed_series(&pool, "LNS11000000").await;
        // Second file (sorts after the first) references an unknown series
        let dir = tempfile::tempdir().unwrap();
        stage(dir.path(), "LNS11000000", vec![raw_obs("2015", "January", "100")]).await;
        stage(dir.path(), "LNS99999999", vec![raw_obs("2015", "January", "1")]).await;

        let wrangler = Wrangler::new(&pool, CommitGranularity::PerSeries);
        let err = wrangler.wrangle(dir.path()).await.unwrap_err();
        assert!(matches!(err, WrangleError::UnknownSeries { .. }));

        // The first series was committed before the failure
        assert_eq!(observation::count_for_series(&pool, sid).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_whole_run_commit_rolls_back_everything() {
        let pool = test_pool().await;
        let sid = seed_series(&pool, "LNS11000000").await;
        let dir = tempfile::tempdir().unwrap();
        stage(dir.path(), "LNS11000000", vec![raw_obs("2015", "January", "100")]).await;
        stage(dir.path(), "LNS99999999", vec![raw_obs("2015", "January", "1")]).await;

        let wrangler = Wrangler::new(&pool, CommitGranularity::WholeRun);
        let err = wrangler.wrangle(dir.path()).await.unwrap_err();
        assert!(matches!(err, WrangleError::UnknownSeries { .. }));

        assert_eq!(observation::count_for_series(&pool, sid).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_footnote_is_captured() {
        let pool = test_pool().await;
        let sid = seed_series(&pool, "LNS14000000").await;
        let dir = tempfile::tempdir().unwrap();
        let mut obs = raw_obs("2015", "January", "5.7");
        obs.footnotes = vec![
            RawFootnote::default(),
            RawFootnote {
                code: Some("P".to_string()),
                text: Some("Preliminary".to_string()),
            },
        ];
        stage(dir.path(), "LNS14000000", vec![obs]).await;

        let wrangler = Wrangler::new(&pool, CommitGranularity::PerSeries);
        wrangler.wrangle(dir.path()).await.unwrap();

        let rows = observation::list_for_series(&pool, sid).await.unwrap();
        assert_eq!(rows[0].footnote.as_deref(), Some("Preliminary"));
    }
}
