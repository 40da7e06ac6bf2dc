//! Core application
//!
//! Composition root: parses the CLI, resolves configuration, wires the
//! store and API client together, and dispatches to command handlers.

use anyhow::{Context, Result};

use crate::core::cli::{self, Commands, SeriesCommands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::storage::{AppStorage, DataSubdir};
use crate::data::SqliteService;
use crate::data::sqlite::repositories::{ingestion, series};
use crate::data::types::NewSeries;
use crate::domain::api::HttpSeriesApi;
use crate::domain::delta::{DeltaEngine, SeriesKey};
use crate::domain::ingest::Orchestrator;

pub struct CoreApp {
    pub config: AppConfig,
    pub storage: AppStorage,
    pub database: SqliteService,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let cli = cli::parse();
        let config = AppConfig::load(cli.config.as_deref())?;
        let app = Self::init(config).await?;

        let result = match cli.command {
            Commands::Ingest {
                start_year,
                end_year,
                batch_size,
                rate_limit_secs,
                keep_staging,
                title,
            } => {
                app.handle_ingest(
                    start_year,
                    end_year,
                    batch_size,
                    rate_limit_secs,
                    keep_staging,
                    &title,
                )
                .await
            }
            Commands::Deltas { series, all, delete } => {
                app.handle_deltas(&series, all, delete).await
            }
            Commands::Series { command } => app.handle_series(command).await,
            Commands::History { limit } => app.handle_history(limit).await,
        };

        app.database.close().await;
        result
    }

    async fn init(config: AppConfig) -> Result<Self> {
        let storage = AppStorage::init().await?;
        let database = SqliteService::init(&storage)
            .await
            .context("Failed to initialize database")?;

        Ok(Self {
            config,
            storage,
            database,
        })
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_ingest(
        &self,
        start_year: Option<i32>,
        end_year: Option<i32>,
        batch_size: Option<usize>,
        rate_limit_secs: Option<u64>,
        keep_staging: bool,
        title: &str,
    ) -> Result<()> {
        let options = self.config.fetch_options(
            start_year,
            end_year,
            batch_size,
            rate_limit_secs,
            keep_staging,
        );
        let api = HttpSeriesApi::new(&self.config.api_endpoint, self.config.api_key.as_deref())?;
        let staging_root = self.storage.subdir(DataSubdir::Staging);

        let orchestrator = Orchestrator::new(
            self.database.pool(),
            &api,
            &staging_root,
            options,
            self.config.commit,
        );
        let record = orchestrator.ingest(title).await?;

        println!(
            "Ingested {} of {} fetched rows across {} series in {:.1}s ({}-{})",
            record.num_added,
            record.num_fetched,
            record.num_series,
            record.duration_secs.unwrap_or_default(),
            record.start_year,
            record.end_year,
        );
        Ok(())
    }

    async fn handle_deltas(&self, series: &[String], all: bool, delete: bool) -> Result<()> {
        let keys: Vec<SeriesKey> = series.iter().map(|s| SeriesKey::parse(s)).collect();
        let engine = DeltaEngine::new(self.database.pool());

        let results = engine.deltas(&keys, all, delete).await?;
        for delta in &results {
            println!("{}  {}", delta.source_id, delta.title);
        }
        println!("Computed {} delta series", results.len());
        Ok(())
    }

    async fn handle_series(&self, command: SeriesCommands) -> Result<()> {
        let pool = self.database.pool();
        match command {
            SeriesCommands::Add {
                id,
                title,
                source,
                adjusted,
            } => {
                let row = series::create_series(
                    pool,
                    &NewSeries {
                        source_id: id,
                        title,
                        source,
                        is_primary: true,
                        is_delta: false,
                        is_adjusted: adjusted,
                    },
                )
                .await?;
                println!("Added series {} ({})", row.source_id, row.title);
            }
            SeriesCommands::List { page, limit } => {
                let (rows, total) = series::list_series(pool, page, limit).await?;
                for s in &rows {
                    let kind = if s.is_delta { "delta" } else { "primary" };
                    println!("{:<24} {:<8} {}", s.source_id, kind, s.title);
                }
                println!("{} of {} series", rows.len(), total);
            }
        }
        Ok(())
    }

    async fn handle_history(&self, limit: u32) -> Result<()> {
        let rows = ingestion::list_ingestions(self.database.pool(), limit).await?;
        for rec in &rows {
            let status = match rec.finished {
                Some(finished) => finished.format("finished %Y-%m-%d %H:%M:%S").to_string(),
                None => "in progress / aborted".to_string(),
            };
            println!(
                "#{:<4} {}  v{}  {}-{}  +{} of {} rows, {} series  [{}]",
                rec.id,
                rec.started.format("%Y-%m-%d %H:%M:%S"),
                rec.version,
                rec.start_year,
                rec.end_year,
                rec.num_added,
                rec.num_fetched,
                rec.num_series,
                status,
            );
        }
        if rows.is_empty() {
            println!("No ingestion runs recorded");
        }
        Ok(())
    }
}
