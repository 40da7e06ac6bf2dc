//! Application configuration
//!
//! Sources, lowest to highest precedence: built-in defaults, the optional
//! JSON config file, environment variables, CLI flags (applied by the
//! command handlers in `app.rs`). Components never read configuration
//! themselves; the composition root resolves everything and hands each
//! component an explicit value object.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_API_ENDPOINT, DEFAULT_BATCH_SIZE,
    DEFAULT_RATE_LIMIT_SECS, DEFAULT_START_YEAR, ENV_API_ENDPOINT, ENV_API_KEY, ENV_BATCH_SIZE,
    ENV_END_YEAR, ENV_RATE_LIMIT_SECS, ENV_START_YEAR,
};
use crate::domain::fetch::FetchOptions;
use crate::domain::wrangle::CommitGranularity;

// =============================================================================
// Commit Granularity (serde form)
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
enum CommitMode {
    #[default]
    PerSeries,
    WholeRun,
}

impl From<CommitMode> for CommitGranularity {
    fn from(mode: CommitMode) -> Self {
        match mode {
            CommitMode::PerSeries => CommitGranularity::PerSeries,
            CommitMode::WholeRun => CommitGranularity::WholeRun,
        }
    }
}

// =============================================================================
// Config file shape (all fields optional)
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    start_year: Option<i32>,
    end_year: Option<i32>,
    batch_size: Option<usize>,
    rate_limit_secs: Option<u64>,
    cleanup: Option<bool>,
    commit: Option<CommitMode>,
    api_endpoint: Option<String>,
    api_key: Option<String>,
}

// =============================================================================
// Resolved configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub start_year: i32,
    pub end_year: i32,
    pub batch_size: usize,
    pub rate_limit_secs: u64,
    pub cleanup: bool,
    pub commit: CommitGranularity,
    pub api_endpoint: String,
    pub api_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            start_year: DEFAULT_START_YEAR,
            end_year: current_year(),
            batch_size: DEFAULT_BATCH_SIZE,
            rate_limit_secs: DEFAULT_RATE_LIMIT_SECS,
            cleanup: true,
            commit: CommitGranularity::PerSeries,
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            api_key: None,
        }
    }
}

fn current_year() -> i32 {
    use chrono::Datelike;
    chrono::Utc::now().year()
}

impl AppConfig {
    /// Load configuration: defaults, then config file, then environment.
    ///
    /// `explicit_path` comes from `--config`; when set, the file must exist.
    /// Otherwise `./macrofeed.json` and `~/.macrofeed/macrofeed.json` are
    /// tried in that order and silently skipped when absent.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::config_file_path(explicit_path) {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let file: ConfigFile = serde_json::from_str(&content)
                .with_context(|| format!("Invalid config file: {}", path.display()))?;
            config.apply_file(file);
            tracing::debug!(path = %path.display(), "Config file loaded");
        }

        config.apply_env();
        Ok(config)
    }

    fn config_file_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            return Some(local);
        }

        let home = dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME));
        home.filter(|p| p.is_file())
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(v) = file.start_year {
            self.start_year = v;
        }
        if let Some(v) = file.end_year {
            self.end_year = v;
        }
        if let Some(v) = file.batch_size {
            self.batch_size = v;
        }
        if let Some(v) = file.rate_limit_secs {
            self.rate_limit_secs = v;
        }
        if let Some(v) = file.cleanup {
            self.cleanup = v;
        }
        if let Some(v) = file.commit {
            self.commit = v.into();
        }
        if let Some(v) = file.api_endpoint {
            self.api_endpoint = v;
        }
        if let Some(v) = file.api_key {
            self.api_key = Some(v);
        }
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_parse::<i32>(ENV_START_YEAR) {
            self.start_year = v;
        }
        if let Some(v) = env_parse::<i32>(ENV_END_YEAR) {
            self.end_year = v;
        }
        if let Some(v) = env_parse::<usize>(ENV_BATCH_SIZE) {
            self.batch_size = v;
        }
        if let Some(v) = env_parse::<u64>(ENV_RATE_LIMIT_SECS) {
            self.rate_limit_secs = v;
        }
        if let Ok(v) = std::env::var(ENV_API_ENDPOINT) {
            self.api_endpoint = v;
        }
        if let Ok(v) = std::env::var(ENV_API_KEY)
            && !v.is_empty()
        {
            self.api_key = Some(v);
        }
    }

    /// Fetch options for one run, with any CLI overrides applied
    pub fn fetch_options(
        &self,
        start_year: Option<i32>,
        end_year: Option<i32>,
        batch_size: Option<usize>,
        rate_limit_secs: Option<u64>,
        keep_staging: bool,
    ) -> FetchOptions {
        FetchOptions {
            start_year: start_year.unwrap_or(self.start_year),
            end_year: end_year.unwrap_or(self.end_year),
            batch_size: batch_size.unwrap_or(self.batch_size),
            rate_limit: Duration::from_secs(rate_limit_secs.unwrap_or(self.rate_limit_secs)),
            cleanup: if keep_staging { false } else { self.cleanup },
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}
