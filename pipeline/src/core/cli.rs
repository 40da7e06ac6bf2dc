use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    DEFAULT_INGEST_TITLE, ENV_BATCH_SIZE, ENV_CONFIG, ENV_END_YEAR, ENV_RATE_LIMIT_SECS,
    ENV_START_YEAR,
};

#[derive(Parser)]
#[command(name = "macrofeed")]
#[command(version, about = "Macroeconomic time-series ingestion pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch observations from the statistics API and merge them into the store
    Ingest {
        /// First year of the requested range (inclusive)
        #[arg(long, env = ENV_START_YEAR)]
        start_year: Option<i32>,

        /// Last year of the requested range (inclusive)
        #[arg(long, env = ENV_END_YEAR)]
        end_year: Option<i32>,

        /// Series identifiers requested per API call
        #[arg(long, env = ENV_BATCH_SIZE)]
        batch_size: Option<usize>,

        /// Delay between successive API calls, in seconds
        #[arg(long, env = ENV_RATE_LIMIT_SECS)]
        rate_limit_secs: Option<u64>,

        /// Keep the staged raw files after the run
        #[arg(long)]
        keep_staging: bool,

        /// Title recorded on the ingestion audit record
        #[arg(long, default_value = DEFAULT_INGEST_TITLE)]
        title: String,
    },

    /// Compute percent-change delta series
    Deltas {
        /// Series to process: external identifiers or numeric row ids
        series: Vec<String>,

        /// Process every non-delta series in the store
        #[arg(long)]
        all: bool,

        /// Delete and rebuild a delta series that already exists
        #[arg(long)]
        delete: bool,
    },

    /// Manage the series identifier universe
    Series {
        #[command(subcommand)]
        command: SeriesCommands,
    },

    /// Show past ingestion runs
    History {
        /// Maximum number of runs to show
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

#[derive(Subcommand, Debug)]
pub enum SeriesCommands {
    /// Register a series identifier so future ingestions fetch it
    Add {
        /// External identifier on the statistics API
        #[arg(long)]
        id: String,

        /// Human-readable title
        #[arg(long)]
        title: String,

        /// Origin dataset tag
        #[arg(long, default_value = "CPS")]
        source: String,

        /// Mark the series seasonally adjusted
        #[arg(long)]
        adjusted: bool,
    },

    /// List series in the store
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}
