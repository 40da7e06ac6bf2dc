//! Domain logic for the ingestion pipeline
//!
//! - `api` - statistics API client (trait + HTTP implementation)
//! - `fetch` - batched, rate-limited fetch into staged files
//! - `wrangle` - idempotent merge of staged files into the store
//! - `delta` - derived percent-change series
//! - `ingest` - orchestrated fetch -> wrangle run with audit record

pub mod api;
pub mod delta;
pub mod fetch;
pub mod ingest;
pub mod wrangle;

pub use api::{ApiError, HttpSeriesApi, RawObservation, RawSeries, SeriesApi};
pub use delta::{DeltaEngine, DeltaError, SeriesKey};
pub use fetch::{FetchError, FetchOptions, FetchOutcome, Fetcher};
pub use ingest::{IngestError, Orchestrator};
pub use wrangle::{CommitGranularity, WrangleError, WrangleOutcome, Wrangler};
