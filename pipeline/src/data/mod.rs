//! Data storage layer
//!
//! The canonical store for series, observations, and ingestion audit
//! records. SQLite is the only backend; the pipeline is a single-process,
//! single-writer batch tool.
//!
//! - `sqlite` - connection pooling, schema, migrations, repositories
//! - `types` - row types shared across the domain layer
//! - `error` - store error type

pub mod error;
pub mod sqlite;
pub mod types;

pub use error::StoreError;
pub use sqlite::SqliteService;
pub use types::{IngestionRow, NewSeries, ObservationRow, SeriesRow};
