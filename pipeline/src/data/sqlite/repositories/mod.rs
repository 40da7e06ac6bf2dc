//! SQLite repositories
//!
//! Free functions over a pool or connection, one module per table.

pub mod ingestion;
pub mod observation;
pub mod series;
