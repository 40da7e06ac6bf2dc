//! Macrofeed ingestion pipeline
//!
//! Fetches macroeconomic time-series observations from an external
//! statistics API, merges them idempotently into a local canonical store,
//! and derives linked percent-change ("delta") series.

pub mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
