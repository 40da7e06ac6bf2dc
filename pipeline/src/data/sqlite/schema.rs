//! SQLite schema definitions
//!
//! Initial schema with all tables. No migrations needed for first version.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema SQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at INTEGER NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms INTEGER,
    success INTEGER NOT NULL DEFAULT 1
);

-- =============================================================================
-- 1. Series (the identifier universe; delta series link back via delta_id)
-- =============================================================================
CREATE TABLE IF NOT EXISTS series (
    id INTEGER PRIMARY KEY,
    source_id TEXT NOT NULL UNIQUE CHECK(length(source_id) >= 1),
    title TEXT NOT NULL,
    source TEXT NOT NULL,
    is_primary INTEGER NOT NULL DEFAULT 0,
    is_delta INTEGER NOT NULL DEFAULT 0,
    is_adjusted INTEGER NOT NULL DEFAULT 0,
    delta_id INTEGER REFERENCES series(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_series_source_id ON series(source_id);
CREATE INDEX IF NOT EXISTS idx_series_delta_id ON series(delta_id);

-- =============================================================================
-- 2. Observations (insert-only; owned by their series)
-- =============================================================================
CREATE TABLE IF NOT EXISTS observations (
    id INTEGER PRIMARY KEY,
    series_id INTEGER NOT NULL REFERENCES series(id) ON DELETE CASCADE,
    period TEXT NOT NULL,
    value REAL NOT NULL,
    footnote TEXT,
    UNIQUE(series_id, period)
);

CREATE INDEX IF NOT EXISTS idx_observations_period ON observations(period);

-- =============================================================================
-- 3. Ingestions (append-only audit log; finished is NULL while in progress)
-- =============================================================================
CREATE TABLE IF NOT EXISTS ingestions (
    id INTEGER PRIMARY KEY,
    title TEXT,
    version TEXT NOT NULL,
    start_year INTEGER NOT NULL,
    end_year INTEGER NOT NULL,
    duration_secs REAL,
    num_series INTEGER NOT NULL DEFAULT 0,
    num_added INTEGER NOT NULL DEFAULT 0,
    num_fetched INTEGER NOT NULL DEFAULT 0,
    started INTEGER NOT NULL,
    finished INTEGER
);
"#;
