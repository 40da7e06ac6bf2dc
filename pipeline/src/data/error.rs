//! Store error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration {version} ({name}) failed: {error}")]
    MigrationFailed {
        version: i32,
        name: String,
        error: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Conflict: {0}")]
    Conflict(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_failed_error_display() {
        let err = StoreError::MigrationFailed {
            version: 2,
            name: "add_footnotes".to_string(),
            error: "syntax error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Migration 2 (add_footnotes) failed: syntax error"
        );
    }

    #[test]
    fn test_conflict_display() {
        let err = StoreError::Conflict("ingestion 3 is already finished".to_string());
        assert!(err.to_string().contains("already finished"));
    }
}
