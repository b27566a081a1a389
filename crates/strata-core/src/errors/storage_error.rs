//! Storage-layer errors for SQLite operations.

/// Errors raised by the persistence collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    SqliteError { message: String },

    #[error("migration failed at version {version}: {reason}")]
    MigrationFailed { version: u32, reason: String },

    #[error("stored value could not be decoded: {message}")]
    Corrupt { message: String },

    #[error("connection lock poisoned: {0}")]
    PoolPoisoned(String),
}
