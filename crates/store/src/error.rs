use thiserror::Error;

/// Errors raised by message store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("message not found: {0}")]
    NotFound(i32),

    #[error("invalid message: {0}")]
    Invalid(String),
}
