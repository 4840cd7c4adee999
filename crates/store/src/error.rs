use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A write collided with a unique index, e.g. a second active
    /// enrollment for the same user and session.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A write violated a check constraint, e.g. negative stock.
    #[error("Check constraint violated: {constraint}")]
    CheckViolation { constraint: String },

    /// A stored value could not be decoded into its domain type.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
