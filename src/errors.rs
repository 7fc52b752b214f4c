use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Setup failed: {0}")]
    Setup(String),
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

/// Failure while talking to the price store.
///
/// A failure inside `upsert_batch` only ever rolls back the batch it was
/// raised for.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("batch for {symbol} rolled back: {reason}")]
    RolledBack { symbol: String, reason: String },
}

impl From<sqlx::Error> for PersistenceError {
    fn from(value: sqlx::Error) -> Self {
        PersistenceError::Database(value)
    }
}
