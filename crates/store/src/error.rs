//! Store error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("store operation failed: {0}")]
    Operation(#[from] sqlx::Error),
}
