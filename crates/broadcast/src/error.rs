//! Push channel error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("emit failed: {0}")]
    Emit(String),

    #[error("connection timeout after {0}s")]
    Timeout(u64),
}
