//! Pipeline error types.

use thiserror::Error;

use depesche_queue::QueueError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("broker unreachable after {attempts} reconnect attempts")]
    ReconnectExhausted { attempts: u32 },
}
