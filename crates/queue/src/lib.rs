pub mod consumer;
pub mod error;
pub mod normalizer;
pub mod sqs;

pub use consumer::{QueueConsumer, QueueHealth, QueueMessage};
pub use error::QueueError;
pub use normalizer::{normalize, normalize_at, RawPayload};
pub use sqs::SqsConsumer;
