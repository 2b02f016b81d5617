//! Queue consumer trait and types.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// A raw message received from the queue, not yet normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Unique message identifier from the queue provider.
    pub id: String,
    /// Raw message body as delivered by the broker.
    pub body: String,
    /// Provider-specific handle used to acknowledge the message.
    pub receipt_handle: String,
    /// When this process received the message.
    pub received_at: DateTime<Utc>,
}

/// Health status of the broker connection.
#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    /// Whether the queue is reachable.
    pub connected: bool,
    /// Approximate number of messages waiting in the queue.
    pub approximate_depth: Option<u64>,
}

impl fmt::Display for QueueHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QueueHealth {{ connected: {}, depth: {:?} }}",
            self.connected, self.approximate_depth
        )
    }
}

/// Trait for queue consumer backends.
///
/// The pipeline acknowledges every message immediately after receipt, before
/// downstream processing; delivery is at-most-once from the broker's
/// perspective and best-effort from the pipeline's. Implementations are
/// plain poll/ack primitives; the session state machine lives with the
/// pipeline, not here.
#[async_trait]
pub trait QueueConsumer: Send + Sync {
    /// Poll up to `max_messages` from the queue.
    ///
    /// May block for up to the provider's long-poll timeout.
    /// Returns an empty vec if no messages are available.
    async fn poll(&self, max_messages: u32) -> Result<Vec<QueueMessage>, QueueError>;

    /// Acknowledge receipt, removing the message from the queue.
    async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError>;

    /// Check broker connectivity and return health status.
    async fn health_check(&self) -> Result<QueueHealth, QueueError>;
}
