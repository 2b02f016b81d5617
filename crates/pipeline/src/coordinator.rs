//! Per-message fan-out: normalize, persist, relay.

use std::sync::Arc;

use tracing::{debug, warn};

use depesche_broadcast::relay::{EmitOutcome, EventRelay};
use depesche_queue::consumer::QueueMessage;
use depesche_queue::normalizer::{normalize, RawPayload};
use depesche_store::gateway::{MessageStore, SaveOutcome};

/// Fans one incoming queue message out to the document store and the push
/// channel, in that order.
///
/// Persistence failures and relay failures are logged and absorbed here;
/// nothing a sink does propagates back into the consume loop. The only
/// message that goes nowhere is one whose payload cannot be decoded at all.
pub struct Coordinator {
    store: Arc<dyn MessageStore>,
    relay: Arc<dyn EventRelay>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn MessageStore>, relay: Arc<dyn EventRelay>) -> Self {
        Self { store, relay }
    }

    /// Handle one queue message end to end.
    ///
    /// The store is offered the message first so a subscriber that reloads
    /// history right after the live event sees the row. Invalid messages
    /// skip persistence inside the gateway but are still pushed live.
    pub async fn process(&self, incoming: &QueueMessage) {
        let raw = RawPayload::Text(incoming.body.clone());
        let message = match normalize(&raw) {
            Ok(m) => m,
            Err(e) => {
                warn!(
                    queue_message_id = %incoming.id,
                    error = %e,
                    "dropping undecodable payload"
                );
                return;
            }
        };

        match self.store.save(&message).await {
            Ok(SaveOutcome::Stored) => {
                debug!(job_id = %message.job_id, "message persisted");
            }
            Ok(SaveOutcome::SkippedInvalid) => {
                debug!(job_id = %message.job_id, "message not persisted (invalid)");
            }
            Ok(SaveOutcome::Degraded) => {
                debug!(job_id = %message.job_id, "message not persisted (store degraded)");
            }
            Err(e) => {
                warn!(job_id = %message.job_id, error = %e, "persistence failed");
            }
        }

        match self.relay.emit(&message).await {
            Ok(EmitOutcome::Sent) => {
                debug!(job_id = %message.job_id, "message relayed");
            }
            Ok(EmitOutcome::Dropped) => {
                debug!(job_id = %message.job_id, "live push dropped (channel down)");
            }
            Err(e) => {
                warn!(job_id = %message.job_id, error = %e, "live push failed");
            }
        }
    }
}
