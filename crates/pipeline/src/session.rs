//! Broker session state machine around the consume loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{info, warn};

use depesche_core::config::QueueConfig;
use depesche_queue::consumer::QueueConsumer;

use crate::coordinator::Coordinator;
use crate::error::PipelineError;

/// Lifecycle of the broker session.
///
/// `Failed` is terminal: the session only reaches it after exhausting its
/// reconnect budget, and [`ConsumerSession::run`] returns an error at that
/// point so the process can exit and be restarted by its supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Consuming,
    Reconnecting,
    Failed,
}

/// Owns the poll/ack loop against the broker and hands every received
/// message to the [`Coordinator`].
///
/// Messages are acknowledged immediately on receipt, before any downstream
/// work. A message that subsequently fails to persist or relay is gone from
/// the broker; that trade (no poison-message loops, at the price of
/// at-most-once delivery) is deliberate.
pub struct ConsumerSession {
    consumer: Arc<dyn QueueConsumer>,
    coordinator: Coordinator,
    cfg: QueueConfig,
    state: Mutex<SessionState>,
}

impl ConsumerSession {
    pub fn new(consumer: Arc<dyn QueueConsumer>, coordinator: Coordinator, cfg: QueueConfig) -> Self {
        Self {
            consumer,
            coordinator,
            cfg,
            state: Mutex::new(SessionState::Disconnected),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap() = state;
    }

    /// Bring the broker session up, with a fixed delay between bounded
    /// attempts. `via` is `Connecting` on startup, `Reconnecting` after a
    /// mid-run poll failure.
    async fn establish(&self, via: SessionState) -> Result<(), PipelineError> {
        let attempts = self.cfg.max_reconnect_attempts.max(1);
        for attempt in 1..=attempts {
            self.set_state(via);

            let check = tokio::time::timeout(
                Duration::from_secs(self.cfg.connect_timeout_secs),
                self.consumer.health_check(),
            );
            match check.await {
                Ok(Ok(health)) if health.connected => {
                    info!(queue = %self.cfg.queue_url, %health, "broker session up");
                    self.set_state(SessionState::Consuming);
                    return Ok(());
                }
                Ok(Ok(health)) => {
                    warn!(attempt, %health, "broker reports unhealthy");
                }
                Ok(Err(e)) => {
                    warn!(attempt, error = %e, "broker health check failed");
                }
                Err(_) => {
                    warn!(
                        attempt,
                        timeout_secs = self.cfg.connect_timeout_secs,
                        "broker health check timed out"
                    );
                }
            }

            if attempt < attempts {
                tokio::time::sleep(Duration::from_secs(self.cfg.reconnect_delay_secs)).await;
            }
        }

        self.set_state(SessionState::Failed);
        Err(PipelineError::ReconnectExhausted { attempts })
    }

    /// Consume until shutdown is signalled or the reconnect budget runs out.
    ///
    /// On shutdown the current batch is finished before the loop exits; no
    /// further poll is issued. Releasing the push channel is the caller's
    /// job, after this returns.
    pub async fn run(&self, shutdown: Arc<Notify>) -> Result<(), PipelineError> {
        self.establish(SessionState::Connecting).await?;

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    info!("shutdown requested, broker session released");
                    self.set_state(SessionState::Disconnected);
                    return Ok(());
                }
                polled = self.consumer.poll(self.cfg.max_batch) => match polled {
                    Ok(batch) => {
                        for msg in batch {
                            // Ack first: the broker is done with this message
                            // whether or not the sinks accept it.
                            if let Err(e) = self.consumer.ack(&msg.receipt_handle).await {
                                warn!(
                                    queue_message_id = %msg.id,
                                    error = %e,
                                    "ack failed, message may be redelivered"
                                );
                            }
                            self.coordinator.process(&msg).await;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "poll failed, reconnecting");
                        self.establish(SessionState::Reconnecting).await?;
                    }
                }
            }
        }
    }
}
