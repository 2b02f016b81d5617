//! ZeroMQ PUB relay pushing canonical messages to live subscribers.
//!
//! The relay keeps one outbound session to the push channel, fully
//! independent of the broker session. Delivery is fire-and-forget: no
//! subscriber acknowledgment is awaited, and a message that arrives while
//! the session is down is dropped, never queued. Durable history is the
//! persistence gateway's job, not this component's.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zeromq::prelude::*;
use zeromq::{PubSocket, ZmqMessage};

use depesche_core::config::ChannelConfig;
use depesche_core::message::Message;

use crate::error::ChannelError;
use crate::transport::Transport;

/// Session state of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

/// What happened to an emitted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    /// Pushed to the channel (no subscriber acknowledgment is awaited).
    Sent,
    /// Session was down; the message was dropped and will not be retried.
    Dropped,
}

/// Trait for live-push relays, the seam the coordinator emits through.
#[async_trait]
pub trait EventRelay: Send + Sync {
    /// Push a message to live subscribers, best-effort.
    ///
    /// A down session is not an error; it yields the `Dropped` outcome.
    async fn emit(&self, message: &Message) -> Result<EmitOutcome, ChannelError>;
}

struct Inner {
    state: ChannelState,
    socket: Option<PubSocket>,
    /// When the last connect attempt started; paces opportunistic retries.
    last_attempt: Option<Instant>,
}

/// PUB-socket relay with a bounded-backoff reconnect state machine.
///
/// Socket and reconnect bookkeeping live behind one mutex and are owned
/// exclusively by this component.
pub struct ZmqBroadcastRelay {
    transport: Transport,
    topic: String,
    connect_timeout: Duration,
    reconnect_delay: Duration,
    reconnect_delay_max: Duration,
    max_attempts: u32,
    inner: Mutex<Inner>,
}

impl ZmqBroadcastRelay {
    /// Create a relay in `Disconnected` state; call [`connect`] to bring
    /// the session up.
    ///
    /// [`connect`]: ZmqBroadcastRelay::connect
    pub fn new(cfg: &ChannelConfig) -> Self {
        Self::with_transport(Transport::tcp(cfg.host.clone(), cfg.port), cfg)
    }

    pub fn with_transport(transport: Transport, cfg: &ChannelConfig) -> Self {
        Self {
            transport,
            topic: cfg.topic.clone(),
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            reconnect_delay: Duration::from_secs(cfg.reconnect_delay_secs),
            reconnect_delay_max: Duration::from_secs(cfg.reconnect_delay_max_secs),
            max_attempts: cfg.max_reconnect_attempts,
            inner: Mutex::new(Inner {
                state: ChannelState::Disconnected,
                socket: None,
                last_attempt: None,
            }),
        }
    }

    /// Current session state.
    pub async fn state(&self) -> ChannelState {
        self.inner.lock().await.state
    }

    /// Delay before the given 1-based attempt: doubles from the base,
    /// capped at the configured ceiling.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let doubled = self
            .reconnect_delay
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
        doubled.min(self.reconnect_delay_max)
    }

    /// One connect attempt, bounded by the configured timeout.
    /// Caller holds the lock.
    async fn try_connect_once(&self, inner: &mut Inner) -> Result<(), ChannelError> {
        inner.state = ChannelState::Connecting;
        inner.last_attempt = Some(Instant::now());

        let mut socket = PubSocket::new();
        let endpoint = self.transport.endpoint();
        let attempt = tokio::time::timeout(self.connect_timeout, socket.connect(&endpoint));

        match attempt.await {
            Ok(Ok(())) => {
                inner.socket = Some(socket);
                inner.state = ChannelState::Connected;
                info!(endpoint = %endpoint, "push channel connected");
                Ok(())
            }
            Ok(Err(e)) => {
                inner.socket = None;
                inner.state = ChannelState::Disconnected;
                Err(ChannelError::Connection(format!(
                    "connect to {endpoint} failed: {e}"
                )))
            }
            Err(_) => {
                inner.socket = None;
                inner.state = ChannelState::Disconnected;
                Err(ChannelError::Timeout(self.connect_timeout.as_secs()))
            }
        }
    }

    /// Bring the session up with bounded attempts and capped backoff.
    ///
    /// Returns whether the session ended up `Connected`. After exhausting
    /// its attempts the relay stays `Disconnected`; subsequent emits warn
    /// and drop rather than retrying in a tight loop.
    pub async fn connect(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state == ChannelState::Connected {
            return true;
        }

        for attempt in 1..=self.max_attempts {
            match self.try_connect_once(&mut inner).await {
                Ok(()) => return true,
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "push channel connect attempt failed"
                    );
                }
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.backoff_delay(attempt)).await;
            }
        }

        warn!(
            endpoint = %self.transport,
            "push channel unreachable after bounded attempts, relay stays disconnected"
        );
        false
    }

    /// Release the channel session. Safe to call in any state.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.socket = None;
        inner.state = ChannelState::Disconnected;
        info!(endpoint = %self.transport, "push channel session released");
    }
}

#[async_trait]
impl EventRelay for ZmqBroadcastRelay {
    async fn emit(&self, message: &Message) -> Result<EmitOutcome, ChannelError> {
        let mut inner = self.inner.lock().await;

        if inner.state != ChannelState::Connected {
            warn!(
                job_id = %message.job_id,
                "push channel disconnected, dropping emit"
            );

            // Opportunistic, paced single attempt so the next emit may
            // succeed. This message stays dropped either way.
            let due = inner
                .last_attempt
                .map_or(true, |t| t.elapsed() >= self.reconnect_delay);
            if due {
                if let Err(e) = self.try_connect_once(&mut inner).await {
                    debug!(error = %e, "opportunistic reconnect failed");
                }
            }
            return Ok(EmitOutcome::Dropped);
        }

        let payload = rmp_serde::to_vec(message)?;
        let mut zmq_msg = ZmqMessage::from(self.topic.as_str());
        zmq_msg.push_back(payload.into());

        let socket = inner
            .socket
            .as_mut()
            .ok_or_else(|| ChannelError::Emit("connected state without socket".into()))?;

        match socket.send(zmq_msg).await {
            Ok(()) => {
                debug!(topic = %self.topic, job_id = %message.job_id, "message emitted");
                Ok(EmitOutcome::Sent)
            }
            Err(e) => {
                // The session itself is broken; tear it down so the next
                // emit takes the reconnect path.
                inner.socket = None;
                inner.state = ChannelState::Disconnected;
                Err(ChannelError::Emit(format!("send failed: {e}")))
            }
        }
    }
}
