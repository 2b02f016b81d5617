//! End-to-end flow test: scripted broker -> session -> live subscriber.
//!
//! Runs the real coordinator and ZeroMQ relay against a scripted queue
//! consumer and a degraded store, and checks that a subscriber on the push
//! channel receives the normalized canonical message.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;
use tokio::time::timeout;
use zeromq::prelude::*;
use zeromq::SubSocket;

use depesche_broadcast::relay::ZmqBroadcastRelay;
use depesche_broadcast::transport::Transport;
use depesche_core::config::{ChannelConfig, QueueConfig};
use depesche_core::message::{ContentType, Message};
use depesche_pipeline::{ConsumerSession, Coordinator};
use depesche_queue::consumer::{QueueConsumer, QueueHealth, QueueMessage};
use depesche_queue::error::QueueError;
use depesche_store::gateway::PgMessageStore;

const TIMEOUT: Duration = Duration::from_secs(5);
const SETTLE: Duration = Duration::from_millis(200);

struct ScriptedConsumer {
    batches: Mutex<VecDeque<Vec<QueueMessage>>>,
    drained: Notify,
}

#[async_trait]
impl QueueConsumer for ScriptedConsumer {
    async fn poll(&self, _max: u32) -> Result<Vec<QueueMessage>, QueueError> {
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => Ok(batch),
            None => {
                self.drained.notify_one();
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn ack(&self, _receipt_handle: &str) -> Result<(), QueueError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<QueueHealth, QueueError> {
        Ok(QueueHealth {
            connected: true,
            approximate_depth: Some(1),
        })
    }
}

fn queue_cfg() -> QueueConfig {
    QueueConfig {
        queue_url: "http://localhost:4566/000000000000/jobs".to_string(),
        wait_time_secs: 0,
        max_batch: 10,
        connect_timeout_secs: 1,
        reconnect_delay_secs: 0,
        max_reconnect_attempts: 2,
    }
}

fn channel_cfg(port: u16) -> ChannelConfig {
    ChannelConfig {
        host: "127.0.0.1".to_string(),
        port,
        topic: "depesche.message.new".to_string(),
        connect_timeout_secs: 2,
        reconnect_delay_secs: 1,
        reconnect_delay_max_secs: 5,
        max_reconnect_attempts: 1,
    }
}

#[tokio::test]
async fn queue_message_reaches_a_live_subscriber() {
    // Subscriber binds first (stable endpoint), relay connects outbound.
    let transport = Transport::tcp("127.0.0.1", 16320);
    let mut subscriber = SubSocket::new();
    subscriber.bind(&transport.endpoint()).await.unwrap();
    subscriber.subscribe("depesche.").await.unwrap();
    tokio::time::sleep(SETTLE).await;

    let relay = Arc::new(ZmqBroadcastRelay::new(&channel_cfg(16320)));
    assert!(relay.connect().await);
    tokio::time::sleep(SETTLE).await;

    let consumer = Arc::new(ScriptedConsumer {
        batches: Mutex::new(VecDeque::from([vec![QueueMessage {
            id: "m1".to_string(),
            body: r#"{"ID": "J1", "PictureID": "P9", "FileName": "a.png"}"#.to_string(),
            receipt_handle: "rh-m1".to_string(),
            received_at: Utc::now(),
        }]])),
        drained: Notify::new(),
    });

    // Degraded store: persistence drops, the live path keeps working.
    let coordinator = Coordinator::new(Arc::new(PgMessageStore::degraded()), relay.clone());
    let session = Arc::new(ConsumerSession::new(
        consumer.clone(),
        coordinator,
        queue_cfg(),
    ));

    let shutdown = Arc::new(Notify::new());
    let session_handle = {
        let session = session.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { session.run(shutdown).await })
    };

    let received = timeout(TIMEOUT, subscriber.recv())
        .await
        .expect("no live event arrived")
        .unwrap();

    timeout(TIMEOUT, consumer.drained.notified())
        .await
        .expect("session never drained the script");
    shutdown.notify_one();
    timeout(TIMEOUT, session_handle)
        .await
        .expect("session did not stop")
        .unwrap()
        .unwrap();
    relay.close().await;

    let frames: Vec<_> = received.iter().collect();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].as_ref(), b"depesche.message.new");

    let message: Message = rmp_serde::from_slice(frames[1].as_ref()).unwrap();
    assert_eq!(message.job_id, "J1");
    assert_eq!(message.content_id, "P9");
    assert_eq!(message.content_type, ContentType::Picture);
    assert_eq!(message.file_name, "a.png");
    assert_eq!(message.status, "Processed");
}
