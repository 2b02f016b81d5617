//! Long-running relay worker: queue in, store and push channel out.
//!
//! Flow: durable queue -> normalize -> document store -> live subscribers
//!
//! The store and the push channel degrade independently; the worker keeps
//! consuming as long as the broker session can be held. It exits non-zero
//! only when the broker reconnect budget is exhausted, leaving restarts to
//! the supervisor.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::Notify;
use tracing::{info, warn};

use depesche_broadcast::relay::ZmqBroadcastRelay;
use depesche_core::config::{load_dotenv, Config};
use depesche_pipeline::{ConsumerSession, Coordinator};
use depesche_queue::sqs::SqsConsumer;
use depesche_store::gateway::PgMessageStore;

// ── CLI ─────────────────────────────────────────────────────────────

/// Job-status relay worker.
#[derive(Parser, Debug)]
#[command(name = "pipeline-worker", version, about)]
struct Cli {
    /// Run without the document store even if one is configured.
    #[arg(long, env = "PIPELINE_NO_STORE")]
    no_store: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    load_dotenv();
    let config = Config::from_env();
    config.log_summary();

    let consumer = Arc::new(SqsConsumer::new(&config.aws, &config.queue)?);

    let store = if cli.no_store {
        info!("persistence disabled by flag");
        Arc::new(PgMessageStore::degraded())
    } else {
        Arc::new(PgMessageStore::connect(&config.store).await)
    };

    let relay = Arc::new(ZmqBroadcastRelay::new(&config.channel));
    if !relay.connect().await {
        warn!("push channel down at startup, live events drop until it recovers");
    }

    let coordinator = Coordinator::new(store, relay.clone());
    let session = ConsumerSession::new(consumer, coordinator, config.queue.clone());

    // Shutdown on SIGINT/SIGTERM; the session finishes its in-flight batch
    // before the broker session is released.
    let shutdown = Arc::new(Notify::new());
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        os_signal().await;
        info!("shutdown signal received");
        signal_shutdown.notify_one();
    });

    info!("pipeline-worker starting");
    let outcome = session.run(shutdown).await;

    // Broker session is down by now; release the push channel last.
    relay.close().await;

    outcome?;
    info!("pipeline-worker exited cleanly");
    Ok(())
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C (cross-platform fallback).
async fn os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl_c");
    }
}
