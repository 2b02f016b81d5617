//! Maintenance commands against the message store.
//!
//! Runs outside the relay pipeline; useful for pruning sentinel-only rows
//! that predate stricter producers, and for inspecting what the dashboard
//! read-side will see.

use clap::{Parser, Subcommand};

use depesche_core::config::{load_dotenv, Config};
use depesche_store::{MessageStore, PgMessageStore};

#[derive(Parser, Debug)]
#[command(name = "store-admin", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Delete rows whose job_id, content_id and content_type are all sentinels.
    PurgeInvalid,
    /// Print all readable messages (newest first) as JSON lines.
    Dump,
    /// Delete every stored message, valid or not.
    ClearAll,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();

    let store = PgMessageStore::connect(&config.store).await;
    if store.is_degraded() {
        anyhow::bail!("document store is unreachable; nothing to administer");
    }

    match cli.command {
        Command::PurgeInvalid => {
            let deleted = store.purge_invalid().await?;
            println!("purged {deleted} invalid messages");
        }
        Command::Dump => {
            for message in store.load_all().await {
                println!("{}", serde_json::to_string(&message)?);
            }
        }
        Command::ClearAll => {
            let deleted = store.clear_all().await?;
            println!("deleted {deleted} messages");
        }
    }

    Ok(())
}
