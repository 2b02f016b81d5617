//! PostgreSQL-backed persistence gateway for canonical messages.
//!
//! The gateway degrades instead of failing: an unreachable store at startup
//! leaves it with no pool, in which case `save` silently no-ops and
//! `load_all` returns nothing, and the consume loop and the live relay keep
//! running either way.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info, warn};

use depesche_core::config::StoreConfig;
use depesche_core::message::{
    ContentType, Message, UNKNOWN_CONTENT_ID, UNKNOWN_JOB_ID,
};

use crate::error::StoreError;

/// What happened to a message offered to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Inserted as a new row. Duplicates from redelivery insert again;
    /// there is no dedup key.
    Stored,
    /// Failed the persistence validity invariant; logged, never stored.
    SkippedInvalid,
    /// The gateway has no store connection; the write was dropped.
    Degraded,
}

/// Storage-side view of the two validity predicates.
///
/// The read filter requires at least one identifying field to be real
/// (`OR`); the purge filter only deletes rows where all three are sentinels
/// at once (`AND`). The asymmetry (a row sentinel in two of the three
/// fields stays visible to reads and is never purged) is carried over from
/// the system this replaces, deliberately unchanged.
const READ_FILTER: &str = "job_id <> $1 OR content_id <> $2 OR content_type <> $3";
const PURGE_FILTER: &str = "job_id = $1 AND content_id = $2 AND content_type = $3";

/// Trait for persistence gateways, the seam the coordinator writes through.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert a valid message as a new row; skip and log invalid ones.
    async fn save(&self, message: &Message) -> Result<SaveOutcome, StoreError>;

    /// All stored messages passing the read filter, newest first by `time`.
    ///
    /// Never fails the caller: unavailability or a query error is logged
    /// and produces an empty vec.
    async fn load_all(&self) -> Vec<Message>;

    /// Delete rows with all three identifying fields at their sentinels.
    /// Returns the number of rows removed.
    async fn purge_invalid(&self) -> Result<u64, StoreError>;
}

/// Row shape for `messages`; `content_type` stays a label in SQL.
#[derive(sqlx::FromRow)]
struct MessageRow {
    time: String,
    job_id: String,
    content_id: String,
    content_type: String,
    file_name: String,
    status: String,
    message: String,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            time: row.time,
            job_id: row.job_id,
            content_id: row.content_id,
            content_type: ContentType::from_label(&row.content_type),
            file_name: row.file_name,
            status: row.status,
            message: row.message,
        }
    }
}

/// The gateway owns its pool exclusively; nothing else touches the store.
pub struct PgMessageStore {
    pool: Option<PgPool>,
}

impl PgMessageStore {
    /// Connect to the document store and run migrations.
    ///
    /// Connection failure is fatal to persistence only: the returned
    /// gateway is degraded, never an error, so the rest of the pipeline
    /// keeps operating.
    pub async fn connect(cfg: &StoreConfig) -> Self {
        let url = cfg.connection_string();
        let connect = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .connect(&url);

        let pool = match tokio::time::timeout(
            Duration::from_secs(cfg.connect_timeout_secs),
            connect,
        )
        .await
        {
            Ok(Ok(pool)) => pool,
            Ok(Err(e)) => {
                warn!(host = %cfg.host, error = %e, "store unreachable, persistence degraded to no-op");
                return Self { pool: None };
            }
            Err(_) => {
                warn!(
                    host = %cfg.host,
                    timeout_secs = cfg.connect_timeout_secs,
                    "store connection timed out, persistence degraded to no-op"
                );
                return Self { pool: None };
            }
        };

        match sqlx::migrate!("../../migrations").run(&pool).await {
            Ok(_) => {
                info!(host = %cfg.host, db = %cfg.database, "document store connected");
                Self { pool: Some(pool) }
            }
            Err(e) => {
                warn!(error = %e, "store migrations failed, persistence degraded to no-op");
                Self { pool: None }
            }
        }
    }

    /// A gateway with no backing store. Every write no-ops, every read is
    /// empty. Used when persistence is deliberately disabled and in tests.
    pub fn degraded() -> Self {
        Self { pool: None }
    }

    pub fn is_degraded(&self) -> bool {
        self.pool.is_none()
    }

    /// Delete every stored message, valid or not. Admin-only surface.
    pub async fn clear_all(&self) -> Result<u64, StoreError> {
        let Some(pool) = &self.pool else {
            return Ok(0);
        };
        let result = sqlx::query("DELETE FROM messages").execute(pool).await?;
        info!(deleted = result.rows_affected(), "cleared all stored messages");
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn save(&self, message: &Message) -> Result<SaveOutcome, StoreError> {
        if !message.is_persistence_valid() {
            warn!(
                job_id = %message.job_id,
                content_id = %message.content_id,
                "skipping persistence-invalid message"
            );
            return Ok(SaveOutcome::SkippedInvalid);
        }

        let Some(pool) = &self.pool else {
            debug!(job_id = %message.job_id, "store degraded, dropping write");
            return Ok(SaveOutcome::Degraded);
        };

        sqlx::query(
            "INSERT INTO messages (time, job_id, content_id, content_type, file_name, status, message)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&message.time)
        .bind(&message.job_id)
        .bind(&message.content_id)
        .bind(message.content_type.as_label())
        .bind(&message.file_name)
        .bind(&message.status)
        .bind(&message.message)
        .execute(pool)
        .await?;

        debug!(job_id = %message.job_id, time = %message.time, "message stored");
        Ok(SaveOutcome::Stored)
    }

    async fn load_all(&self) -> Vec<Message> {
        let Some(pool) = &self.pool else {
            warn!("store degraded, load_all returns nothing");
            return Vec::new();
        };

        let query = format!(
            "SELECT time, job_id, content_id, content_type, file_name, status, message
             FROM messages
             WHERE {READ_FILTER}
             ORDER BY time DESC"
        );

        match sqlx::query_as::<_, MessageRow>(&query)
            .bind(UNKNOWN_JOB_ID)
            .bind(UNKNOWN_CONTENT_ID)
            .bind(ContentType::Unknown.as_label())
            .fetch_all(pool)
            .await
        {
            Ok(rows) => {
                debug!(count = rows.len(), "loaded stored messages");
                rows.into_iter().map(Message::from).collect()
            }
            Err(e) => {
                warn!(error = %e, "load_all failed, returning nothing");
                Vec::new()
            }
        }
    }

    async fn purge_invalid(&self) -> Result<u64, StoreError> {
        let Some(pool) = &self.pool else {
            return Ok(0);
        };

        let query = format!("DELETE FROM messages WHERE {PURGE_FILTER}");
        let result = sqlx::query(&query)
            .bind(UNKNOWN_JOB_ID)
            .bind(UNKNOWN_CONTENT_ID)
            .bind(ContentType::Unknown.as_label())
            .execute(pool)
            .await?;

        info!(deleted = result.rows_affected(), "purged invalid messages");
        Ok(result.rows_affected())
    }
}
