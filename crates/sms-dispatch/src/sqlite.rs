//! SQLite Message Store Implementation
//!
//! Status transitions are guarded in SQL: updates only touch rows that are
//! still `unsent`, so a terminal status is never overwritten.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sms_common::{Message, MessageStatus};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::error::{DispatchError, Result};
use crate::store::MessageStore;

/// Demo rows inserted into an empty table: (content, recipient, status, sent_at)
const SEED_MESSAGES: &[(&str, &str, MessageStatus, Option<&str>)] = &[
    ("Huge sale :)", "+905551234567", MessageStatus::Sent, Some("2024-02-12T03:00:06+03:00")),
    ("Insider - Project", "+905551111111", MessageStatus::Unsent, None),
    ("Tiny sale :(", "+905551234567", MessageStatus::Sent, Some("2025-05-30T21:17:09+07:00")),
    ("Hello universe!", "+14181234567", MessageStatus::Unsent, None),
    (
        "You can use this one time password to log in to somewhere: 526184",
        "+821260542022",
        MessageStatus::Unsent,
        None,
    ),
    ("Check out our products!", "+821251876804", MessageStatus::Unsent, None),
];

pub struct SqliteMessageStore {
    pool: SqlitePool,
}

impl SqliteMessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the message table if it does not exist
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS message (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT NOT NULL,
                recipient TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'unsent',
                sent_at TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_message_status ON message(status)")
            .execute(&self.pool)
            .await?;

        info!("Message schema initialized");
        Ok(())
    }

    /// Insert the demo messages if the table is empty. Returns the number of rows inserted.
    pub async fn seed(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM message")
            .fetch_one(&self.pool)
            .await?;
        if count > 0 {
            debug!(existing = count, "Message table not empty, skipping seed");
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for &(content, recipient, status, sent_at) in SEED_MESSAGES {
            sqlx::query("INSERT INTO message (content, recipient, status, sent_at) VALUES (?, ?, ?, ?)")
                .bind(content)
                .bind(recipient)
                .bind(status.as_str())
                .bind(sent_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        info!(count = SEED_MESSAGES.len(), "Seeded message table");
        Ok(SEED_MESSAGES.len() as u64)
    }

    /// Insert a new `unsent` message and return its id
    pub async fn enqueue(&self, content: &str, recipient: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO message (content, recipient, status) VALUES (?, ?, ?)")
            .bind(content)
            .bind(recipient)
            .bind(MessageStatus::Unsent.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    fn parse_row(row: &sqlx::sqlite::SqliteRow) -> Result<Message> {
        let status: String = row.get("status");
        let status = status
            .parse::<MessageStatus>()
            .map_err(|e| DispatchError::Store(e.to_string()))?;

        let sent_at: Option<String> = row.get("sent_at");
        let sent_at = sent_at
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|ts| ts.with_timezone(&Utc))
                    .map_err(|e| DispatchError::Store(format!("Invalid sent_at '{}': {}", raw, e)))
            })
            .transpose()?;

        Ok(Message {
            id: row.get("id"),
            content: row.get("content"),
            recipient: row.get("recipient"),
            status,
            sent_at,
        })
    }

    async fn fetch_by_status(&self, status: MessageStatus, limit: Option<u32>) -> Result<Vec<Message>> {
        let rows = match limit {
            Some(limit) => {
                sqlx::query(
                    "SELECT id, content, recipient, status, sent_at FROM message \
                     WHERE status = ? ORDER BY id ASC LIMIT ?",
                )
                .bind(status.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, content, recipient, status, sent_at FROM message \
                     WHERE status = ? ORDER BY id ASC",
                )
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(Self::parse_row).collect()
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn fetch_unsent(&self, limit: u32) -> Result<Vec<Message>> {
        let messages = self.fetch_by_status(MessageStatus::Unsent, Some(limit)).await?;
        debug!(count = messages.len(), limit, "Fetched unsent messages");
        Ok(messages)
    }

    async fn mark_sent(&self, id: i64, sent_at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE message SET status = ?, sent_at = ? WHERE id = ? AND status = ?")
            .bind(MessageStatus::Sent.as_str())
            .bind(sent_at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            .bind(id)
            .bind(MessageStatus::Unsent.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            debug!(message_id = id, "mark_sent matched no unsent message");
        }
        Ok(())
    }

    async fn mark_invalid(&self, id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE message SET status = ? WHERE id = ? AND status = ?")
            .bind(MessageStatus::Invalid.as_str())
            .bind(id)
            .bind(MessageStatus::Unsent.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            debug!(message_id = id, "mark_invalid matched no unsent message");
        }
        Ok(())
    }

    async fn fetch_sent(&self) -> Result<Vec<Message>> {
        self.fetch_by_status(MessageStatus::Sent, None).await
    }
}
