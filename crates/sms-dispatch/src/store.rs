//! Message Store Trait
//!
//! The dispatcher only reads `unsent` messages and moves them to a terminal
//! status. It never creates or deletes messages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sms_common::Message;

use crate::error::Result;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Fetch up to `limit` messages in status `unsent`, ascending by id.
    async fn fetch_unsent(&self, limit: u32) -> Result<Vec<Message>>;

    /// Move an `unsent` message to `sent` with the given timestamp.
    async fn mark_sent(&self, id: i64, sent_at: DateTime<Utc>) -> Result<()>;

    /// Move an `unsent` message to `invalid`.
    async fn mark_invalid(&self, id: i64) -> Result<()>;

    /// All messages in status `sent`, ascending by id.
    async fn fetch_sent(&self) -> Result<Vec<Message>>;
}
