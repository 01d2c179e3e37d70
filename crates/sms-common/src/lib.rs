use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod logging;

/// Longest content, in characters, that the provider will deliver.
pub const MAX_CONTENT_LENGTH: usize = 160;

/// Key prefix for delivery confirmations written to the cache.
pub const CONFIRMATION_KEY_PREFIX: &str = "sent_message:";

// ============================================================================
// Message
// ============================================================================

/// Delivery status of a stored message.
///
/// `Unsent` is the only non-terminal state. A message moves to exactly one of
/// `Sent` or `Invalid` and never leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Unsent,
    Sent,
    Invalid,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Unsent => "unsent",
            MessageStatus::Sent => "sent",
            MessageStatus::Invalid => "invalid",
        }
    }

    /// Whether a stored message in this status may be moved to `next`.
    pub fn can_transition_to(&self, next: MessageStatus) -> bool {
        matches!(
            (self, next),
            (MessageStatus::Unsent, MessageStatus::Sent) | (MessageStatus::Unsent, MessageStatus::Invalid)
        )
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown message status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for MessageStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unsent" => Ok(MessageStatus::Unsent),
            "sent" => Ok(MessageStatus::Sent),
            "invalid" => Ok(MessageStatus::Invalid),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// An outbound text message as stored in the message table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub content: String,
    pub recipient: String,
    pub status: MessageStatus,
    pub sent_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Build an `unsent` message, mostly useful for tests and seeding.
    pub fn unsent(id: i64, content: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            recipient: recipient.into(),
            status: MessageStatus::Unsent,
            sent_at: None,
        }
    }

    /// Content length in characters (not bytes).
    pub fn content_length(&self) -> usize {
        self.content.chars().count()
    }

    pub fn exceeds_content_limit(&self) -> bool {
        self.content_length() > MAX_CONTENT_LENGTH
    }
}

// ============================================================================
// Delivery confirmation record
// ============================================================================

/// Cached record of a confirmed delivery, keyed by [`confirmation_key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentConfirmation {
    /// Identifier assigned by the delivery provider
    pub message_id: String,
    /// RFC3339 timestamp, UTC, second precision
    pub sent_at: String,
}

impl SentConfirmation {
    pub fn new(provider_message_id: impl Into<String>, sent_at: DateTime<Utc>) -> Self {
        Self {
            message_id: provider_message_id.into(),
            sent_at: sent_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Cache key for the confirmation of message `id`.
pub fn confirmation_key(id: i64) -> String {
    format!("{}{}", CONFIRMATION_KEY_PREFIX, id)
}
