//! Trigger and archive data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A keyword registered in a channel. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerMessage {
    pub id: Uuid,
    /// Member who registered the word.
    pub user_id: String,
    pub channel_id: String,
    pub trigger_word: String,
    pub created_at: DateTime<Utc>,
}

impl TriggerMessage {
    pub fn new(
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
        trigger_word: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            trigger_word: trigger_word.into(),
            created_at: Utc::now(),
        }
    }

    /// Whether the word occurs anywhere in `text`.
    pub fn matches(&self, text: &str) -> bool {
        text.contains(self.trigger_word.as_str())
    }
}

/// Stored snapshot of a channel message that matched a trigger.
///
/// Keyed by `(channel_id, ts)`; edits to the same external message
/// update this record in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMessage {
    pub id: Uuid,
    pub channel_id: String,
    /// External message timestamp, the natural key within a channel.
    pub ts: String,
    /// Message text with mentions rewritten to display names.
    pub message: String,
    pub user_id: String,
    pub trigger_word: String,
    #[serde(default)]
    pub file_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ArchiveMessage {
    pub fn new(
        channel_id: impl Into<String>,
        ts: impl Into<String>,
        message: impl Into<String>,
        user_id: impl Into<String>,
        trigger_word: impl Into<String>,
        file_urls: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            channel_id: channel_id.into(),
            ts: ts.into(),
            message: message.into(),
            user_id: user_id.into(),
            trigger_word: trigger_word.into(),
            file_urls,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the mutable fields from a newer snapshot and bump `updated_at`.
    pub fn apply_edit(&mut self, message: String, trigger_word: String, file_urls: Vec<String>) {
        self.message = message;
        self.trigger_word = trigger_word;
        self.file_urls = file_urls;
        self.updated_at = Utc::now();
    }

    /// Whether applying this snapshot would leave the record unchanged.
    pub fn has_same_content(
        &self,
        message: &str,
        trigger_word: &str,
        file_urls: &[String],
    ) -> bool {
        self.message == message
            && self.trigger_word == trigger_word
            && self.file_urls == file_urls
    }
}

/// Normalized inbound channel message, independent of the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub channel_id: String,
    /// External message timestamp.
    pub ts: String,
    pub text: String,
    pub user_id: String,
    #[serde(default)]
    pub file_urls: Vec<String>,
    /// True when this is an edit of a previously posted message.
    #[serde(default)]
    pub is_edit: bool,
}

/// What reconciliation did with an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveKind {
    Created,
    Updated,
    /// A redelivery of something already stored. Nothing was written
    /// and no reaction or reply was sent.
    Duplicate,
}

/// Result of reconciling one inbound event.
#[derive(Debug, Clone)]
pub struct ArchiveOutcome {
    pub archive: ArchiveMessage,
    pub kind: ArchiveKind,
    /// 1-based rank among archives sharing channel, trigger word and author.
    /// Only computed for creations.
    pub ordinal: Option<usize>,
}
