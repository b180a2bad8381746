//! `Repository` trait — single async interface for all persistence.

use async_trait::async_trait;

use crate::archive::model::{ArchiveMessage, TriggerMessage};
use crate::content::model::{Content, User};
use crate::error::DatabaseError;

/// Backend-agnostic storage for members, triggers and archives.
#[async_trait]
pub trait Repository: Send + Sync {
    // ── Users ───────────────────────────────────────────────────────

    /// Get a member by ID.
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, DatabaseError>;

    /// Insert a new member. Fails with `Conflict` if the ID is taken.
    async fn create_user(&self, user: &User) -> Result<(), DatabaseError>;

    /// Overwrite a stored member.
    async fn update_user(&self, user: &User) -> Result<(), DatabaseError>;

    /// Append a content record and set the member's most recent type in
    /// one write. Returns the member as stored afterwards.
    async fn append_content(&self, user_id: &str, content: &Content)
    -> Result<User, DatabaseError>;

    // ── Triggers ────────────────────────────────────────────────────

    /// All triggers in a channel, in registration order.
    async fn list_triggers(&self, channel_id: &str) -> Result<Vec<TriggerMessage>, DatabaseError>;

    /// Insert a new trigger.
    async fn create_trigger(&self, trigger: &TriggerMessage)
    -> Result<TriggerMessage, DatabaseError>;

    /// First trigger (in registration order) whose word occurs in `text`.
    async fn find_trigger(
        &self,
        channel_id: &str,
        text: &str,
    ) -> Result<Option<TriggerMessage>, DatabaseError>;

    // ── Archives ────────────────────────────────────────────────────

    /// Look up an archive by its natural key.
    async fn find_archive(
        &self,
        channel_id: &str,
        ts: &str,
    ) -> Result<Option<ArchiveMessage>, DatabaseError>;

    /// Insert a new archive. Fails with `Conflict` if `(channel_id, ts)` exists.
    async fn create_archive(&self, archive: &ArchiveMessage)
    -> Result<ArchiveMessage, DatabaseError>;

    /// Update message, trigger word, files and `updated_at` of an existing archive.
    async fn update_archive(&self, archive: &ArchiveMessage)
    -> Result<ArchiveMessage, DatabaseError>;

    /// Archives for one author and trigger word in a channel, oldest first.
    async fn list_archives(
        &self,
        channel_id: &str,
        trigger_word: &str,
        user_id: &str,
    ) -> Result<Vec<ArchiveMessage>, DatabaseError>;
}
