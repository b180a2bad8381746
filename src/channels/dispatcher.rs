//! Outbound notification seam: chat messages and reactions.

use async_trait::async_trait;

use crate::error::DispatchError;

/// Result of asking the transport to add a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionOutcome {
    Added,
    /// The bot had already reacted with this emoji. Not an error.
    AlreadyReacted,
}

/// Posts messages and reactions to the chat platform.
///
/// Implementations are best-effort; callers decide whether a failure matters.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Post `text` to a channel, optionally as a threaded reply to `thread_ts`.
    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<(), DispatchError>;

    /// Add a reaction to the message at `ts`.
    async fn add_reaction(
        &self,
        channel_id: &str,
        ts: &str,
        name: &str,
    ) -> Result<ReactionOutcome, DispatchError>;
}
